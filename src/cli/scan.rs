use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use indicatif::ProgressBar;
use log::{info, warn};
use tokio::task::spawn_blocking;

use crate::cli::SubCommandExtend;
use crate::protocol::{DELIMITER, request_batch};
use crate::streamer::{RecordDigest, ResultRecord};
use crate::utils::{find_audio_files, pb_style, suffix_regex};
use crate::Opts;

#[derive(Parser, Debug, Clone)]
pub struct ScanCommand {
    /// 音频文件所在目录
    pub path: PathBuf,
    /// 指纹服务端口，即服务启动时输出的 port
    #[arg(short, long)]
    pub port: u16,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "mp3,wav,flac")]
    pub suffix: String,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

impl SubCommandExtend for ScanCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let re_suf = suffix_regex(&self.suffix)?;
        let root = std::path::absolute(&self.path)?;
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let format = self.output_format;

        spawn_blocking(move || -> Result<()> {
            info!("开始扫描目录: {}", root.display());
            let files = find_audio_files(&root, &re_suf)
                .into_iter()
                .filter(|path| {
                    let ok = !path.to_string_lossy().contains(DELIMITER);
                    if !ok {
                        warn!("路径中包含分隔符，已跳过: {}", path.display());
                    }
                    ok
                })
                .collect::<Vec<_>>();
            info!("扫描完成，共 {} 首", files.len());
            if files.is_empty() {
                return Ok(());
            }

            let pb = ProgressBar::new(files.len() as u64).with_style(pb_style());
            let mut records = vec![];
            let mut errors = 0;
            request_batch(addr, &files, |record| {
                pb.inc(1);
                if record.is_error() {
                    errors += 1;
                }
                match format {
                    OutputFormat::Table => pb.suspend(|| print_record(&record)),
                    OutputFormat::Json => records.push(record),
                }
            })?;
            pb.finish_with_message("指纹计算完成");

            if let OutputFormat::Json = format {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            info!("共 {} 首，失败 {} 首", files.len(), errors);
            Ok(())
        })
        .await?
    }
}

fn print_record(record: &ResultRecord) {
    match &record.digest {
        RecordDigest::Hex(digest) => println!("{}\t{}", digest, record.path),
        RecordDigest::Error => println!("error\t{}", record.path),
    }
}
