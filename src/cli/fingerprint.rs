use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use tokio::task::block_in_place;

use crate::audio::AudioPath;
use crate::cli::SubCommandExtend;
use crate::config::{DigestOptions, ExtractorOptions};
use crate::extractor::CommandExtractor;
use crate::streamer::ResultRecord;
use crate::worker::{Outcome, Worker};
use crate::Opts;

#[derive(Parser, Debug, Clone)]
pub struct FingerprintCommand {
    #[command(flatten)]
    pub extractor: ExtractorOptions,
    #[command(flatten)]
    pub digest: DigestOptions,
    /// 音频文件路径
    pub file: PathBuf,
}

impl SubCommandExtend for FingerprintCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let worker = Worker::new(CommandExtractor::from(&self.extractor), self.digest.hash);
        let path = Arc::new(AudioPath::new(std::path::absolute(&self.file)?));
        let result = block_in_place(|| worker.process(path));

        println!("{}", serde_json::to_string(&ResultRecord::from(&result))?);
        if let Outcome::Error(reason) = &result.outcome {
            bail!("提取特征失败: {}", reason);
        }
        Ok(())
    }
}
