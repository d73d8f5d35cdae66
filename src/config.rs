use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::digest::DigestAlgorithm;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "audedup", "audedup").expect("failed to get project dir");
    ConfDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap_or(".")
}

#[derive(Parser, Debug, Clone)]
pub struct ExtractorOptions {
    /// 外部音频分析程序路径
    #[arg(long, value_name = "PROGRAM", env = "AUDEDUP_EXTRACTOR")]
    pub extractor: PathBuf,
    /// 传给分析程序的参数，可重复，支持 {input} 与 {output} 占位符
    /// 未出现占位符时，输入与输出路径会依次追加到参数末尾
    #[arg(
        long = "extractor-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        verbatim_doc_comment
    )]
    pub extractor_args: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct DigestOptions {
    // 曲库中的摘要只有在算法一致时才有意义
    /// 计算指纹摘要使用的哈希算法
    #[arg(short = 'H', long, value_enum, default_value_t = DigestAlgorithm::Md5)]
    pub hash: DigestAlgorithm,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "audedup", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// audedup 数据目录，曲库文件保存在这里
    #[arg(short, long, global = true, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动指纹计算服务
    Serve(ServeCommand),
    /// 扫描目录并将音频文件提交给指纹服务
    Scan(ScanCommand),
    /// 计算单个文件的指纹
    Fingerprint(FingerprintCommand),
    /// 查看曲库
    Library(LibraryCommand),
    /// 校验模型清单中的 SHA-256
    VerifyManifest(VerifyManifestCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回曲库文件的路径
    pub fn library(&self) -> PathBuf {
        self.path.join("songLibrary")
    }

    /// 返回曲库临时文件的路径
    pub fn library_tmp(&self) -> PathBuf {
        self.path.join("songLibrary.tmp")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
