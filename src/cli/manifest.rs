use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::manifest::verify;
use crate::Opts;

#[derive(Parser, Debug, Clone)]
pub struct VerifyManifestCommand {
    /// 模型清单文件，包含 modelFile 与 sha256
    pub manifest: PathBuf,
}

impl SubCommandExtend for VerifyManifestCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let (actual, ok) = verify(&self.manifest)?;
        println!("{}", actual);
        if !ok {
            bail!("SHA-256 不一致: {}", self.manifest.display());
        }
        info!("校验通过");
        Ok(())
    }
}
