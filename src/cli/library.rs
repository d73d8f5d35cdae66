use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::library::LibraryStore;
use crate::{DigestAlgorithm, Opts};

#[derive(Parser, Debug, Clone)]
pub struct LibraryCommand {
    /// 同时列出所有摘要
    #[arg(long)]
    pub list: bool,
    /// 检查曲库摘要是否与指定算法一致
    #[arg(long, value_enum, value_name = "HASH")]
    pub check: Option<DigestAlgorithm>,
}

impl SubCommandExtend for LibraryCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let store = LibraryStore::from(&opts.conf_dir);
        let library = store.load()?;
        if let Some(algorithm) = self.check {
            library.check_algorithm(algorithm)?;
        }

        println!("{}\t{}", library.len(), store.path().display());
        if self.list {
            for digest in library.iter() {
                println!("{}", digest);
            }
        }
        Ok(())
    }
}
