use anyhow::Result;
use clap::Parser;

use audedup::cli::SubCommandExtend;
use audedup::config::{Opts, SubCommand};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Serve(config) => config.run(&opts).await,
        SubCommand::Scan(config) => config.run(&opts).await,
        SubCommand::Fingerprint(config) => config.run(&opts).await,
        SubCommand::Library(config) => config.run(&opts).await,
        SubCommand::VerifyManifest(config) => config.run(&opts).await,
    }
}
