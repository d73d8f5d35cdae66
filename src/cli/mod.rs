mod fingerprint;
mod library;
mod manifest;
mod scan;
pub mod serve;

pub use fingerprint::*;
pub use library::*;
pub use manifest::*;
pub use scan::*;
pub use serve::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
