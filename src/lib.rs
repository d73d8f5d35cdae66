pub mod audio;
pub mod cli;
pub mod config;
pub mod deleter;
pub mod digest;
pub mod dispatcher;
pub mod extractor;
pub mod library;
pub mod manifest;
mod metrics;
pub mod protocol;
pub mod server;
pub mod streamer;
pub mod utils;
pub mod worker;

pub use audio::{AudioPath, Features};
pub use config::Opts;
pub use digest::{Digest, DigestAlgorithm};
pub use dispatcher::JobDispatcher;
pub use extractor::{CommandExtractor, FeatureExtractor};
pub use library::{LibrarySet, LibraryStore};
pub use server::Server;
pub use worker::{FingerprintResult, Outcome, Worker};
