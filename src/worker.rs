use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use log::{debug, warn};

use crate::audio::AudioPath;
use crate::digest::{Digest, DigestAlgorithm};
use crate::extractor::FeatureExtractor;
use crate::metrics;

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Digest(Digest),
    /// 提取失败，附带原因
    Error(String),
}

/// 每个输入路径恰好产生一个结果
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintResult {
    pub path: Arc<AudioPath>,
    pub outcome: Outcome,
    pub tempo: Option<f64>,
}

impl FingerprintResult {
    pub fn digest(&self) -> Option<&Digest> {
        match &self.outcome {
            Outcome::Digest(digest) => Some(digest),
            Outcome::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }
}

pub struct Worker<E> {
    extractor: E,
    algorithm: DigestAlgorithm,
}

impl<E: FeatureExtractor> Worker<E> {
    pub fn new(extractor: E, algorithm: DigestAlgorithm) -> Self {
        Self { extractor, algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// 计算一个文件的指纹，提取器的错误与 panic 都转换为错误结果
    pub fn process(&self, path: Arc<AudioPath>) -> FingerprintResult {
        let start = Instant::now();
        let extracted = catch_unwind(AssertUnwindSafe(|| self.extractor.extract(path.path())))
            .unwrap_or_else(|_| Err(anyhow!("提取器 panic")));
        metrics::observe_extract_duration(start.elapsed().as_secs_f64());

        match extracted {
            Ok(features) => {
                let digest = self.algorithm.hash_features(&features.vector);
                debug!("{} => {}", path, digest);
                metrics::inc_fingerprint("ok");
                FingerprintResult { path, outcome: Outcome::Digest(digest), tempo: features.tempo }
            }
            Err(e) => {
                warn!("提取特征失败: {}: {:#}", path, e);
                metrics::inc_fingerprint("error");
                FingerprintResult { path, outcome: Outcome::Error(format!("{e:#}")), tempo: None }
            }
        }
    }
}
