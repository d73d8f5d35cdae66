use std::fmt;

use clap::ValueEnum;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// 指纹摘要，小写十六进制字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Digest {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Digest {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// 与旧版曲库兼容
    Md5,
    Blake3,
    Sha256,
}

impl DigestAlgorithm {
    /// 十六进制摘要的长度
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Blake3 | Self::Sha256 => 64,
        }
    }

    pub fn hash_bytes(self, bytes: &[u8]) -> Digest {
        let hex = match self {
            Self::Md5 => hex::encode(Md5::digest(bytes)),
            Self::Blake3 => blake3::hash(bytes).to_hex().to_string(),
            Self::Sha256 => hex::encode(Sha256::digest(bytes)),
        };
        Digest(hex)
    }

    /// 对特征向量的规范文本计算摘要
    pub fn hash_features(self, features: &[f32]) -> Digest {
        self.hash_bytes(canonical_text(features).as_bytes())
    }
}

/// 特征向量的规范文本：每个值取最短可还原的十进制表示，以单个空格连接
///
/// 摘要对格式敏感，数值相同但格式不同的文本会得到不同的摘要。
pub fn canonical_text(features: &[f32]) -> String {
    features.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}
