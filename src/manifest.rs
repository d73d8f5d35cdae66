use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 预先导出的推理模型清单
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelManifest {
    /// 模型文件路径，相对路径以清单所在目录为基准
    pub model_file: PathBuf,
    pub sha256: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ModelManifest {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("读取清单失败: {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("解析清单失败: {}", path.display()))
    }

    pub fn model_path(&self, manifest_path: &Path) -> PathBuf {
        match manifest_path.parent() {
            Some(dir) if self.model_file.is_relative() => dir.join(&self.model_file),
            _ => self.model_file.clone(),
        }
    }
}

/// 计算整个文件的 SHA-256
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("打开文件失败: {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// 校验清单中的模型文件，返回实际的 SHA-256 与是否一致
pub fn verify(manifest_path: &Path) -> Result<(String, bool)> {
    let manifest = ModelManifest::read(manifest_path)?;
    let actual = sha256_file(&manifest.model_path(manifest_path))?;
    let ok = actual.eq_ignore_ascii_case(manifest.sha256.trim());
    Ok((actual, ok))
}
