use std::fmt;
use std::path::{Path, PathBuf};

/// 待处理的音频文件路径
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioPath {
    path: PathBuf,
    extension: Option<String>,
}

impl AudioPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path.extension().map(|ext| ext.to_string_lossy().to_lowercase());
        Self { path, extension }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 小写的扩展名，不含 `.`
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }
}

impl AsRef<Path> for AudioPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for AudioPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// 特征提取结果，MFCC 均值向量
pub type FeatureVector = Vec<f32>;

/// 分析程序输出的特征
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub vector: FeatureVector,
    /// 节拍速度（BPM），分析程序可能不输出
    pub tempo: Option<f64>,
}

impl Features {
    pub fn new(vector: FeatureVector) -> Self {
        Self { vector, tempo: None }
    }

    pub fn with_tempo(mut self, tempo: f64) -> Self {
        self.tempo = Some(tempo);
        self
    }
}
