use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde_json::Value;

use crate::audio::Features;
use crate::config::ExtractorOptions;

/// 特征提取器
///
/// 提取算法本身不在本 crate 内实现，这里只定义调用边界。
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Features>;
}

impl<F> FeatureExtractor for F
where
    F: Fn(&Path) -> Result<Features> + Send + Sync,
{
    fn extract(&self, path: &Path) -> Result<Features> {
        self(path)
    }
}

/// 调用外部分析程序提取特征
///
/// 分析程序把结果写成 JSON 文件，MFCC 均值取自 `lowlevel.mfcc.mean`，
/// 节拍速度取自 `rhythm.bpm`。
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    /// 展开参数模板
    fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let has_placeholder =
            self.args.iter().any(|arg| arg.contains("{input}") || arg.contains("{output}"));
        let mut args = self
            .args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect::<Vec<_>>();
        if !has_placeholder {
            args.push(input.into_owned());
            args.push(output.into_owned());
        }
        args
    }
}

impl From<&ExtractorOptions> for CommandExtractor {
    fn from(opts: &ExtractorOptions) -> Self {
        Self::new(opts.extractor.clone(), opts.extractor_args.clone())
    }
}

impl FeatureExtractor for CommandExtractor {
    fn extract(&self, path: &Path) -> Result<Features> {
        // 临时文件在 drop 时删除
        let output = tempfile::Builder::new()
            .prefix("audedup_")
            .suffix(".json")
            .tempfile()
            .context("创建临时文件失败")?;
        let args = self.build_args(path, output.path());
        debug!("{} {:?}", self.program.display(), args);

        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("无法启动分析程序 {}", self.program.display()))?;
        if !status.success() {
            bail!("分析程序退出码 {}", status.code().unwrap_or(-1));
        }

        let text = std::fs::read_to_string(output.path()).context("读取分析结果失败")?;
        let root: Value = serde_json::from_str(&text).context("解析分析结果失败")?;
        parse_features(&root)
    }
}

/// 从分析程序的 JSON 输出中取出特征
pub fn parse_features(root: &Value) -> Result<Features> {
    let vector = find_array(root, &["lowlevel", "mfcc", "mean"])
        .or_else(|| find_array(root, &["lowlevel", "mfcc"]))
        .ok_or_else(|| anyhow!("分析结果中没有 MFCC"))?;
    let tempo = find_value(root, &["rhythm", "bpm"]).and_then(Value::as_f64);
    Ok(Features { vector, tempo })
}

fn find_value<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, key| current.as_object()?.get(*key))
}

fn find_array(root: &Value, path: &[&str]) -> Option<Vec<f32>> {
    let arr = find_value(root, path)?.as_array()?;
    if arr.is_empty() {
        return None;
    }
    arr.iter().map(|v| v.as_f64().map(|n| n as f32)).collect()
}
