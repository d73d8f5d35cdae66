use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::worker::{FingerprintResult, Outcome};

/// 提取失败时 `digest` 字段的取值
pub const ERROR_SENTINEL: &str = "error";

/// 线上传输的摘要字段，失败时为 `"error"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordDigest {
    Hex(Digest),
    Error,
}

impl From<String> for RecordDigest {
    fn from(s: String) -> Self {
        if s == ERROR_SENTINEL { Self::Error } else { Self::Hex(Digest::from(s)) }
    }
}

impl From<RecordDigest> for String {
    fn from(d: RecordDigest) -> Self {
        match d {
            RecordDigest::Hex(digest) => digest.to_string(),
            RecordDigest::Error => ERROR_SENTINEL.to_owned(),
        }
    }
}

/// 每个文件一条记录，记录之间没有外层封装
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub digest: RecordDigest,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ResultRecord {
    pub fn is_error(&self) -> bool {
        self.digest == RecordDigest::Error
    }
}

impl From<&FingerprintResult> for ResultRecord {
    fn from(result: &FingerprintResult) -> Self {
        let (digest, reason) = match &result.outcome {
            Outcome::Digest(digest) => (RecordDigest::Hex(digest.clone()), None),
            Outcome::Error(reason) => (RecordDigest::Error, Some(reason.clone())),
        };
        Self { digest, path: result.path.to_string(), tempo: result.tempo, reason }
    }
}

/// 把结果写回唯一的客户端连接
///
/// 每次写入都持有互斥锁，记录按完成顺序写出，与提交顺序无关。
pub struct ResultStreamer<W> {
    conn: Mutex<W>,
    sent: AtomicUsize,
    broken: AtomicBool,
}

impl<W: Write> ResultStreamer<W> {
    pub fn new(conn: W) -> Self {
        Self { conn: Mutex::new(conn), sent: AtomicUsize::new(0), broken: AtomicBool::new(false) }
    }

    /// 写出一条记录
    pub fn send(&self, result: &FingerprintResult) -> io::Result<()> {
        let mut line = serde_json::to_vec(&ResultRecord::from(result))?;
        line.push(b'\n');

        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.write_all(&line)?;
        conn.flush()?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 写出一条记录，连接断开时只记录一次日志
    pub fn submit(&self, result: &FingerprintResult) {
        if let Err(e) = self.send(result) {
            if !self.broken.swap(true, Ordering::Relaxed) {
                warn!("写回结果失败，客户端可能已断开: {}", e);
            }
        }
    }

    /// 已成功写出的记录数
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> W {
        self.conn.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}
