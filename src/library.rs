use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::Serialize;

use crate::audio::AudioPath;
use crate::config::ConfDir;
use crate::digest::{Digest, DigestAlgorithm};
use crate::worker::FingerprintResult;

/// 曲库文件中摘要的分隔符
const SEPARATOR: char = ',';

/// 已收录的指纹摘要集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySet(BTreeSet<Digest>);

impl LibrarySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析曲库文本，空内容得到空集合
    pub fn parse(text: &str) -> Self {
        text.split(SEPARATOR).map(str::trim).filter(|s| !s.is_empty()).map(Digest::from).collect()
    }

    /// 序列化为曲库文本，摘要按字典序排列
    pub fn to_text(&self) -> String {
        self.0.iter().map(Digest::as_str).collect::<Vec<_>>().join(",")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.0.contains(digest)
    }

    /// 插入摘要，已存在时返回 false
    pub fn insert(&mut self, digest: Digest) -> bool {
        self.0.insert(digest)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Digest> {
        self.0.iter()
    }

    /// 检查曲库中的摘要是否由同一种算法生成
    pub fn check_algorithm(&self, algorithm: DigestAlgorithm) -> Result<()> {
        if let Some(digest) = self.0.iter().find(|d| d.as_str().len() != algorithm.hex_len()) {
            bail!(
                "哈希算法不一致: 曲库中的摘要 {} 长度为 {}，{:?} 的摘要长度为 {}",
                digest,
                digest.as_str().len(),
                algorithm,
                algorithm.hex_len()
            );
        }
        Ok(())
    }
}

impl FromIterator<Digest> for LibrarySet {
    fn from_iter<T: IntoIterator<Item = Digest>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 一次去重的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupSummary {
    pub scanned: usize,
    pub failed: usize,
    pub added: usize,
    pub duplicates: usize,
    pub library_before: usize,
    pub library_after: usize,
}

#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub library: LibrarySet,
    /// 需要删除的重复文件
    pub duplicates: Vec<Arc<AudioPath>>,
    pub summary: DedupSummary,
}

/// 按给定顺序对结果去重
///
/// 每个摘要第一次出现的文件被保留，之后出现的文件，无论来自旧曲库还是本批次，
/// 都标记为重复。提取失败的结果既不收录也不标记。
pub fn dedup_pass(results: &[FingerprintResult], mut library: LibrarySet) -> DedupOutcome {
    let library_before = library.len();
    let mut duplicates = vec![];
    let mut failed = 0;

    for result in results {
        let Some(digest) = result.digest() else {
            failed += 1;
            continue;
        };
        if !library.insert(digest.clone()) {
            debug!("重复文件: {}", result.path);
            duplicates.push(result.path.clone());
        }
    }

    let summary = DedupSummary {
        scanned: results.len(),
        failed,
        added: library.len() - library_before,
        duplicates: duplicates.len(),
        library_before,
        library_after: library.len(),
    };
    DedupOutcome { library, duplicates, summary }
}

/// 曲库文件的读写
///
/// 同一个曲库文件同时只能有一次去重在进行，这里不做跨进程加锁。
#[derive(Debug, Clone)]
pub struct LibraryStore {
    path: PathBuf,
    tmp: PathBuf,
}

impl LibraryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self { path, tmp: tmp.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取曲库，文件不存在时返回空集合
    pub fn load(&self) -> Result<LibrarySet> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(LibrarySet::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LibrarySet::new()),
            Err(e) => {
                Err(e).with_context(|| format!("读取曲库失败: {}", self.path.display()))
            }
        }
    }

    /// 整体覆盖曲库：先写临时文件，再重命名
    pub fn commit(&self, library: &LibrarySet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建目录失败: {}", parent.display()))?;
        }
        fs::write(&self.tmp, library.to_text())
            .with_context(|| format!("写入曲库失败: {}", self.tmp.display()))?;
        fs::rename(&self.tmp, &self.path)
            .with_context(|| format!("替换曲库失败: {}", self.path.display()))?;
        debug!("曲库已写入: {} 条", library.len());
        Ok(())
    }

    /// 读取曲库，去重，然后写回
    pub fn run_pass(&self, results: &[FingerprintResult]) -> Result<DedupOutcome> {
        let library = self.load()?;
        let outcome = dedup_pass(results, library);
        self.commit(&outcome.library)?;
        let s = &outcome.summary;
        info!(
            "本次共扫描 {} 首，失败 {} 首，新增 {} 首，重复 {} 首，曲库 {} -> {}",
            s.scanned, s.failed, s.added, s.duplicates, s.library_before, s.library_after
        );
        Ok(outcome)
    }
}

impl From<&ConfDir> for LibraryStore {
    fn from(conf: &ConfDir) -> Self {
        Self { path: conf.library(), tmp: conf.library_tmp() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Outcome;

    fn ok(path: &str, digest: &str) -> FingerprintResult {
        FingerprintResult {
            path: Arc::new(AudioPath::new(path)),
            outcome: Outcome::Digest(Digest::from(digest)),
            tempo: None,
        }
    }

    fn err(path: &str) -> FingerprintResult {
        FingerprintResult {
            path: Arc::new(AudioPath::new(path)),
            outcome: Outcome::Error("bad".into()),
            tempo: None,
        }
    }

    fn marked(outcome: &DedupOutcome) -> Vec<String> {
        outcome.duplicates.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_parse_library() {
        assert!(LibrarySet::parse("").is_empty());
        assert!(LibrarySet::parse(",").is_empty());
        let set = LibrarySet::parse("aa,bb, cc\n");
        assert_eq!(set.len(), 3);
        assert!(set.contains(&Digest::from("cc")));
        assert_eq!(set.to_text(), "aa,bb,cc");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let results = [ok("/a", "h1"), ok("/b", "h1"), ok("/c", "h2"), ok("/d", "h1")];
        let outcome = dedup_pass(&results, LibrarySet::new());
        assert_eq!(marked(&outcome), vec!["/b", "/d"]);
        assert_eq!(outcome.library.to_text(), "h1,h2");
        assert_eq!(outcome.summary.added, 2);
        assert_eq!(outcome.summary.duplicates, 2);
    }

    #[test]
    fn test_existing_library_marks_duplicate() {
        let library = LibrarySet::parse("h1");
        let outcome = dedup_pass(&[ok("/a", "h1"), ok("/c", "h2")], library);
        assert_eq!(marked(&outcome), vec!["/a"]);
        assert_eq!(outcome.summary.library_before, 1);
        assert_eq!(outcome.summary.library_after, 2);
    }

    #[test]
    fn test_errors_are_excluded() {
        let results = [err("/x"), ok("/a", "h1"), err("/y"), err("/x")];
        let outcome = dedup_pass(&results, LibrarySet::new());
        assert!(outcome.duplicates.is_empty());
        assert_eq!(outcome.library.len(), 1);
        assert!(!outcome.library.contains(&Digest::from("error")));
        assert_eq!(outcome.summary.failed, 3);
        assert_eq!(outcome.summary.scanned, 4);
    }

    #[test]
    fn test_repeated_pass_is_stable() {
        let results = [ok("/a", "h1"), ok("/b", "h1"), ok("/c", "h2")];
        let library = LibrarySet::parse("h0");
        let first = dedup_pass(&results, library.clone());
        let second = dedup_pass(&results, library);
        assert_eq!(marked(&first), marked(&second));
        assert_eq!(first.library, second.library);
    }

    #[test]
    fn test_load_missing_and_commit() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = LibraryStore::new(dir.path().join("sub").join("songLibrary"));
        assert!(store.load().unwrap().is_empty());

        let set = LibrarySet::parse("bb,aa");
        store.commit(&set).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "aa,bb");
        assert_eq!(store.load().unwrap(), set);
        assert!(!dir.path().join("sub").join("songLibrary.tmp").exists());
    }

    #[test]
    fn test_run_pass_twice_adds_nothing_new() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = LibraryStore::new(dir.path().join("songLibrary"));
        let results = [ok("/a", "h1"), ok("/b", "h1"), ok("/c", "h2")];

        let first = store.run_pass(&results).unwrap();
        assert_eq!(marked(&first), vec!["/b"]);
        let text = fs::read_to_string(store.path()).unwrap();

        let second = store.run_pass(&results[..1]).unwrap();
        assert_eq!(second.summary.added, 0);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), text);
    }

    #[test]
    fn test_check_algorithm() {
        let set = LibrarySet::parse("d41d8cd98f00b204e9800998ecf8427e");
        assert!(set.check_algorithm(DigestAlgorithm::Md5).is_ok());
        assert!(set.check_algorithm(DigestAlgorithm::Blake3).is_err());
        assert!(LibrarySet::new().check_algorithm(DigestAlgorithm::Sha256).is_ok());
    }
}
