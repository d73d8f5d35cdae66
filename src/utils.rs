use std::path::{Path, PathBuf};

use indicatif::ProgressStyle;
use regex::Regex;
use walkdir::WalkDir;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// 由逗号分隔的后缀名构造不区分大小写的匹配规则
pub fn suffix_regex(suffix: &str) -> Result<Regex, regex::Error> {
    let alternatives = suffix
        .split(',')
        .map(|s| regex::escape(s.trim().trim_start_matches('.')))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)^({})$", alternatives))
}

/// 递归查找后缀名匹配的文件
pub fn find_audio_files(path: impl AsRef<Path>, re_suf: &Regex) -> Vec<PathBuf> {
    let mut entries = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                return None;
            }
            let ext = path.extension()?;
            re_suf.is_match(&ext.to_string_lossy()).then(|| path.to_path_buf())
        })
        .collect::<Vec<_>>();
    entries.sort();
    entries
}
