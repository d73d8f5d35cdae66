use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::metrics;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub removed: usize,
    pub failed: usize,
}

/// 逐个删除文件，单个文件失败不影响其余文件
pub fn delete_files<P: AsRef<Path>>(paths: &[P]) -> DeleteReport {
    let mut report = DeleteReport::default();
    for path in paths {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => {
                info!("已删除重复文件: {}", path.display());
                metrics::inc_delete("ok");
                report.removed += 1;
            }
            Err(e) => {
                warn!("删除文件时出错: {}: {}", path.display(), e);
                metrics::inc_delete("error");
                report.failed += 1;
            }
        }
    }
    report
}
