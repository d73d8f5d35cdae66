use std::sync::LazyLock;

use prometheus::*;

static METRIC_FINGERPRINT_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "audedup_fingerprint_count",
        "count of the fingerprinted files",
        &["status"]
    )
    .unwrap()
});

static METRIC_EXTRACT_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "audedup_extract_duration",
        "duration of the per-file feature extraction in seconds",
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap()
});

static METRIC_DUPLICATE_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("audedup_duplicate_count", "count of the duplicate files").unwrap()
});

static METRIC_DELETE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "audedup_delete_count",
        "count of the deleted duplicate files",
        &["status"]
    )
    .unwrap()
});

/// 按结果状态计数，`ok` 或 `error`
pub fn inc_fingerprint(status: &str) {
    METRIC_FINGERPRINT_COUNT.with_label_values(&[status]).inc();
}

pub fn observe_extract_duration(seconds: f64) {
    METRIC_EXTRACT_DURATION.observe(seconds);
}

pub fn inc_duplicates(n: usize) {
    METRIC_DUPLICATE_COUNT.inc_by(n as u64);
}

pub fn inc_delete(status: &str) {
    METRIC_DELETE_COUNT.with_label_values(&[status]).inc();
}
