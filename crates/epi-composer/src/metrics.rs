//! Composer metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Episode metadata builds by status.
    pub const META_BUILDS_TOTAL: &str = "epi_meta_builds_total";

    /// Compositions built by status.
    pub const COMPOSITIONS_TOTAL: &str = "epi_compositions_total";

    /// Requests answered from the in-process memo tables, by kind.
    pub const MEMO_HITS_TOTAL: &str = "epi_memo_hits_total";
}

fn status(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "error"
    }
}

pub fn record_meta_build(success: bool) {
    counter!(names::META_BUILDS_TOTAL, "status" => status(success)).increment(1);
}

pub fn record_composition(success: bool) {
    counter!(names::COMPOSITIONS_TOTAL, "status" => status(success)).increment(1);
}

pub fn record_memo_hit(kind: &'static str) {
    counter!(names::MEMO_HITS_TOTAL, "kind" => kind).increment(1);
}
