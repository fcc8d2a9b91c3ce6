//! Media metrics.
//!
//! Counters for probes and metadata cache lookups, labelled by kind
//! (`media` or `speech`).

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Probes run against ffprobe or the TTS server, by kind and status.
    pub const PROBES_TOTAL: &str = "epi_media_probes_total";

    /// Metadata cache hits by kind.
    pub const CACHE_HITS_TOTAL: &str = "epi_media_cache_hits_total";

    /// Metadata cache misses by kind.
    pub const CACHE_MISSES_TOTAL: &str = "epi_media_cache_misses_total";
}

/// Record a completed probe.
pub fn record_probe(kind: &'static str, success: bool) {
    counter!(
        names::PROBES_TOTAL,
        "kind" => kind,
        "status" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

/// Record a cache lookup.
pub fn record_cache_lookup(kind: &'static str, hit: bool) {
    if hit {
        counter!(names::CACHE_HITS_TOTAL, "kind" => kind).increment(1);
    } else {
        counter!(names::CACHE_MISSES_TOTAL, "kind" => kind).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::PROBES_TOTAL.starts_with("epi_media_"));
        assert!(names::CACHE_HITS_TOTAL.contains("hits"));
        assert!(names::CACHE_MISSES_TOTAL.contains("misses"));
    }
}
