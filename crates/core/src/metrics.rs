//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Indexers (requests by outcome, search result counts, capability negotiation)
//! - RSS sync (new releases per cycle)
//! - Download clients (submissions, cancellations, label retries)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Indexer Metrics
// =============================================================================

/// Indexer requests total by outcome.
pub static INDEXER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelfetch_indexer_requests_total",
            "Total indexer requests",
        ),
        // operation: "search", "latest"
        // status: "success", "empty_result", "connectivity", "protocol", "auth"
        &["indexer", "operation", "status"],
    )
    .unwrap()
});

/// Releases returned per aggregated search, after de-duplication.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelfetch_search_results",
            "Number of releases returned per aggregated search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        &[],
    )
    .unwrap()
});

/// Aggregated searches where some indexers failed.
pub static PARTIAL_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelfetch_search_partial_failures_total",
        "Total searches where at least one indexer failed",
    )
    .unwrap()
});

/// Capability negotiations by result.
pub static CAPABILITY_NEGOTIATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelfetch_capability_negotiations_total",
            "Total capability negotiations",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// RSS Sync Metrics
// =============================================================================

/// New releases discovered by RSS sync.
pub static RSS_NEW_RELEASES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelfetch_rss_new_releases_total",
            "Total new releases discovered by RSS sync",
        ),
        &["indexer"],
    )
    .unwrap()
});

// =============================================================================
// Download Client Metrics
// =============================================================================

/// Submissions total by result.
pub static SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelfetch_submissions_total", "Total release submissions"),
        &["client", "result"], // "success", "failed"
    )
    .unwrap()
});

/// Cancellations total by result.
pub static CANCELLATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelfetch_cancellations_total", "Total download cancellations"),
        &["client", "result"], // "success", "not_found", "failed"
    )
    .unwrap()
});

/// Label applications that ran out of attempts.
pub static LABEL_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelfetch_label_timeouts_total",
        "Total label applications that timed out",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Indexers
        Box::new(INDEXER_REQUESTS.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(PARTIAL_FAILURES.clone()),
        Box::new(CAPABILITY_NEGOTIATIONS.clone()),
        // RSS
        Box::new(RSS_NEW_RELEASES.clone()),
        // Download clients
        Box::new(SUBMISSIONS.clone()),
        Box::new(CANCELLATIONS.clone()),
        Box::new(LABEL_TIMEOUTS.clone()),
    ]
}
