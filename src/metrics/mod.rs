//! Prometheus metrics for the indexer
//!
//! This module tracks:
//! - Ingestion: cycles by outcome, cycle duration, documents indexed and
//!   rejected, API key rotations
//! - Election: whether this replica currently leads
//! - Read API: requests by endpoint and status
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram,
    register_histogram_vec, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramVec,
    TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct IndexerMetrics {
    cycles: CounterVec,
    cycle_duration: Histogram,
    documents_indexed: Counter,
    documents_failed: Counter,
    key_rotations: Counter,
    is_leader: Gauge,
    api_requests: CounterVec,
    api_duration: HistogramVec,
}

static METRICS: OnceLock<IndexerMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = yt_indexer::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics initialization failed");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = IndexerMetrics {
        cycles: register_counter_vec!(
            "yt_indexer_cycles_total",
            "Ingestion cycles by outcome",
            &["outcome"]
        )?,
        cycle_duration: register_histogram!(
            "yt_indexer_cycle_duration_seconds",
            "Duration of one ingestion cycle in seconds",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 60.0]
        )?,
        documents_indexed: register_counter!(
            "yt_indexer_documents_indexed_total",
            "Documents accepted by the search index"
        )?,
        documents_failed: register_counter!(
            "yt_indexer_documents_failed_total",
            "Documents rejected by the search index"
        )?,
        key_rotations: register_counter!(
            "yt_indexer_key_rotations_total",
            "API key rotations after quota exhaustion"
        )?,
        is_leader: register_gauge!(
            "yt_indexer_is_leader",
            "Whether this replica leads the poller (1 = yes, 0 = no)"
        )?,
        api_requests: register_counter_vec!(
            "yt_indexer_api_requests_total",
            "Read API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "yt_indexer_api_request_duration_seconds",
            "Read API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        )?,
    };

    METRICS
        .set(metrics)
        .map_err(|_| "Indexer metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the end of an ingestion cycle
pub fn record_cycle(outcome: &str, duration_secs: f64) {
    let Some(m) = METRICS.get() else {
        return;
    };

    m.cycles.with_label_values(&[outcome]).inc();
    m.cycle_duration.observe(duration_secs);
}

/// Record bulk indexing results
pub fn record_documents(indexed: u64, failed: u64) {
    let Some(m) = METRICS.get() else {
        return;
    };

    if indexed > 0 {
        m.documents_indexed.inc_by(indexed as f64);
    }
    if failed > 0 {
        m.documents_failed.inc_by(failed as f64);
    }
}

pub fn record_key_rotation() {
    if let Some(m) = METRICS.get() {
        m.key_rotations.inc();
    }
}

/// Update the leadership gauge
pub fn set_leader(is_leader: bool) {
    if let Some(m) = METRICS.get() {
        m.is_leader.set(if is_leader { 1.0 } else { 0.0 });
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
    m.api_duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

// ============================================================================
// Tests
// ============================================================================
