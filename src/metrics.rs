//! Prometheus metrics for query execution and engine traffic.
//!
//! Metrics are created lazily and only exported once [`init_metrics`] has
//! registered them with [`PROMETHEUS_REGISTRY`]. Recording into an
//! unregistered metric is harmless, so library users that never call
//! `init_metrics` pay only for the atomic updates.
//!
//! # Example
//! ```no_run
//! use kumquat_search::metrics::{init_metrics, gather_metrics, SEARCH_QUERIES_TOTAL};
//!
//! init_metrics().expect("metrics registered once");
//! SEARCH_QUERIES_TOTAL.with_label_values(&["Item"]).inc();
//! println!("{}", gather_metrics());
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Queries executed by builders
    ///
    /// Labels: entity
    pub static ref SEARCH_QUERIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_queries_total", "Total number of search queries executed")
            .namespace("kumquat_search"),
        &["entity"]
    ).expect("Failed to create SEARCH_QUERIES_TOTAL metric");

    /// Query round-trip duration in seconds
    ///
    /// Labels: entity
    pub static ref SEARCH_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "search_query_duration_seconds",
            "Search query round-trip duration in seconds"
        )
        .namespace("kumquat_search")
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["entity"]
    ).expect("Failed to create SEARCH_QUERY_DURATION_SECONDS metric");

    /// Failed queries
    ///
    /// Labels: kind
    pub static ref SEARCH_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_errors_total", "Total number of failed search queries")
            .namespace("kumquat_search"),
        &["kind"]
    ).expect("Failed to create SEARCH_ERRORS_TOTAL metric");

    /// Hits whose identifier no longer resolves to a stored entity
    ///
    /// Labels: entity
    pub static ref SEARCH_HITS_DROPPED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_hits_dropped_total", "Search hits dropped because the entity no longer exists")
            .namespace("kumquat_search"),
        &["entity"]
    ).expect("Failed to create SEARCH_HITS_DROPPED_TOTAL metric");

    /// Requests sent to the engine
    ///
    /// Labels: operation, outcome
    pub static ref ENGINE_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("engine_requests_total", "Total number of requests sent to the search engine")
            .namespace("kumquat_search"),
        &["operation", "outcome"]
    ).expect("Failed to create ENGINE_REQUESTS_TOTAL metric");
}

/// Register all metrics with the global registry.
///
/// Returns an error if called more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_QUERIES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_QUERY_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_ERRORS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_HITS_DROPPED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ENGINE_REQUESTS_TOTAL.clone()))?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&PROMETHEUS_REGISTRY.gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
