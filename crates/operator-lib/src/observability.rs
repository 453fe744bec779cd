//! Observability infrastructure for the cost metrics operator
//!
//! Provides:
//! - Prometheus metrics (query latency, failures and retries, rows written, archives)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for query latency (in seconds)
const QUERY_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<OperatorMetricsInner> = OnceLock::new();

struct OperatorMetricsInner {
    query_latency_seconds: Histogram,
    failed_queries: IntCounter,
    query_retries: IntCounter,
    report_rows_written: IntCounterVec,
    archives_created: IntCounter,
    archives_stored: IntGauge,
    last_successful_packaging: IntGauge,
}

impl OperatorMetricsInner {
    fn new() -> Self {
        Self {
            query_latency_seconds: register_histogram!(
                "cost_metrics_query_latency_seconds",
                "Time spent waiting on the metrics source per query",
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            failed_queries: register_int_counter!(
                "cost_metrics_failed_queries_total",
                "Queries that failed after exhausting their retries"
            )
            .expect("Failed to register failed_queries"),

            query_retries: register_int_counter!(
                "cost_metrics_query_retries_total",
                "Query attempts deferred to a retry round"
            )
            .expect("Failed to register query_retries"),

            report_rows_written: register_int_counter_vec!(
                "cost_metrics_report_rows_total",
                "Rows handed to the report writer",
                &["report"]
            )
            .expect("Failed to register report_rows_written"),

            archives_created: register_int_counter!(
                "cost_metrics_archives_created_total",
                "Archives written to the upload directory"
            )
            .expect("Failed to register archives_created"),

            archives_stored: register_int_gauge!(
                "cost_metrics_archives_stored",
                "Archive batches currently kept in the upload directory"
            )
            .expect("Failed to register archives_stored"),

            last_successful_packaging: register_int_gauge!(
                "cost_metrics_last_successful_packaging_timestamp_seconds",
                "Unix time of the last packaging cycle that produced archives"
            )
            .expect("Failed to register last_successful_packaging"),
        }
    }
}

/// Operator metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct OperatorMetrics {
    _private: (),
}

impl Default for OperatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(OperatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &OperatorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_query_latency(&self, duration_secs: f64) {
        self.inner().query_latency_seconds.observe(duration_secs);
    }

    pub fn inc_failed_queries(&self) {
        self.inner().failed_queries.inc();
    }

    pub fn inc_query_retries(&self, count: u64) {
        self.inner().query_retries.inc_by(count);
    }

    pub fn add_report_rows(&self, report: &str, rows: u64) {
        self.inner()
            .report_rows_written
            .with_label_values(&[report])
            .inc_by(rows);
    }

    pub fn add_archives_created(&self, count: u64) {
        self.inner().archives_created.inc_by(count);
    }

    pub fn set_archives_stored(&self, count: i64) {
        self.inner().archives_stored.set(count);
    }

    pub fn set_last_successful_packaging(&self, unix_secs: i64) {
        self.inner().last_successful_packaging.set(unix_secs);
    }
}

/// Structured logger for operator lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    cluster_id: String,
}

impl StructuredLogger {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
        }
    }

    pub fn log_startup(&self, version: &str, prometheus_url: &str) {
        info!(
            event = "operator_started",
            cluster_id = %self.cluster_id,
            operator_version = %version,
            prometheus_url = %prometheus_url,
            "Cost metrics operator started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "operator_shutdown",
            cluster_id = %self.cluster_id,
            reason = %reason,
            "Cost metrics operator shutting down"
        );
    }

    pub fn log_cycle_start(&self, hour: &str) {
        info!(
            event = "cycle_started",
            cluster_id = %self.cluster_id,
            hour = %hour,
            "Starting report cycle"
        );
    }

    pub fn log_cycle_finished(&self, hour: &str, duration_secs: f64) {
        info!(
            event = "cycle_finished",
            cluster_id = %self.cluster_id,
            hour = %hour,
            duration_secs = duration_secs,
            "Report cycle finished"
        );
    }

    /// Log the outcome of report generation for one hour
    pub fn log_reports_generated(&self, hour: &str, reports: usize, rows: usize) {
        info!(
            event = "reports_generated",
            cluster_id = %self.cluster_id,
            hour = %hour,
            reports = reports,
            rows = rows,
            "Generated usage reports"
        );
    }

    /// Sentinel outcomes such as an empty hour are not failures
    pub fn log_reports_skipped(&self, hour: &str, reason: &str) {
        info!(
            event = "reports_skipped",
            cluster_id = %self.cluster_id,
            hour = %hour,
            reason = %reason,
            "No reports generated"
        );
    }

    pub fn log_reports_failed(&self, hour: &str, error: &str) {
        warn!(
            event = "reports_failed",
            cluster_id = %self.cluster_id,
            hour = %hour,
            error = %error,
            "Report generation failed"
        );
    }

    pub fn log_packaging(&self, archives: &[String], error: Option<&str>) {
        match error {
            None => info!(
                event = "reports_packaged",
                cluster_id = %self.cluster_id,
                archives = archives.len(),
                files = ?archives,
                "Packaged reports for upload"
            ),
            Some(error) => warn!(
                event = "packaging_failed",
                cluster_id = %self.cluster_id,
                error = %error,
                "Packaging reports failed"
            ),
        }
    }

    pub fn log_trim(&self, stored: usize, removed: usize) {
        info!(
            event = "packages_trimmed",
            cluster_id = %self.cluster_id,
            stored = stored,
            removed = removed,
            "Trimmed stored packages"
        );
    }
}
