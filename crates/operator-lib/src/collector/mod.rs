//! Metrics collection and report generation
//!
//! This module turns Prometheus query results into usage reports:
//! - Query declarations and the built-in query catalog
//! - Aggregation of series into keyed rows
//! - Sequential query execution with per-call timeout and retry
//! - An HTTP metrics source speaking the Prometheus query API
//! - Hourly report generation for cost and resource-optimization data

mod aggregation;
mod engine;
mod generate;
mod prometheus;
mod query;
pub mod queries;

#[cfg(test)]
mod tests;

pub use aggregation::{
    find_fields, format_value, generate_key, reduce, resource_id, transform_factor,
    MappedResults, MappedValues,
};
pub use engine::{QueryEngine, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_QUERY_TIMEOUT};
pub use generate::{generate_reports, ReportConfig, ReportKind, ReportSummary};
pub use prometheus::{PrometheusConfig, PrometheusSource};
pub use query::{AggregationSpec, Method, Query};

use crate::error::SourceError;
use crate::models::{QueryResult, TimeRange};
use chrono::{DateTime, Utc};

pub use async_trait::async_trait;

/// Query used to check that the source answers
const CONNECTION_TEST_QUERY: &str = "up";

/// A source of time-series query results
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Evaluate `query` over `range`; a successful result is normally a matrix
    async fn query_range(&self, query: &str, range: &TimeRange) -> Result<QueryResult, SourceError>;

    /// Evaluate `query` at `time`; a successful result is normally a vector
    async fn query(&self, query: &str, time: DateTime<Utc>) -> Result<QueryResult, SourceError>;

    /// Issue a trivial query at the current instant
    async fn test_connection(&self) -> Result<(), SourceError> {
        self.query(CONNECTION_TEST_QUERY, Utc::now()).await.map(|_| ())
    }
}
