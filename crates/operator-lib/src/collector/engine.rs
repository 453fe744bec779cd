//! Query execution with retry
//!
//! Queries in a group run one after another against the metrics source.
//! A query that fails is set aside; once the group has been attempted the
//! failed subset is retried after an exponential backoff, for at most
//! `max_retries` rounds. Result-shape mismatches are not retried.

use super::aggregation::MappedResults;
use super::query::Query;
use super::MetricsSource;
use crate::error::{CollectorError, SourceError};
use crate::models::{InstantSample, QueryResult, QueryValue, TimeRange};
use crate::observability::OperatorMetrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default number of retry rounds
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default per-call timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// Backoff policy between retry rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Length of one backoff unit; the wait is `2^(max_retries - remaining)` units
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Wait before the next round, given the retries left after decrementing
    pub fn backoff(&self, remaining: u32) -> Duration {
        let exponent = self.max_retries.saturating_sub(remaining).min(30);
        let units = 2f64.powi(exponent as i32).max(1.0);
        self.backoff_unit.mul_f64(units)
    }
}

/// Point or window a query group is evaluated at
#[derive(Debug, Clone, Copy)]
enum Evaluation {
    Range(TimeRange),
    Instant(DateTime<Utc>),
}

impl Evaluation {
    fn expected(&self) -> &'static str {
        match self {
            Evaluation::Range(_) => "matrix",
            Evaluation::Instant(_) => "vector",
        }
    }
}

/// Runs query groups against a metrics source
#[derive(Clone)]
pub struct QueryEngine {
    source: Arc<dyn MetricsSource>,
    timeout: Duration,
    retry: RetryPolicy,
    metrics: OperatorMetrics,
}

impl QueryEngine {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self {
            source,
            timeout: DEFAULT_QUERY_TIMEOUT,
            retry: RetryPolicy::default(),
            metrics: OperatorMetrics::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate every query over `range`, merging matrix results into `results`
    pub async fn query_range(
        &self,
        queries: &[Query],
        range: &TimeRange,
        results: &mut MappedResults,
    ) -> Result<(), CollectorError> {
        self.run(queries, Evaluation::Range(*range), results).await
    }

    /// Evaluate every query at `time`, merging vector results into `results`
    pub async fn query_instant(
        &self,
        queries: &[Query],
        time: DateTime<Utc>,
        results: &mut MappedResults,
    ) -> Result<(), CollectorError> {
        self.run(queries, Evaluation::Instant(time), results).await
    }

    /// Single instant query without retry, returning the raw samples
    pub async fn query_vector(
        &self,
        query: &Query,
        time: DateTime<Utc>,
    ) -> Result<Vec<InstantSample>, CollectorError> {
        let evaluation = Evaluation::Instant(time);
        let result = self
            .execute(query, evaluation)
            .await
            .map_err(CollectorError::NamespaceFilter)?;
        log_warnings(query, &result);
        match result.value {
            QueryValue::Vector(samples) => Ok(samples),
            other => Err(CollectorError::UnexpectedResult {
                expected: evaluation.expected(),
                got: other.type_name().to_string(),
            }),
        }
    }

    async fn run(
        &self,
        queries: &[Query],
        evaluation: Evaluation,
        results: &mut MappedResults,
    ) -> Result<(), CollectorError> {
        let mut pending: Vec<&Query> = queries.iter().collect();
        let mut retries = self.retry.max_retries;

        loop {
            let mut failed = Vec::new();

            for query in pending {
                let result = match self.execute(query, evaluation).await {
                    Ok(result) => result,
                    Err(err) if retries > 0 => {
                        info!(
                            query = %query.name,
                            error = %err,
                            "Query failed, appending to queries to retry"
                        );
                        failed.push(query);
                        continue;
                    }
                    Err(err) => {
                        self.metrics.inc_failed_queries();
                        return Err(CollectorError::Query {
                            query: query.query_string.clone(),
                            source: err,
                        });
                    }
                };

                log_warnings(query, &result);
                match (&result.value, evaluation) {
                    (QueryValue::Matrix(matrix), Evaluation::Range(_)) => {
                        results.merge_matrix(matrix, query)
                    }
                    (QueryValue::Vector(vector), Evaluation::Instant(_)) => {
                        results.merge_vector(vector, query)
                    }
                    (other, _) => {
                        return Err(CollectorError::UnexpectedResult {
                            expected: evaluation.expected(),
                            got: other.type_name().to_string(),
                        })
                    }
                }
            }

            if failed.is_empty() {
                return Ok(());
            }

            retries -= 1;
            let wait = self.retry.backoff(retries);
            self.metrics.inc_query_retries(failed.len() as u64);
            info!(
                failed = failed.len(),
                retries_left = retries,
                wait_secs = wait.as_secs_f64(),
                "Retrying failed queries"
            );
            tokio::time::sleep(wait).await;
            pending = failed;
        }
    }

    async fn execute(&self, query: &Query, evaluation: Evaluation) -> Result<QueryResult, SourceError> {
        debug!(query = %query.name, "Executing query");
        let started = Instant::now();
        let call = async {
            match evaluation {
                Evaluation::Range(range) => self.source.query_range(&query.query_string, &range).await,
                Evaluation::Instant(time) => self.source.query(&query.query_string, time).await,
            }
        };
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SourceError::Timeout(self.timeout)),
        };
        self.metrics
            .observe_query_latency(started.elapsed().as_secs_f64());
        outcome
    }
}

fn log_warnings(query: &Query, result: &QueryResult) {
    if !result.warnings.is_empty() {
        warn!(query = %query.name, warnings = ?result.warnings, "Query returned warnings");
    }
}
