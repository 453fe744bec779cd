//! Periodic collection and packaging cycle
//!
//! Each cycle checks the Prometheus connection, generates reports for every
//! hour not yet collected (oldest first, back to the retention limit after
//! an outage), then packages the reports and trims old archives.

use chrono::{DateTime, DurationRound, Utc};
use operator_lib::{
    collector::{generate_reports, MetricsSource, QueryEngine, ReportConfig},
    dirconfig::DirectoryConfig,
    error::CollectorError,
    health::{Component, HealthRegistry},
    models::TimeRange,
    observability::StructuredLogger,
    packaging::{FilePackager, PackagingOutcome},
    status::OperatorStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Attempts at one hour before it is skipped
const MAX_HOUR_ATTEMPTS: u32 = 5;

const NO_DATA_MESSAGE: &str = "No data to report for the hour queried.";

fn truncate(time: DateTime<Utc>, unit: chrono::Duration) -> DateTime<Utc> {
    time.duration_trunc(unit).unwrap_or(time)
}

/// Hour starts to collect at `now`, oldest first.
///
/// Normally this is the previous full hour. After a gap since the last
/// successful hour, every missed hour is collected, but never further back
/// than `retention` (truncated to the day).
pub fn hours_to_collect(
    last_success: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    retention: chrono::Duration,
) -> Vec<DateTime<Utc>> {
    let hour = chrono::Duration::hours(1);
    let current = truncate(now, hour) - hour;

    let first = match last_success {
        Some(last) if current - last > hour => {
            let earliest = truncate(current - retention, chrono::Duration::days(1));
            (last + hour).max(earliest)
        }
        _ => current,
    };

    let mut hours = Vec::new();
    let mut start = first;
    while start <= current {
        hours.push(start);
        start += hour;
    }
    hours
}

pub struct Operator {
    source: Arc<dyn MetricsSource>,
    engine: QueryEngine,
    dirs: DirectoryConfig,
    packager: FilePackager,
    reports: ReportConfig,
    retention: chrono::Duration,
    status: Arc<RwLock<OperatorStatus>>,
    health: HealthRegistry,
    logger: StructuredLogger,
    attempts: HashMap<DateTime<Utc>, u32>,
}

impl Operator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn MetricsSource>,
        engine: QueryEngine,
        packager: FilePackager,
        reports: ReportConfig,
        retention: chrono::Duration,
        status: Arc<RwLock<OperatorStatus>>,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            engine,
            dirs: packager.dirs().clone(),
            packager,
            reports,
            retention,
            status,
            health,
            logger,
            attempts: HashMap::new(),
        }
    }

    /// Run a cycle immediately and then once every `period`
    pub async fn run(mut self, period: std::time::Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_cycle(Utc::now()).await;
        }
    }

    /// Run one full cycle as of `now`
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) {
        let started = Instant::now();
        let label = now.format("%Y-%m-%d %H:%M").to_string();
        self.logger.log_cycle_start(&label);

        if let Err(e) = self.dirs.check_exists_or_recreate() {
            warn!(error = %e, "Report directories are unavailable");
            self.health
                .set_unhealthy(Component::Storage, e.to_string())
                .await;
            return;
        }
        self.health.set_healthy(Component::Storage).await;

        if self.check_connection().await {
            let last_success = self.status.read().await.prometheus.last_query_success_time;
            for hour in hours_to_collect(last_success, now, self.retention) {
                if !self.collect_hour(hour).await {
                    break;
                }
            }
        }

        self.package().await;
        self.logger
            .log_cycle_finished(&label, started.elapsed().as_secs_f64());
    }

    async fn check_connection(&self) -> bool {
        let result = self.source.test_connection().await;
        let mut status = self.status.write().await;
        status.prometheus.prometheus_configured = true;
        match result {
            Ok(()) => {
                status.prometheus.prometheus_connected = true;
                status.prometheus.connection_error.clear();
                drop(status);
                self.health.set_healthy(Component::Prometheus).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Prometheus connection test failed");
                status.prometheus.prometheus_connected = false;
                status.prometheus.connection_error = e.to_string();
                drop(status);
                self.health
                    .set_unhealthy(Component::Prometheus, e.to_string())
                    .await;
                false
            }
        }
    }

    /// Generate reports for the hour starting at `start`; false stops the
    /// cycle from moving on to later hours
    async fn collect_hour(&mut self, start: DateTime<Utc>) -> bool {
        let range = TimeRange::hour(start);
        let label = start.to_rfc3339();

        let mut status = self.status.read().await.clone();
        if status.prometheus.last_query_success_time == Some(start) {
            info!(start = %range.start, end = %range.end, "Reports already generated for range");
            return true;
        }
        status.prometheus.last_query_start_time = Some(start);

        let attempts = self.attempts.entry(start).or_insert(0);
        if *attempts >= MAX_HOUR_ATTEMPTS {
            info!(start = %label, "Query retry limit exceeded, skipping hour");
            *self.status.write().await = status;
            return true;
        }

        let result = generate_reports(&self.reports, &self.dirs, &self.engine, &range, &mut status).await;
        let proceed = match result {
            Ok(summary) => {
                status.reports.data_collected = true;
                status.reports.data_collection_message.clear();
                status.prometheus.last_query_success_time = Some(start);
                self.logger
                    .log_reports_generated(&label, summary.files.len(), summary.rows);
                self.attempts.clear();
                true
            }
            Err(CollectorError::NoData) => {
                status.reports.data_collected = false;
                status.reports.data_collection_message = NO_DATA_MESSAGE.to_string();
                status.prometheus.last_query_success_time = Some(start);
                self.logger.log_reports_skipped(&label, NO_DATA_MESSAGE);
                self.attempts.clear();
                true
            }
            Err(e @ CollectorError::NoEnabledNamespaces) => {
                status.reports.data_collected = true;
                status.reports.data_collection_message = e.to_string();
                status.prometheus.last_query_success_time = Some(start);
                self.logger.log_reports_skipped(&label, &e.to_string());
                self.attempts.clear();
                true
            }
            Err(e) => {
                *attempts += 1;
                status.reports.data_collected = false;
                status.reports.data_collection_message = format!("error: {e}");
                self.logger.log_reports_failed(&label, &e.to_string());
                false
            }
        };

        if proceed {
            self.health.set_healthy(Component::Collector).await;
        } else {
            self.health
                .set_degraded(Component::Collector, status.reports.data_collection_message.clone())
                .await;
        }
        *self.status.write().await = status;
        proceed
    }

    async fn package(&self) {
        let mut status = self.status.read().await.clone();

        match self.packager.package_reports(&mut status) {
            Ok(PackagingOutcome::Packaged { archives, .. }) => {
                self.logger.log_packaging(&archives, None);
                self.health.set_healthy(Component::Packager).await;
            }
            Ok(PackagingOutcome::NoReports) => {
                self.health.set_healthy(Component::Packager).await;
            }
            Err(e) => {
                self.logger.log_packaging(&[], Some(&e.to_string()));
                self.health
                    .set_degraded(Component::Packager, e.to_string())
                    .await;
            }
        }

        match self.packager.trim_packages(&mut status) {
            Ok(outcome) => self.logger.log_trim(outcome.stored, outcome.removed.len()),
            Err(e) => warn!(error = %e, "Failed to trim packages"),
        }

        *self.status.write().await = status;
    }
}
