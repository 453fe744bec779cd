//! Cost Metrics Operator - hourly usage report collector
//!
//! This binary queries the cluster's Prometheus every hour, writes cost and
//! resource-optimization usage reports and packages them for upload.

use operator_lib::{
    collector::{MetricsSource, PrometheusSource, QueryEngine},
    health::{Component, HealthRegistry},
    observability::{OperatorMetrics, StructuredLogger},
    packaging::FilePackager,
    status::OperatorStatus,
    DirectoryConfig,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod cycle;

const OPERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting cost-metrics-operator");

    let config = config::OperatorConfig::load()?;
    info!(cluster_id = %config.cluster_id, base_dir = %config.base_dir.display(), "Operator configured");

    let health_registry = HealthRegistry::new();

    let metrics = OperatorMetrics::new();

    let logger = StructuredLogger::new(&config.cluster_id);
    logger.log_startup(OPERATOR_VERSION, &config.prometheus_url);

    let mut status = OperatorStatus::new(&config.cluster_id, &config.operator_commit);
    status.prometheus.address = config.prometheus_url.clone();
    status.prometheus.skip_tls_verification = Some(config.skip_tls_verification);
    status.packaging.max_size_mb = Some(config.max_size_mb);
    status.packaging.max_reports = Some(config.max_reports);

    let dirs = DirectoryConfig::create(&config.base_dir)
        .with_context(|| format!("failed to create report directories under {}", config.base_dir.display()))?;
    health_registry.set_directories_prepared(true).await;

    let source = match PrometheusSource::new(&config.prometheus()) {
        Ok(source) => {
            status.prometheus.prometheus_configured = true;
            Some(Arc::new(source) as Arc<dyn MetricsSource>)
        }
        Err(e) => {
            error!(error = %e, "Failed to configure Prometheus source");
            status.prometheus.prometheus_configured = false;
            status.prometheus.config_error = e.to_string();
            health_registry
                .set_unhealthy(Component::Prometheus, e.to_string())
                .await;
            None
        }
    };

    let status = Arc::new(RwLock::new(status));

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        status.clone(),
    ));

    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    if let Some(source) = source {
        let engine = QueryEngine::new(source.clone())
            .with_timeout(config.query_timeout())
            .with_retry_policy(config.retry_policy());
        let operator = cycle::Operator::new(
            source,
            engine,
            FilePackager::new(dirs, config.file_action()),
            config.reports(),
            config.retention(),
            status,
            health_registry.clone(),
            logger.clone(),
        );
        tokio::spawn(operator.run(config.cycle_interval()));
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
