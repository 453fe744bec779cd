//! Operator configuration

use anyhow::{Context, Result};
use operator_lib::{
    collector::{PrometheusConfig, RetryPolicy},
    dirconfig::{DirectoryConfig, DEFAULT_BASE_DIR},
    packaging::FileAction,
    status::{DEFAULT_MAX_REPORTS, DEFAULT_MAX_SIZE_MB},
    ReportConfig,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Operator configuration, read from `COSTMGMT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    /// Cluster identifier recorded in every manifest
    #[serde(default = "default_cluster_id")]
    pub cluster_id: String,

    /// Build identifier recorded as the manifest version
    #[serde(default = "default_operator_commit")]
    pub operator_commit: String,

    /// API server port for health/metrics/status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    #[serde(default)]
    pub bearer_token_file: Option<PathBuf>,

    #[serde(default)]
    pub ca_cert_file: Option<PathBuf>,

    #[serde(default)]
    pub skip_tls_verification: bool,

    /// Per-query timeout in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Size in megabytes at which a report is split
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: i64,

    /// Archived batches kept in the upload directory
    #[serde(default = "default_max_reports")]
    pub max_reports: i64,

    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Days of missed hours collected after an outage
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default)]
    pub disable_cost_management: bool,

    #[serde(default)]
    pub disable_resource_optimization: bool,

    /// Move reports into staging; copy them when false
    #[serde(default = "default_move_files")]
    pub move_files: bool,
}

fn default_cluster_id() -> String {
    std::env::var("CLUSTER_ID").unwrap_or_else(|_| "unknown".to_string())
}

fn default_operator_commit() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_prometheus_url() -> String {
    "https://thanos-querier.openshift-monitoring.svc:9091".to_string()
}

fn default_query_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BASE_DIR)
}

fn default_max_size_mb() -> i64 {
    DEFAULT_MAX_SIZE_MB
}

fn default_max_reports() -> i64 {
    DEFAULT_MAX_REPORTS
}

fn default_cycle_interval() -> u64 {
    3600
}

fn default_retention_days() -> i64 {
    14
}

fn default_move_files() -> bool {
    true
}

impl OperatorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("COSTMGMT"))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn prometheus(&self) -> PrometheusConfig {
        PrometheusConfig {
            address: self.prometheus_url.clone(),
            bearer_token_file: self.bearer_token_file.clone(),
            ca_cert_file: self.ca_cert_file.clone(),
            skip_tls_verification: self.skip_tls_verification,
            request_timeout: self.query_timeout(),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    pub fn directories(&self) -> DirectoryConfig {
        DirectoryConfig::new(&self.base_dir)
    }

    pub fn reports(&self) -> ReportConfig {
        ReportConfig {
            disable_cost_management: self.disable_cost_management,
            disable_resource_optimization: self.disable_resource_optimization,
        }
    }

    pub fn file_action(&self) -> FileAction {
        if self.move_files {
            FileAction::Move
        } else {
            FileAction::Copy
        }
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs.max(1))
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days.max(0))
    }
}
