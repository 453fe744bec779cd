//! Operator status snapshot
//!
//! The status is updated as reports are generated and packaged, and a copy
//! of it is embedded in every manifest. Field names follow the custom
//! resource status the operator publishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default maximum uncompressed size of one archived CSV, in megabytes
pub const DEFAULT_MAX_SIZE_MB: i64 = 100;

/// Default number of archive batches kept in the upload directory
pub const DEFAULT_MAX_REPORTS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorStatus {
    #[serde(rename = "clusterID", default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator_commit: String,

    #[serde(default)]
    pub prometheus: PrometheusStatus,

    #[serde(default)]
    pub reports: ReportsStatus,

    #[serde(default)]
    pub packaging: PackagingStatus,
}

impl OperatorStatus {
    pub fn new(cluster_id: impl Into<String>, operator_commit: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            operator_commit: operator_commit.into(),
            ..Default::default()
        }
    }
}

/// State of the connection to the metrics source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrometheusStatus {
    #[serde(default)]
    pub prometheus_configured: bool,

    #[serde(rename = "configuration_error", default, skip_serializing_if = "String::is_empty")]
    pub config_error: String,

    #[serde(default)]
    pub prometheus_connected: bool,

    #[serde(rename = "prometheus_connection_error", default, skip_serializing_if = "String::is_empty")]
    pub connection_error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_query_start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_query_success_time: Option<DateTime<Utc>>,

    #[serde(rename = "service_address", default, skip_serializing_if = "String::is_empty")]
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_tls_verification: Option<bool>,
}

/// Progress of report generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportsStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub report_month: String,

    /// `"<start> - <end>"` of the last hour queried
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_hour_queried: String,

    #[serde(default)]
    pub data_collected: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_collection_message: String,
}

/// Packaging limits and the outcome of the last packaging cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackagingStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_packaging_time: Option<DateTime<Utc>>,

    #[serde(rename = "max_reports_to_store", default, skip_serializing_if = "Option::is_none")]
    pub max_reports: Option<i64>,

    #[serde(rename = "max_size_MB", default, skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packaged_files: Vec<String>,

    /// Error of the last packaging cycle; empty when it succeeded
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    #[serde(rename = "number_reports_stored", default, skip_serializing_if = "Option::is_none")]
    pub report_count: Option<i64>,
}

impl PackagingStatus {
    /// Byte threshold at which a CSV is split
    pub fn max_bytes(&self) -> i64 {
        self.max_size_mb
            .unwrap_or(DEFAULT_MAX_SIZE_MB)
            .saturating_mul(1024 * 1024)
    }

    /// Number of archive batches to retain
    pub fn max_reports(&self) -> i64 {
        self.max_reports.unwrap_or(DEFAULT_MAX_REPORTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_serializes_with_resource_field_names() {
        let mut status = OperatorStatus::new("cluster-a", "abc123");
        status.packaging.max_size_mb = Some(100);
        status.packaging.report_count = Some(2);
        status.reports.report_month = "01".to_string();

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["clusterID"], "cluster-a");
        assert_eq!(json["operator_commit"], "abc123");
        assert_eq!(json["packaging"]["max_size_MB"], 100);
        assert_eq!(json["packaging"]["number_reports_stored"], 2);
        assert_eq!(json["reports"]["report_month"], "01");
        assert!(json["packaging"].get("error").is_none());
    }

    #[test]
    fn test_status_round_trips_timestamps() {
        let mut status = OperatorStatus::default();
        status.packaging.last_successful_packaging_time =
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());

        let json = serde_json::to_string(&status).unwrap();
        let back: OperatorStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_packaging_limits_default() {
        let packaging = PackagingStatus::default();
        assert_eq!(packaging.max_bytes(), 100 * 1024 * 1024);
        assert_eq!(packaging.max_reports(), 30);

        let packaging = PackagingStatus {
            max_size_mb: Some(1),
            max_reports: Some(2),
            ..Default::default()
        };
        assert_eq!(packaging.max_bytes(), 1_048_576);
        assert_eq!(packaging.max_reports(), 2);
    }

    #[test]
    fn test_huge_size_limit_saturates() {
        let packaging = PackagingStatus {
            max_size_mb: Some(i64::MAX / 2),
            ..Default::default()
        };
        assert_eq!(packaging.max_bytes(), i64::MAX);
    }
}
