//! Batch manifest

use crate::error::{PackagingError, PackagingStep};
use crate::status::OperatorStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Name of the manifest inside the staging directory and every archive
pub const MANIFEST_FILE: &str = "manifest.json";

/// Name a staged CSV is given inside an archive
pub fn upload_name(uid: &str, index: usize) -> String {
    format!("{uid}_openshift_usage_report.{index}.csv")
}

/// Describes one packaged batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub uuid: String,
    pub cluster_id: String,
    pub version: String,
    pub date: DateTime<Utc>,
    pub files: Vec<String>,
    pub resource_optimization_files: Vec<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub cr_status: OperatorStatus,
    pub certified: bool,
    pub daily_reports: bool,
}

impl Manifest {
    /// Manifest for the staged file names in `files`, in upload order
    pub fn new(
        uid: &str,
        status: &OperatorStatus,
        files: &[String],
        interval: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Self {
        let mut cost = Vec::new();
        let mut resource_optimization = Vec::new();
        for (index, name) in files.iter().enumerate() {
            if name.contains("ros-openshift") {
                resource_optimization.push(upload_name(uid, index));
            } else {
                cost.push(upload_name(uid, index));
            }
        }

        Self {
            uuid: uid.to_string(),
            cluster_id: status.cluster_id.clone(),
            version: status.operator_commit.clone(),
            date: Utc::now(),
            files: cost,
            resource_optimization_files: resource_optimization,
            start: interval.map(|(start, _)| start),
            end: interval.map(|(_, end)| end),
            cr_status: status.clone(),
            certified: false,
            daily_reports: true,
        }
    }

    /// Pretty JSON with one-space indentation
    pub fn to_json(&self) -> Result<Vec<u8>, PackagingError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }

    pub fn render(&self, path: &Path) -> Result<(), PackagingError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| PackagingError::io(PackagingStep::Manifest, path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_files_are_classified_by_name() {
        let status = OperatorStatus::new("cluster-a", "abc123");
        let files = vec![
            "u-cm-openshift-node-usage-202401.csv".to_string(),
            "u-cm-openshift-pod-usage-202401.csv".to_string(),
            "u-ros-openshift-container-202401.csv".to_string(),
        ];
        let manifest = Manifest::new("u", &status, &files, None);

        assert_eq!(
            manifest.files,
            vec!["u_openshift_usage_report.0.csv", "u_openshift_usage_report.1.csv"]
        );
        assert_eq!(
            manifest.resource_optimization_files,
            vec!["u_openshift_usage_report.2.csv"]
        );
        assert_eq!(manifest.cluster_id, "cluster-a");
        assert_eq!(manifest.version, "abc123");
        assert!(manifest.daily_reports);
        assert!(!manifest.certified);
    }

    #[test]
    fn test_json_uses_single_space_indent() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let manifest = Manifest::new(
            "u",
            &OperatorStatus::default(),
            &[],
            Some((start, start)),
        );
        let json = String::from_utf8(manifest.to_json().unwrap()).unwrap();

        assert!(json.starts_with("{\n \"uuid\": \"u\",\n"));
        assert!(json.contains("\n \"start\": \"2024-01-15T10:00:00Z\""));
        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
    }
}
