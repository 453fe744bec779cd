//! Hourly report generation
//!
//! One call covers one hour:
//! - node queries run first; an empty result ends the call with `NoData`
//! - cost-management reports (node, pod, storage, VM, namespace, NVIDIA GPU)
//!   are written from range queries over the hour
//! - resource-optimization reports are written from instant queries at the
//!   end of each of the hour's four 15 minute windows, for opted-in
//!   namespaces only

use super::aggregation::{resource_id, MappedResults, MappedValues};
use super::engine::QueryEngine;
use super::queries;
use crate::dirconfig::DirectoryConfig;
use crate::error::CollectorError;
use crate::models::TimeRange;
use crate::observability::OperatorMetrics;
use crate::report::{
    write_report, DateTimes, NamespaceRow, NodeRow, NodeRows, NvidiaGpuRow, PodRow, ReportRow,
    RosContainerRow, RosNamespaceRow, StorageRow, VmRow,
};
use crate::status::OperatorStatus;
use chrono::Duration;
use std::path::Path;
use tracing::info;

/// Resource-optimization windows per hour
const ROS_WINDOWS: usize = 4;

/// Time format of `last_hour_queried`
const STATUS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which report families to generate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportConfig {
    pub disable_cost_management: bool,
    pub disable_resource_optimization: bool,
}

/// Report files written by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Node,
    Pod,
    Storage,
    Vm,
    Namespace,
    NvidiaGpu,
    RosContainer,
    RosNamespace,
}

impl ReportKind {
    pub const ALL: [ReportKind; 8] = [
        ReportKind::Node,
        ReportKind::Pod,
        ReportKind::Storage,
        ReportKind::Vm,
        ReportKind::Namespace,
        ReportKind::NvidiaGpu,
        ReportKind::RosContainer,
        ReportKind::RosNamespace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Node => "node",
            ReportKind::Pod => "pod",
            ReportKind::Storage => "storage",
            ReportKind::Vm => "vm",
            ReportKind::Namespace => "namespace",
            ReportKind::NvidiaGpu => "nvidia-gpu",
            ReportKind::RosContainer => "ros-container",
            ReportKind::RosNamespace => "ros-namespace",
        }
    }

    /// File name prefix; the `YYYYMM` of the report month and `.csv` follow
    pub fn prefix(&self) -> &'static str {
        match self {
            ReportKind::Node => "cm-openshift-node-usage-",
            ReportKind::Pod => "cm-openshift-pod-usage-",
            ReportKind::Storage => "cm-openshift-storage-usage-",
            ReportKind::Vm => "cm-openshift-vm-usage-",
            ReportKind::Namespace => "cm-openshift-namespace-usage-",
            ReportKind::NvidiaGpu => "cm-openshift-nvidia-gpu-usage-",
            ReportKind::RosContainer => "ros-openshift-container-",
            ReportKind::RosNamespace => "ros-openshift-namespace-",
        }
    }

    pub fn file_name(&self, year_month: &str) -> String {
        format!("{}{year_month}.csv", self.prefix())
    }

    /// Kind of a report file, judged by its name
    pub fn from_file_name(name: &str) -> Option<Self> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| name.contains(kind.prefix()))
    }

    pub fn is_resource_optimization(&self) -> bool {
        matches!(self, ReportKind::RosContainer | ReportKind::RosNamespace)
    }
}

/// Files touched by one call and the number of rows handed to the writer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// (file name, size after writing)
    pub files: Vec<(String, u64)>,
    pub rows: usize,
}

struct ReportSink<'a> {
    dir: &'a Path,
    year_month: String,
    metrics: OperatorMetrics,
    summary: ReportSummary,
}

impl ReportSink<'_> {
    fn write<R: ReportRow>(
        &mut self,
        kind: ReportKind,
        dates: &DateTimes,
        rows: &[R],
    ) -> Result<(), CollectorError> {
        let name = kind.file_name(&self.year_month);
        info!(report = kind.as_str(), file = %name, rows = rows.len(), "Writing report");
        let size = write_report(self.dir, &name, dates, rows).map_err(|source| {
            CollectorError::Report {
                report: kind.as_str().to_string(),
                source,
            }
        })?;

        self.metrics.add_report_rows(kind.as_str(), rows.len() as u64);
        self.summary.rows += rows.len();
        match self.summary.files.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = size,
            None => self.summary.files.push((name, size)),
        }
        Ok(())
    }
}

fn update_report_status(status: &mut OperatorStatus, range: &TimeRange) {
    status.reports.report_month = range.start.format("%m").to_string();
    status.reports.last_hour_queried = format!(
        "{} - {}",
        range.start.format(STATUS_TIME_FORMAT),
        range.end.format(STATUS_TIME_FORMAT)
    );
}

fn set_resource_ids(results: &mut MappedResults) {
    for (_, row) in results.iter_mut() {
        let id = row
            .get("provider_id")
            .map(|p| resource_id(p))
            .unwrap_or_default();
        row.insert("resource_id".to_string(), id);
    }
}

/// Query the metrics source for `range` and write every enabled report.
///
/// Returns `NoData` when the node queries find nothing, and
/// `NoEnabledNamespaces` when the last resource-optimization window had no
/// opted-in namespace. Both are sentinels: reports written before them stay.
pub async fn generate_reports(
    config: &ReportConfig,
    dirs: &DirectoryConfig,
    engine: &QueryEngine,
    range: &TimeRange,
    status: &mut OperatorStatus,
) -> Result<ReportSummary, CollectorError> {
    info!(
        timeout_secs = engine.timeout().as_secs(),
        start = %range.start,
        end = %range.end,
        "Generating reports"
    );
    update_report_status(status, range);

    let mut node_results = MappedResults::new();
    engine
        .query_range(&queries::node_queries(), range, &mut node_results)
        .await?;
    if node_results.is_empty() {
        info!("No data to report");
        return Err(CollectorError::NoData);
    }
    set_resource_ids(&mut node_results);

    let dates = DateTimes::new(range);
    let nodes: NodeRows = node_results
        .iter()
        .map(|(key, values)| (key.clone(), NodeRow::from_values(&dates, values)))
        .collect();

    let mut sink = ReportSink {
        dir: dirs.reports.path(),
        year_month: range.start.format("%Y%m").to_string(),
        metrics: OperatorMetrics::new(),
        summary: ReportSummary::default(),
    };

    if !config.disable_cost_management {
        cost_management_reports(&mut sink, engine, range, &dates, &nodes).await?;
    }

    if !config.disable_resource_optimization {
        let mut start = range.start + Duration::seconds(1);
        let mut end = start + Duration::minutes(14) + Duration::seconds(59);
        let mut namespaces_enabled = true;
        for _ in 0..ROS_WINDOWS {
            let window = range.with_bounds(start, end);
            match resource_optimization_reports(&mut sink, engine, &window, &nodes).await {
                Ok(()) => namespaces_enabled = true,
                Err(CollectorError::NoEnabledNamespaces) => namespaces_enabled = false,
                Err(e) => return Err(e),
            }
            start += Duration::minutes(15);
            end += Duration::minutes(15);
        }
        if !namespaces_enabled {
            return Err(CollectorError::NoEnabledNamespaces);
        }
    }

    Ok(sink.summary)
}

async fn cost_management_reports(
    sink: &mut ReportSink<'_>,
    engine: &QueryEngine,
    range: &TimeRange,
    dates: &DateTimes,
    nodes: &NodeRows,
) -> Result<(), CollectorError> {
    let node_rows: Vec<NodeRow> = nodes.values().cloned().collect();
    sink.write(ReportKind::Node, dates, &node_rows)?;

    info!(report = "pod", "Querying metrics");
    let mut results = MappedResults::new();
    engine
        .query_range(&queries::pod_queries(), range, &mut results)
        .await?;
    let rows: Vec<PodRow> = results
        .iter()
        .map(|(_, values)| PodRow::from_values(dates, values, nodes))
        .collect();
    sink.write(ReportKind::Pod, dates, &rows)?;

    info!(report = "storage", "Querying metrics");
    let mut results = MappedResults::new();
    engine
        .query_range(&queries::storage_queries(), range, &mut results)
        .await?;
    let rows: Vec<StorageRow> = results
        .iter()
        .map(|(_, values)| StorageRow::from_values(dates, values))
        .collect();
    sink.write(ReportKind::Storage, dates, &rows)?;

    info!(report = "vm", "Querying metrics");
    let mut results = MappedResults::new();
    engine
        .query_range(&queries::vm_queries(), range, &mut results)
        .await?;
    set_resource_ids(&mut results);
    let rows: Vec<VmRow> = results
        .iter()
        .map(|(_, values)| VmRow::from_values(dates, values))
        .collect();
    sink.write(ReportKind::Vm, dates, &rows)?;

    info!(report = "namespace", "Querying metrics");
    let mut results = MappedResults::new();
    engine
        .query_range(&queries::namespace_queries(), range, &mut results)
        .await?;
    let rows: Vec<NamespaceRow> = results
        .iter()
        .map(|(_, values)| NamespaceRow::from_values(dates, values))
        .collect();
    sink.write(ReportKind::Namespace, dates, &rows)?;

    info!(report = "nvidia-gpu", "Querying metrics");
    let mut results = MappedResults::new();
    engine
        .query_range(&queries::nvidia_gpu_queries(), range, &mut results)
        .await?;
    let rows: Vec<NvidiaGpuRow> = gpu_usage(&results)
        .iter()
        .map(|values| NvidiaGpuRow::from_values(dates, values))
        .collect();
    sink.write(ReportKind::NvidiaGpu, dates, &rows)?;

    Ok(())
}

/// One row per GPU a pod used, enriched with the memory capacity and vendor
/// of the pod's GPU request on the same node.
///
/// Utilization rows are the ones carrying `gpu_uuid`. Capacity rows without
/// a matching utilization row are dropped.
fn gpu_usage(results: &MappedResults) -> Vec<MappedValues> {
    results
        .iter()
        .filter(|(_, values)| values.contains_key("gpu_uuid"))
        .map(|(_, values)| {
            let field = |name: &str| values.get(name).map(String::as_str).unwrap_or("");
            let mut key = [field("pod"), field("namespace"), field("node")];
            key.sort_unstable();

            let mut row = values.clone();
            let request = results
                .get(&key.join(","))
                .filter(|request| !request.contains_key("gpu_uuid"));
            if let Some(request) = request {
                row.extend(request.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            row
        })
        .collect()
}

async fn resource_optimization_reports(
    sink: &mut ReportSink<'_>,
    engine: &QueryEngine,
    window: &TimeRange,
    nodes: &NodeRows,
) -> Result<(), CollectorError> {
    let at = window.end;
    let namespaces = engine
        .query_vector(&queries::ros_namespace_filter(), at)
        .await?;
    if namespaces.is_empty() {
        info!(at = %at, "No namespaces enabled for resource optimization");
        return Err(CollectorError::NoEnabledNamespaces);
    }

    let dates = DateTimes::new(window);

    info!(report = "ros-container", at = %at, "Querying metrics");
    let mut results = MappedResults::new();
    engine
        .query_instant(&queries::ros_container_queries(), at, &mut results)
        .await?;
    let rows: Vec<RosContainerRow> = results
        .iter()
        .map(|(_, values)| RosContainerRow::from_values(&dates, values, nodes))
        .collect();
    sink.write(ReportKind::RosContainer, &dates, &rows)?;

    info!(report = "ros-namespace", at = %at, "Querying metrics");
    let mut results = MappedResults::new();
    engine
        .query_instant(&queries::ros_namespace_queries(), at, &mut results)
        .await?;
    let rows: Vec<RosNamespaceRow> = results
        .iter()
        .map(|(_, values)| RosNamespaceRow::from_values(&dates, values))
        .collect();
    sink.write(ReportKind::RosNamespace, &dates, &rows)?;

    Ok(())
}
