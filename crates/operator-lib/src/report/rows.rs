//! Fixed-schema report rows
//!
//! Each row kind decodes one accumulated result row by field name. Missing
//! fields decode to empty strings. Header and values always line up column
//! for column.

use crate::collector::MappedValues;
use crate::models::TimeRange;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, ParseError, TimeZone, Utc};
use std::collections::BTreeMap;

/// Textual timestamp form used in every date column
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f +0000 UTC";

const DATE_COLUMNS: [&str; 4] = [
    "report_period_start",
    "report_period_end",
    "interval_start",
    "interval_end",
];

/// Format a timestamp the way date columns store it
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a date column value back into a timestamp
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    let trimmed = value.trim();
    let without_zone = trimmed.strip_suffix(" UTC").unwrap_or(trimmed);
    DateTime::parse_from_str(without_zone, "%Y-%m-%d %H:%M:%S%.f %z").map(|t| t.with_timezone(&Utc))
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Period and interval bounds shared by every row of one query window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateTimes {
    pub report_period_start: String,
    pub report_period_end: String,
    pub interval_start: String,
    pub interval_end: String,
}

impl DateTimes {
    /// The period covers the calendar month of `range.start`; its end is the
    /// first instant of the following month.
    pub fn new(range: &TimeRange) -> Self {
        let start = range.start;
        let (next_year, next_month) = if start.month() == 12 {
            (start.year() + 1, 1)
        } else {
            (start.year(), start.month() + 1)
        };
        Self {
            report_period_start: format_timestamp(month_start(start.year(), start.month())),
            report_period_end: format_timestamp(month_start(next_year, next_month)),
            interval_start: format_timestamp(range.start),
            interval_end: format_timestamp(range.end),
        }
    }

    pub fn values(&self) -> [&str; 4] {
        [
            &self.report_period_start,
            &self.report_period_end,
            &self.interval_start,
            &self.interval_end,
        ]
    }

    /// Leading text shared by every line written for this window
    pub fn prefix(&self) -> String {
        self.values().join(",")
    }
}

/// Encode one record as a single CSV line without its terminator
pub fn encode_record<S: AsRef<[u8]>>(record: &[S]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(record)?;
    let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    let mut line = String::from_utf8_lossy(&bytes).into_owned();
    line.truncate(line.trim_end_matches('\n').len());
    Ok(line)
}

/// A report row with a fixed column layout
pub trait ReportRow {
    fn header() -> Vec<&'static str>
    where
        Self: Sized;

    fn values(&self) -> Vec<&str>;

    /// The CSV line for this row; also its identity when deduplicating
    fn line(&self) -> Result<String, csv::Error> {
        encode_record(&self.values())
    }
}

fn field(values: &MappedValues, key: &str) -> String {
    values.get(key).cloned().unwrap_or_default()
}

fn with_dates(columns: &[&'static str]) -> Vec<&'static str> {
    DATE_COLUMNS.iter().chain(columns).copied().collect()
}

/// Node rows keyed by node name
pub type NodeRows = BTreeMap<String, NodeRow>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRow {
    pub dates: DateTimes,
    pub node: String,
    pub capacity_cpu_cores: String,
    pub capacity_cpu_core_seconds: String,
    pub capacity_memory_bytes: String,
    pub capacity_memory_byte_seconds: String,
    pub role: String,
    pub resource_id: String,
    pub labels: String,
}

impl NodeRow {
    pub fn from_values(dates: &DateTimes, values: &MappedValues) -> Self {
        Self {
            dates: dates.clone(),
            node: field(values, "node"),
            capacity_cpu_cores: field(values, "node-capacity-cpu-cores"),
            capacity_cpu_core_seconds: field(values, "node-capacity-cpu-core-seconds"),
            capacity_memory_bytes: field(values, "node-capacity-memory-bytes"),
            capacity_memory_byte_seconds: field(values, "node-capacity-memory-byte-seconds"),
            role: field(values, "node-role"),
            resource_id: field(values, "resource_id"),
            labels: field(values, "node_labels"),
        }
    }
}

impl ReportRow for NodeRow {
    fn header() -> Vec<&'static str> {
        with_dates(&["node", "node_labels"])
    }

    fn values(&self) -> Vec<&str> {
        let mut values = self.dates.values().to_vec();
        values.extend([self.node.as_str(), &self.labels]);
        values
    }
}

/// Pod usage, carrying a copy of its node's capacity, role and labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodRow {
    pub dates: DateTimes,
    pub node: String,
    pub namespace: String,
    pub pod: String,
    pub usage_cpu_core_seconds: String,
    pub request_cpu_core_seconds: String,
    pub limit_cpu_core_seconds: String,
    pub usage_memory_byte_seconds: String,
    pub request_memory_byte_seconds: String,
    pub limit_memory_byte_seconds: String,
    pub labels: String,
    /// Copied from the node row matching `node`, empty when there is none
    pub node_info: NodeRow,
}

impl PodRow {
    pub fn from_values(dates: &DateTimes, values: &MappedValues, nodes: &NodeRows) -> Self {
        let node = field(values, "node");
        let node_info = nodes.get(&node).cloned().unwrap_or_default();
        Self {
            dates: dates.clone(),
            namespace: field(values, "namespace"),
            pod: field(values, "pod"),
            usage_cpu_core_seconds: field(values, "pod-usage-cpu-core-seconds"),
            request_cpu_core_seconds: field(values, "pod-request-cpu-core-seconds"),
            limit_cpu_core_seconds: field(values, "pod-limit-cpu-core-seconds"),
            usage_memory_byte_seconds: field(values, "pod-usage-memory-byte-seconds"),
            request_memory_byte_seconds: field(values, "pod-request-memory-byte-seconds"),
            limit_memory_byte_seconds: field(values, "pod-limit-memory-byte-seconds"),
            labels: field(values, "pod_labels"),
            node,
            node_info,
        }
    }
}

impl ReportRow for PodRow {
    fn header() -> Vec<&'static str> {
        with_dates(&[
            "node",
            "namespace",
            "pod",
            "pod_usage_cpu_core_seconds",
            "pod_request_cpu_core_seconds",
            "pod_limit_cpu_core_seconds",
            "pod_usage_memory_byte_seconds",
            "pod_request_memory_byte_seconds",
            "pod_limit_memory_byte_seconds",
            "node_capacity_cpu_cores",
            "node_capacity_cpu_core_seconds",
            "node_capacity_memory_bytes",
            "node_capacity_memory_byte_seconds",
            "node_role",
            "resource_id",
            "pod_labels",
        ])
    }

    fn values(&self) -> Vec<&str> {
        let mut values = self.dates.values().to_vec();
        values.extend([
            self.node.as_str(),
            &self.namespace,
            &self.pod,
            &self.usage_cpu_core_seconds,
            &self.request_cpu_core_seconds,
            &self.limit_cpu_core_seconds,
            &self.usage_memory_byte_seconds,
            &self.request_memory_byte_seconds,
            &self.limit_memory_byte_seconds,
            &self.node_info.capacity_cpu_cores,
            &self.node_info.capacity_cpu_core_seconds,
            &self.node_info.capacity_memory_bytes,
            &self.node_info.capacity_memory_byte_seconds,
            &self.node_info.role,
            &self.node_info.resource_id,
            &self.labels,
        ]);
        values
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceRow {
    pub dates: DateTimes,
    pub namespace: String,
    pub labels: String,
}

impl NamespaceRow {
    pub fn from_values(dates: &DateTimes, values: &MappedValues) -> Self {
        Self {
            dates: dates.clone(),
            namespace: field(values, "namespace"),
            labels: field(values, "namespace_labels"),
        }
    }
}

impl ReportRow for NamespaceRow {
    fn header() -> Vec<&'static str> {
        with_dates(&["namespace", "namespace_labels"])
    }

    fn values(&self) -> Vec<&str> {
        let mut values = self.dates.values().to_vec();
        values.extend([self.namespace.as_str(), &self.labels]);
        values
    }
}

/// A row whose columns are a fixed table of (column, field) pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow<const N: usize> {
    pub dates: DateTimes,
    pub columns: Vec<String>,
}

impl<const N: usize> TableRow<N> {
    fn decode(dates: &DateTimes, values: &MappedValues, table: &[(&str, &str); N]) -> Self {
        Self {
            dates: dates.clone(),
            columns: decode_columns(values, table),
        }
    }

    fn table_values(&self) -> Vec<&str> {
        let mut values = self.dates.values().to_vec();
        values.extend(self.columns.iter().map(String::as_str));
        values
    }
}

fn decode_columns(values: &MappedValues, table: &[(&str, &str)]) -> Vec<String> {
    table.iter().map(|(_, key)| field(values, key)).collect()
}

fn table_header<const N: usize>(table: &[(&'static str, &str); N]) -> Vec<&'static str> {
    DATE_COLUMNS
        .iter()
        .copied()
        .chain(table.iter().map(|(column, _)| *column))
        .collect()
}

const STORAGE_COLUMNS: [(&str, &str); 11] = [
    ("namespace", "namespace"),
    ("pod", "pod"),
    ("persistentvolumeclaim", "persistentvolumeclaim"),
    ("persistentvolume", "persistentvolume"),
    ("storageclass", "storageclass"),
    ("persistentvolumeclaim_capacity_bytes", "persistentvolumeclaim-capacity-bytes"),
    ("persistentvolumeclaim_capacity_byte_seconds", "persistentvolumeclaim-capacity-byte-seconds"),
    ("volume_request_storage_byte_seconds", "persistentvolumeclaim-request-byte-seconds"),
    ("persistentvolumeclaim_usage_byte_seconds", "persistentvolumeclaim-usage-byte-seconds"),
    ("persistentvolume_labels", "persistentvolume_labels"),
    ("persistentvolumeclaim_labels", "persistentvolumeclaim_labels"),
];

/// Persistent volume claim capacity, requests and usage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageRow(TableRow<11>);

impl StorageRow {
    pub fn from_values(dates: &DateTimes, values: &MappedValues) -> Self {
        Self(TableRow::decode(dates, values, &STORAGE_COLUMNS))
    }
}

impl ReportRow for StorageRow {
    fn header() -> Vec<&'static str> {
        table_header(&STORAGE_COLUMNS)
    }

    fn values(&self) -> Vec<&str> {
        self.0.table_values()
    }
}

const VM_COLUMNS: [(&str, &str); 29] = [
    ("node", "node"),
    ("resource_id", "resource_id"),
    ("vm_name", "name"),
    ("namespace", "namespace"),
    ("vm_instance_type", "instance_type"),
    ("vm_os", "os"),
    ("vm_guest_os_arch", "guest_os_arch"),
    ("vm_guest_os_name", "guest_os_name"),
    ("vm_guest_os_version", "guest_os_version_id"),
    ("vm_uptime_total_seconds", "vm_uptime_total_seconds"),
    ("vm_cpu_limit_cores", "vm_cpu_limit_cores"),
    ("vm_cpu_limit_core_seconds", "vm_cpu_limit_core_seconds"),
    ("vm_cpu_request_cores", "vm_cpu_request_cores"),
    ("vm_cpu_request_core_seconds", "vm_cpu_request_core_seconds"),
    ("vm_cpu_request_sockets", "vm_cpu_request_sockets"),
    ("vm_cpu_request_socket_seconds", "vm_cpu_request_socket_seconds"),
    ("vm_cpu_request_threads", "vm_cpu_request_threads"),
    ("vm_cpu_request_thread_seconds", "vm_cpu_request_thread_seconds"),
    ("vm_cpu_usage_total_seconds", "vm_cpu_usage_total_seconds"),
    ("vm_memory_limit_bytes", "vm_memory_limit_bytes"),
    ("vm_memory_limit_byte_seconds", "vm_memory_limit_byte_seconds"),
    ("vm_memory_request_bytes", "vm_memory_request_bytes"),
    ("vm_memory_request_byte_seconds", "vm_memory_request_byte_seconds"),
    ("vm_memory_usage_byte_seconds", "vm_memory_usage_byte_seconds"),
    ("vm_device", "device"),
    ("vm_volume_mode", "volume_mode"),
    ("vm_persistentvolumeclaim_name", "persistentvolumeclaim_name"),
    ("vm_disk_allocated_size_byte_seconds", "vm_disk_allocated_size_byte_seconds"),
    ("vm_labels", "vm_labels"),
];

/// KubeVirt virtual machine usage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VmRow(TableRow<29>);

impl VmRow {
    pub fn from_values(dates: &DateTimes, values: &MappedValues) -> Self {
        Self(TableRow::decode(dates, values, &VM_COLUMNS))
    }
}

impl ReportRow for VmRow {
    fn header() -> Vec<&'static str> {
        table_header(&VM_COLUMNS)
    }

    fn values(&self) -> Vec<&str> {
        self.0.table_values()
    }
}

const NVIDIA_GPU_COLUMNS: [(&str, &str); 8] = [
    ("node", "node"),
    ("namespace", "namespace"),
    ("pod", "pod"),
    ("gpu_uuid", "gpu_uuid"),
    ("gpu_model_name", "model_name"),
    ("gpu_vendor_name", "vendor_name"),
    ("gpu_memory_capacity_mib", "gpu_memory_capacity_mib"),
    ("gpu_pod_uptime", "nvidia-gpu-pod-uptime-seconds"),
];

/// Time a pod held one NVIDIA GPU, with the GPU's model and memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NvidiaGpuRow(TableRow<8>);

impl NvidiaGpuRow {
    pub fn from_values(dates: &DateTimes, values: &MappedValues) -> Self {
        Self(TableRow::decode(dates, values, &NVIDIA_GPU_COLUMNS))
    }
}

impl ReportRow for NvidiaGpuRow {
    fn header() -> Vec<&'static str> {
        table_header(&NVIDIA_GPU_COLUMNS)
    }

    fn values(&self) -> Vec<&str> {
        self.0.table_values()
    }
}

const ROS_CONTAINER_METRICS: [(&str, &str); 23] = [
    ("cpu_request_container_avg", "cpu-request-container-avg"),
    ("cpu_request_container_sum", "cpu-request-container-sum"),
    ("cpu_limit_container_avg", "cpu-limit-container-avg"),
    ("cpu_limit_container_sum", "cpu-limit-container-sum"),
    ("cpu_usage_container_avg", "cpu-usage-container-avg"),
    ("cpu_usage_container_min", "cpu-usage-container-min"),
    ("cpu_usage_container_max", "cpu-usage-container-max"),
    ("cpu_usage_container_sum", "cpu-usage-container-sum"),
    ("cpu_throttle_container_avg", "cpu-throttle-container-avg"),
    ("cpu_throttle_container_max", "cpu-throttle-container-max"),
    ("cpu_throttle_container_sum", "cpu-throttle-container-sum"),
    ("memory_request_container_avg", "memory-request-container-avg"),
    ("memory_request_container_sum", "memory-request-container-sum"),
    ("memory_limit_container_avg", "memory-limit-container-avg"),
    ("memory_limit_container_sum", "memory-limit-container-sum"),
    ("memory_usage_container_avg", "memory-usage-container-avg"),
    ("memory_usage_container_min", "memory-usage-container-min"),
    ("memory_usage_container_max", "memory-usage-container-max"),
    ("memory_usage_container_sum", "memory-usage-container-sum"),
    ("memory_rss_usage_container_avg", "memory-rss-usage-container-avg"),
    ("memory_rss_usage_container_min", "memory-rss-usage-container-min"),
    ("memory_rss_usage_container_max", "memory-rss-usage-container-max"),
    ("memory_rss_usage_container_sum", "memory-rss-usage-container-sum"),
];

/// Container resource-optimization metrics for one 15 minute window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosContainerRow {
    pub dates: DateTimes,
    pub container_name: String,
    pub pod: String,
    pub owner_name: String,
    pub owner_kind: String,
    pub workload: String,
    pub workload_type: String,
    pub namespace: String,
    pub image_name: String,
    pub node: String,
    /// Copied from the node row matching `node`, empty when there is none
    pub node_info: NodeRow,
    /// Values in `ROS_CONTAINER_METRICS` order
    pub metrics: Vec<String>,
}

impl RosContainerRow {
    pub fn from_values(dates: &DateTimes, values: &MappedValues, nodes: &NodeRows) -> Self {
        let node = field(values, "node");
        let node_info = nodes.get(&node).cloned().unwrap_or_default();
        Self {
            dates: dates.clone(),
            container_name: field(values, "container_name"),
            pod: field(values, "pod"),
            owner_name: field(values, "owner_name"),
            owner_kind: field(values, "owner_kind"),
            workload: field(values, "workload"),
            workload_type: field(values, "workload_type"),
            namespace: field(values, "namespace"),
            image_name: field(values, "image_name"),
            metrics: decode_columns(values, &ROS_CONTAINER_METRICS),
            node,
            node_info,
        }
    }
}

impl ReportRow for RosContainerRow {
    fn header() -> Vec<&'static str> {
        let mut header = with_dates(&[
            "container_name",
            "pod",
            "owner_name",
            "owner_kind",
            "workload",
            "workload_type",
            "namespace",
            "image_name",
            "node",
            "resource_id",
        ]);
        header.extend(ROS_CONTAINER_METRICS.iter().map(|(column, _)| *column));
        header
    }

    fn values(&self) -> Vec<&str> {
        let mut values = self.dates.values().to_vec();
        values.extend([
            self.container_name.as_str(),
            &self.pod,
            &self.owner_name,
            &self.owner_kind,
            &self.workload,
            &self.workload_type,
            &self.namespace,
            &self.image_name,
            &self.node,
            &self.node_info.resource_id,
        ]);
        values.extend(self.metrics.iter().map(String::as_str));
        values
    }
}

const ROS_NAMESPACE_COLUMNS: [(&str, &str); 21] = [
    ("namespace", "namespace"),
    ("cpu_request_namespace_sum", "cpu-request-namespace-sum"),
    ("cpu_limit_namespace_sum", "cpu-limit-namespace-sum"),
    ("cpu_usage_namespace_avg", "cpu-usage-namespace-avg"),
    ("cpu_usage_namespace_max", "cpu-usage-namespace-max"),
    ("cpu_usage_namespace_min", "cpu-usage-namespace-min"),
    ("cpu_throttle_namespace_avg", "cpu-throttle-namespace-avg"),
    ("cpu_throttle_namespace_max", "cpu-throttle-namespace-max"),
    ("cpu_throttle_namespace_min", "cpu-throttle-namespace-min"),
    ("memory_request_namespace_sum", "memory-request-namespace-sum"),
    ("memory_limit_namespace_sum", "memory-limit-namespace-sum"),
    ("memory_usage_namespace_avg", "memory-usage-namespace-avg"),
    ("memory_usage_namespace_max", "memory-usage-namespace-max"),
    ("memory_usage_namespace_min", "memory-usage-namespace-min"),
    ("memory_rss_usage_namespace_avg", "memory-rss-usage-namespace-avg"),
    ("memory_rss_usage_namespace_max", "memory-rss-usage-namespace-max"),
    ("memory_rss_usage_namespace_min", "memory-rss-usage-namespace-min"),
    ("namespace_running_pods_max", "pods-running-namespace-max"),
    ("namespace_running_pods_avg", "pods-running-namespace-avg"),
    ("namespace_total_pods_max", "pods-total-namespace-max"),
    ("namespace_total_pods_avg", "pods-total-namespace-avg"),
];

/// Namespace resource-optimization metrics for one 15 minute window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosNamespaceRow(TableRow<21>);

impl RosNamespaceRow {
    pub fn from_values(dates: &DateTimes, values: &MappedValues) -> Self {
        Self(TableRow::decode(dates, values, &ROS_NAMESPACE_COLUMNS))
    }
}

impl ReportRow for RosNamespaceRow {
    fn header() -> Vec<&'static str> {
        table_header(&ROS_NAMESPACE_COLUMNS)
    }

    fn values(&self) -> Vec<&str> {
        self.0.table_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour() -> TimeRange {
        TimeRange::hour(Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap())
    }

    fn values(pairs: &[(&str, &str)]) -> MappedValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_dates_cover_month_and_interval() {
        let dates = DateTimes::new(&hour());
        assert_eq!(dates.report_period_start, "2023-12-01 00:00:00 +0000 UTC");
        assert_eq!(dates.report_period_end, "2024-01-01 00:00:00 +0000 UTC");
        assert_eq!(dates.interval_start, "2023-12-31 23:00:00 +0000 UTC");
        assert_eq!(dates.interval_end, "2023-12-31 23:59:59 +0000 UTC");
        assert!(dates.prefix().starts_with("2023-12-01 00:00:00 +0000 UTC,2024-01-01"));
    }

    #[test]
    fn test_timestamp_parses_back() {
        let time = Utc.with_ymd_and_hms(2024, 2, 29, 10, 15, 1).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(time)).unwrap(), time);

        let fractional = parse_timestamp("2024-02-29 10:15:01.5 +0000 UTC").unwrap();
        assert_eq!(fractional.timestamp_subsec_millis(), 500);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_headers_match_values() {
        let dates = DateTimes::new(&hour());
        let empty = MappedValues::new();
        let nodes = NodeRows::new();

        assert_eq!(NodeRow::header().len(), NodeRow::from_values(&dates, &empty).values().len());
        assert_eq!(PodRow::header().len(), PodRow::from_values(&dates, &empty, &nodes).values().len());
        assert_eq!(StorageRow::header().len(), StorageRow::from_values(&dates, &empty).values().len());
        assert_eq!(NamespaceRow::header().len(), NamespaceRow::from_values(&dates, &empty).values().len());
        assert_eq!(VmRow::header().len(), VmRow::from_values(&dates, &empty).values().len());
        assert_eq!(NvidiaGpuRow::header().len(), NvidiaGpuRow::from_values(&dates, &empty).values().len());
        assert_eq!(
            RosContainerRow::header().len(),
            RosContainerRow::from_values(&dates, &empty, &nodes).values().len()
        );
        assert_eq!(
            RosNamespaceRow::header().len(),
            RosNamespaceRow::from_values(&dates, &empty).values().len()
        );
    }

    #[test]
    fn test_pod_row_copies_node_fields() {
        let dates = DateTimes::new(&hour());
        let node = NodeRow::from_values(
            &dates,
            &values(&[
                ("node", "n1"),
                ("node-capacity-cpu-cores", "4.000000"),
                ("node-role", "worker"),
                ("resource_id", "i-0abc"),
            ]),
        );
        let mut nodes = NodeRows::new();
        nodes.insert("n1".to_string(), node);

        let pod = PodRow::from_values(
            &dates,
            &values(&[("node", "n1"), ("pod", "web-1"), ("namespace", "app")]),
            &nodes,
        );
        let header = PodRow::header();
        let row = pod.values();
        let column = |name: &str| row[header.iter().position(|h| *h == name).unwrap()];

        assert_eq!(column("node"), "n1");
        assert_eq!(column("node_capacity_cpu_cores"), "4.000000");
        assert_eq!(column("node_role"), "worker");
        assert_eq!(column("resource_id"), "i-0abc");
        assert_eq!(column("pod_usage_cpu_core_seconds"), "");
    }

    #[test]
    fn test_pod_on_unknown_node_keeps_its_node() {
        let dates = DateTimes::new(&hour());
        let pod = PodRow::from_values(&dates, &values(&[("node", "gone")]), &NodeRows::new());
        assert_eq!(pod.node, "gone");
        assert_eq!(pod.node_info, NodeRow::default());
    }

    #[test]
    fn test_ros_namespace_maps_pod_counts() {
        let dates = DateTimes::new(&hour());
        let row = RosNamespaceRow::from_values(
            &dates,
            &values(&[("namespace", "app"), ("pods-running-namespace-max", "3.000000")]),
        );
        let header = RosNamespaceRow::header();
        let index = header.iter().position(|h| *h == "namespace_running_pods_max").unwrap();
        assert_eq!(row.values()[index], "3.000000");
    }

    #[test]
    fn test_line_quotes_embedded_separators() {
        let dates = DateTimes::new(&hour());
        let row = NamespaceRow::from_values(
            &dates,
            &values(&[("namespace", "app"), ("namespace_labels", "label_a:x,y")]),
        );
        let line = row.line().unwrap();
        assert!(line.starts_with(&dates.prefix()));
        assert!(line.ends_with(",app,\"label_a:x,y\""));
    }
}
