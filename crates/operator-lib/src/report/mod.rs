//! Report row model and CSV report writer

mod rows;
mod writer;

pub use rows::{
    encode_record, format_timestamp, parse_timestamp, DateTimes, NamespaceRow, NodeRow, NodeRows,
    NvidiaGpuRow, PodRow, ReportRow, RosContainerRow, RosNamespaceRow, StorageRow, TableRow,
    VmRow,
};
pub use writer::write_report;
