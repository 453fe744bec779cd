//! Batch interval from staged report content

use crate::error::{PackagingError, PackagingStep};
use crate::report::parse_timestamp;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Start and end of the data in a batch
pub type Interval = (DateTime<Utc>, DateTime<Utc>);

fn column(header: &csv::StringRecord, name: &'static str, file: &Path) -> Result<usize, PackagingError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PackagingError::MissingColumn {
            column: name,
            file: file.to_path_buf(),
        })
}

fn parse(value: &str) -> Result<DateTime<Utc>, PackagingError> {
    parse_timestamp(value).map_err(|source| PackagingError::Timestamp {
        value: value.to_string(),
        source,
    })
}

/// `interval_start` of the first data row and `interval_end` of the last
pub fn read_interval(path: &Path) -> Result<Interval, PackagingError> {
    let read_err = |e: csv::Error| PackagingError::io(PackagingStep::Interval, path, e);
    let mut reader = csv::Reader::from_path(path).map_err(read_err)?;
    let header = reader.headers().map_err(read_err)?.clone();
    let start_index = column(&header, "interval_start", path)?;
    let end_index = column(&header, "interval_end", path)?;

    let mut records = reader.into_records();
    let first = records
        .next()
        .ok_or_else(|| PackagingError::NoRows {
            file: path.to_path_buf(),
        })?
        .map_err(read_err)?;
    let mut last = None;
    for record in records {
        last = Some(record.map_err(read_err)?);
    }
    let last = last.as_ref().unwrap_or(&first);

    let start = parse(first.get(start_index).unwrap_or_default())?;
    let end = parse(last.get(end_index).unwrap_or_default())?;
    Ok((start, end))
}

/// Interval of a batch: taken from the pod report, or from a
/// resource-optimization report when no pod report has set it
pub fn batch_interval(staged: &[PathBuf]) -> Result<Option<Interval>, PackagingError> {
    let mut interval = None;
    for path in staged {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if name.contains("cm-openshift-pod")
            || (interval.is_none() && name.contains("ros-openshift"))
        {
            interval = Some(read_interval(path)?);
        }
    }
    Ok(interval)
}
