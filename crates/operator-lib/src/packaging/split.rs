//! Splitting oversized CSV files into numbered parts

use crate::error::{PackagingError, PackagingStep};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Allowance on top of the comma-joined row length for quoting and delimiters
pub const VARIANCE: f64 = 0.03;

/// Most parts one file is split into
pub const MAX_SPLITS: usize = 1000;

/// Whether any file, or the running total of sizes, reaches `max_bytes`
pub fn needs_split(sizes: &[u64], max_bytes: u64) -> bool {
    let mut total = 0u64;
    for size in sizes {
        total += size;
        if *size >= max_bytes || total >= max_bytes {
            return true;
        }
    }
    false
}

/// `dir/stem.csv` becomes `dir/stem{part}.csv`
fn part_path(path: &Path, part: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{part}.csv"))
}

/// Estimated written size of one record
fn estimate(record: &csv::StringRecord) -> u64 {
    let len = record.iter().map(str::len).sum::<usize>() + record.len().saturating_sub(1);
    len as u64 + (len as f64 * VARIANCE) as u64
}

/// Split `path` into parts of roughly `max_bytes` each, every part starting
/// with the original header. The original file is removed.
pub fn split_file(path: &Path, max_bytes: u64) -> Result<Vec<PathBuf>, PackagingError> {
    let split_err = |p: &Path, e: csv::Error| PackagingError::io(PackagingStep::Split, p, e);

    let mut reader = csv::Reader::from_path(path).map_err(|e| split_err(path, e))?;
    let header = reader.headers().map_err(|e| split_err(path, e))?.clone();
    let mut records = reader.into_records().peekable();

    let mut parts = Vec::new();
    loop {
        let part = part_path(path, parts.len() + 1);
        info!(file = %part.display(), "Creating split file");
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&part)
            .map_err(|e| split_err(&part, e))?;
        writer.write_record(&header).map_err(|e| split_err(&part, e))?;

        let mut size = 0u64;
        for record in records.by_ref() {
            let record = record.map_err(|e| split_err(path, e))?;
            writer.write_record(&record).map_err(|e| split_err(&part, e))?;
            size += estimate(&record);
            if size >= max_bytes {
                break;
            }
        }
        writer
            .flush()
            .map_err(|e| PackagingError::io(PackagingStep::Split, &part, e))?;
        parts.push(part);

        if records.peek().is_none() {
            break;
        }
        if parts.len() >= MAX_SPLITS {
            warn!(file = %path.display(), parts = parts.len(), "Split limit reached, dropping remaining rows");
            break;
        }
    }

    fs::remove_file(path).map_err(|e| PackagingError::io(PackagingStep::Split, path, e))?;
    Ok(parts)
}
