//! Append-only CSV report files
//!
//! A report file is created with its header on first write. Later writes
//! append only the rows not already present for the same window, so
//! repeating a collection for an hour leaves the file unchanged.

use super::rows::{encode_record, DateTimes, ReportRow};
use crate::error::{ReportError, WriteStep};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Open `path` for reading and appending, reporting whether it was created
fn get_or_create(path: &Path) -> Result<(File, bool), ReportError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| ReportError::new(WriteStep::Open, path, e))?;
    }
    let created = !path.exists();
    let file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| ReportError::new(WriteStep::Open, path, e))?;
    Ok((file, created))
}

/// Lines after the header that start with `prefix`
fn existing_lines(file: &File, prefix: &str) -> std::io::Result<HashSet<String>> {
    let mut lines = HashSet::new();
    for line in BufReader::new(file).lines().skip(1) {
        let line = line?;
        if line.starts_with(prefix) {
            lines.insert(line);
        }
    }
    Ok(lines)
}

/// Append `rows` to `dir/name`, skipping rows already written for `dates`.
///
/// Returns the file size after writing.
pub fn write_report<R: ReportRow>(
    dir: &Path,
    name: &str,
    dates: &DateTimes,
    rows: &[R],
) -> Result<u64, ReportError> {
    let path = dir.join(name);
    let (file, created) = get_or_create(&path)?;

    let present =
        existing_lines(&file, &dates.prefix()).map_err(|e| ReportError::new(WriteStep::Read, &path, e))?;

    let write_err = |e: csv::Error| ReportError::new(WriteStep::Write, &path, e);
    let mut writer = BufWriter::new(&file);
    let mut appended = 0usize;
    if created {
        let header = encode_record(&R::header()).map_err(write_err)?;
        writeln!(writer, "{header}").map_err(|e| ReportError::new(WriteStep::Write, &path, e))?;
    }
    for row in rows {
        let line = row.line().map_err(write_err)?;
        if !present.contains(&line) {
            writeln!(writer, "{line}").map_err(|e| ReportError::new(WriteStep::Write, &path, e))?;
            appended += 1;
        }
    }
    writer
        .flush()
        .map_err(|e| ReportError::new(WriteStep::Write, &path, e))?;
    drop(writer);

    let size = file
        .metadata()
        .map_err(|e| ReportError::new(WriteStep::Stat, &path, e))?
        .len();
    file.sync_all()
        .map_err(|e| ReportError::new(WriteStep::Sync, &path, e))?;

    debug!(
        file = %path.display(),
        created = created,
        rows = rows.len(),
        appended = appended,
        size = size,
        "Wrote report"
    );
    Ok(size)
}
