//! Retention of archived batches

use crate::dirconfig::Directory;
use crate::error::{PackagingError, PackagingStep};
use std::collections::BTreeSet;
use std::fs;
use tracing::info;

/// Result of a trim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrimOutcome {
    /// Batches left in the upload directory
    pub stored: usize,
    /// Files removed
    pub removed: Vec<String>,
}

/// Batch token of an upload file: the text before the first `-`
pub fn batch_token(name: &str) -> &str {
    name.split('-').next().unwrap_or(name)
}

/// Remove every file of the oldest batches beyond `max_batches`
pub fn trim_archives(upload: &Directory, max_batches: usize) -> Result<TrimOutcome, PackagingError> {
    let files = upload
        .files()
        .map_err(|e| PackagingError::io(PackagingStep::Trim, upload.path(), e))?;

    let batches: BTreeSet<&str> = files
        .iter()
        .filter(|f| f.ends_with("tar.gz"))
        .map(|f| batch_token(f))
        .collect();

    if batches.len() <= max_batches {
        info!(stored = batches.len(), max = max_batches, "Number of stored reports within limit");
        return Ok(TrimOutcome {
            stored: batches.len(),
            removed: Vec::new(),
        });
    }

    info!(stored = batches.len(), max = max_batches, "Max report count reached, removing oldest reports");
    let expired: BTreeSet<&str> = batches
        .iter()
        .take(batches.len() - max_batches)
        .copied()
        .collect();

    let mut removed = Vec::new();
    for file in &files {
        if !expired.contains(batch_token(file)) {
            continue;
        }
        info!(file = %file, "Removing report");
        let path = upload.join(file);
        fs::remove_file(&path).map_err(|e| PackagingError::io(PackagingStep::Trim, &path, e))?;
        removed.push(file.clone());
    }

    Ok(TrimOutcome {
        stored: max_batches,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn upload_with(names: &[&str]) -> (TempDir, Directory) {
        let tmp = TempDir::new().unwrap();
        for name in names {
            fs::write(tmp.path().join(name), "x").unwrap();
        }
        let dir = Directory::new(tmp.path());
        (tmp, dir)
    }

    #[test]
    fn test_batch_token() {
        assert_eq!(batch_token("20240115T100000.000001-cost-mgmt.tar.gz"), "20240115T100000.000001");
        assert_eq!(batch_token("plain"), "plain");
    }

    #[test]
    fn test_within_limit_removes_nothing() {
        let (_tmp, dir) = upload_with(&[
            "20240101T000000.000000-cost-mgmt.tar.gz",
            "20240102T000000.000000-cost-mgmt.tar.gz",
        ]);

        let outcome = trim_archives(&dir, 2).unwrap();
        assert_eq!(outcome.stored, 2);
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn test_split_batches_count_once() {
        let (_tmp, dir) = upload_with(&[
            "20240101T000000.000000-cost-mgmt.0.tar.gz",
            "20240101T000000.000000-cost-mgmt.1.tar.gz",
        ]);

        assert_eq!(trim_archives(&dir, 5).unwrap().stored, 1);
    }

    #[test]
    fn test_removes_every_file_of_oldest_batches() {
        let (_tmp, dir) = upload_with(&[
            "20240101T000000.000000-cost-mgmt.0.tar.gz",
            "20240101T000000.000000-cost-mgmt.1.tar.gz",
            "20240102T000000.000000-cost-mgmt.tar.gz",
            "20240103T000000.000000-cost-mgmt.tar.gz",
            "20240104T000000.000000-cost-mgmt.tar.gz",
        ]);

        let outcome = trim_archives(&dir, 2).unwrap();

        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.removed.len(), 3);
        assert_eq!(
            dir.files().unwrap(),
            vec![
                "20240103T000000.000000-cost-mgmt.tar.gz",
                "20240104T000000.000000-cost-mgmt.tar.gz",
            ]
        );
    }
}
