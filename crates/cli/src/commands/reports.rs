//! Report directory commands: list, package and trim

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use operator_lib::{
    Directory, DirectoryConfig, FileAction, FilePackager, OperatorStatus, PackagingOutcome,
    ReportKind,
};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_bytes, print_info, print_json, print_success, print_table, print_warning, OutputFormat};

/// Directories `list` can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Location {
    /// Reports being written by the collector
    Reports,
    /// Reports staged for the next archive
    Staging,
    /// Archives waiting for upload
    Upload,
    All,
}

impl Location {
    fn directories(self, dirs: &DirectoryConfig) -> Vec<(&'static str, &Directory)> {
        match self {
            Location::Reports => vec![("reports", &dirs.reports)],
            Location::Staging => vec![("staging", &dirs.staging)],
            Location::Upload => vec![("upload", &dirs.upload)],
            Location::All => vec![
                ("reports", &dirs.reports),
                ("staging", &dirs.staging),
                ("upload", &dirs.upload),
            ],
        }
    }
}

/// Row for the file listing
#[derive(Debug, Tabled, Serialize)]
pub struct FileRow {
    #[tabled(rename = "Directory")]
    pub directory: String,
    #[tabled(rename = "File")]
    pub name: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Size")]
    #[serde(skip)]
    pub size: String,
    #[tabled(skip)]
    pub bytes: u64,
}

fn file_kind(name: &str) -> String {
    if name.ends_with(".tar.gz") {
        return "archive".to_string();
    }
    ReportKind::from_file_name(name)
        .map(|kind| kind.as_str().to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Files under the selected directories, sorted by name within each
pub fn collect_files(dirs: &DirectoryConfig, location: Location) -> Result<Vec<FileRow>> {
    let mut rows = Vec::new();
    for (label, dir) in location.directories(dirs) {
        if !dir.exists() {
            continue;
        }
        let names = dir
            .files()
            .with_context(|| format!("Failed to list {}", dir))?;
        for name in names {
            let bytes = std::fs::metadata(dir.join(&name))
                .with_context(|| format!("Failed to stat {}", name))?
                .len();
            rows.push(FileRow {
                directory: label.to_string(),
                kind: file_kind(&name),
                name,
                size: format_bytes(bytes),
                bytes,
            });
        }
    }
    Ok(rows)
}

/// List report and archive files
pub fn list(dirs: &DirectoryConfig, location: Location, format: OutputFormat) -> Result<()> {
    let rows = collect_files(dirs, location)?;
    print_table(&rows, format);
    if format == OutputFormat::Table && !rows.is_empty() {
        let total: u64 = rows.iter().map(|r| r.bytes).sum();
        println!("\nTotal: {} files, {}", rows.len(), format_bytes(total));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct PackageSummary {
    packaged: bool,
    split: bool,
    archives: Vec<String>,
    files: Vec<String>,
}

/// Run one packaging cycle over the reports directory
pub fn package(
    dirs: DirectoryConfig,
    status: &mut OperatorStatus,
    copy: bool,
    format: OutputFormat,
) -> Result<()> {
    let action = if copy { FileAction::Copy } else { FileAction::Move };
    let packager = FilePackager::new(dirs, action);

    let outcome = packager
        .package_reports(status)
        .context("Packaging failed")?;

    let summary = match outcome {
        PackagingOutcome::NoReports => PackageSummary {
            packaged: false,
            split: false,
            archives: Vec::new(),
            files: Vec::new(),
        },
        PackagingOutcome::Packaged { archives, files, split } => PackageSummary {
            packaged: true,
            split,
            archives,
            files,
        },
    };

    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table => {
            if !summary.packaged {
                print_warning("No reports to package");
                return Ok(());
            }
            print_success(&format!(
                "Packaged {} files into {} archives",
                summary.files.len(),
                summary.archives.len()
            ));
            if summary.split {
                print_info("Oversized reports were split");
            }
            for archive in &summary.archives {
                println!("  {}", archive.cyan());
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct TrimSummary {
    stored: usize,
    removed: Vec<String>,
}

/// Remove the oldest archive batches beyond the retention limit
pub fn trim(dirs: DirectoryConfig, status: &mut OperatorStatus, format: OutputFormat) -> Result<()> {
    let packager = FilePackager::new(dirs, FileAction::default());
    let outcome = packager.trim_packages(status).context("Trim failed")?;

    let summary = TrimSummary {
        stored: outcome.stored,
        removed: outcome.removed,
    };
    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table => {
            for name in &summary.removed {
                println!("  {} {}", "removed".red(), name);
            }
            print_success(&format!("{} archive batches stored", summary.stored));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_labels_kinds() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryConfig::create(tmp.path()).unwrap();
        std::fs::write(dirs.reports.join("cm-openshift-pod-usage-202401.csv"), "a,b\n").unwrap();
        std::fs::write(dirs.reports.join("ros-openshift-container-202401.csv"), "a\n").unwrap();
        std::fs::write(dirs.upload.join("20240101T000000.000000-cost-mgmt.tar.gz"), "x").unwrap();

        let rows = collect_files(&dirs, Location::All).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].kind, "pod");
        assert_eq!(rows[0].bytes, 4);
        assert_eq!(rows[1].kind, "ros-container");
        assert_eq!(rows[2].directory, "upload");
        assert_eq!(rows[2].kind, "archive");
    }

    #[test]
    fn test_collect_files_skips_missing_directories() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryConfig::new(tmp.path().join("absent"));

        assert!(collect_files(&dirs, Location::Staging).unwrap().is_empty());
    }
}
