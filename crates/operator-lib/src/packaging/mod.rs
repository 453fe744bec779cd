//! Report packaging
//!
//! A packaging cycle stages the CSV reports, reads the batch interval from
//! them, splits oversized files, writes a manifest and archives the batch
//! into the upload directory. Trimming keeps the number of archived batches
//! within the configured limit.

mod archive;
mod interval;
mod manifest;
mod split;
mod trim;


pub use archive::{list_members, read_manifest, write_archive, Member};
pub use interval::{batch_interval, read_interval, Interval};
pub use manifest::{upload_name, Manifest, MANIFEST_FILE};
pub use split::{needs_split, split_file, MAX_SPLITS, VARIANCE};
pub use trim::{batch_token, trim_archives, TrimOutcome};

use crate::dirconfig::DirectoryConfig;
use crate::error::{PackagingError, PackagingStep};
use crate::observability::OperatorMetrics;
use crate::status::OperatorStatus;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Fixed-width creation time that prefixes every archive name
const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6f";

/// How reports get from the reports directory into staging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileAction {
    #[default]
    Move,
    /// Copy, refusing to overwrite an existing destination
    Copy,
}

impl FileAction {
    fn apply(&self, from: &Path, to: &Path) -> io::Result<()> {
        match self {
            FileAction::Move => fs::rename(from, to),
            FileAction::Copy => {
                let mut source = File::open(from)?;
                let mut destination = OpenOptions::new().write(true).create_new(true).open(to)?;
                io::copy(&mut source, &mut destination)?;
                destination.sync_all()
            }
        }
    }
}

/// Outcome of a packaging cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackagingOutcome {
    /// Nothing was staged
    NoReports,
    Packaged {
        /// Archive names written to the upload directory
        archives: Vec<String>,
        /// Staged CSV names, in manifest order
        files: Vec<String>,
        split: bool,
    },
}

/// Packages reports from the reports directory into archives
#[derive(Clone)]
pub struct FilePackager {
    dirs: DirectoryConfig,
    action: FileAction,
    metrics: OperatorMetrics,
}

impl FilePackager {
    pub fn new(dirs: DirectoryConfig, action: FileAction) -> Self {
        Self {
            dirs,
            action,
            metrics: OperatorMetrics::new(),
        }
    }

    pub fn dirs(&self) -> &DirectoryConfig {
        &self.dirs
    }

    /// Run one packaging cycle and record its outcome in `status`.
    ///
    /// When the previous cycle failed, staging is not cleared. Only the
    /// reports staged by this cycle are packaged, so a leftover that broke
    /// one cycle cannot break the next.
    pub fn package_reports(&self, status: &mut OperatorStatus) -> Result<PackagingOutcome, PackagingError> {
        let keep_staging = !status.packaging.error.is_empty();
        match self.package(status, keep_staging) {
            Ok(outcome) => {
                status.packaging.error.clear();
                if let PackagingOutcome::Packaged { archives, .. } = &outcome {
                    let now = Utc::now();
                    status.packaging.last_successful_packaging_time = Some(now);
                    status.packaging.packaged_files = archives.clone();
                    self.metrics.add_archives_created(archives.len() as u64);
                    self.metrics.set_last_successful_packaging(now.timestamp());
                    info!(archives = archives.len(), "File packaging was successful");
                } else {
                    info!("No payload to generate");
                }
                Ok(outcome)
            }
            Err(e) => {
                status.packaging.error = e.to_string();
                Err(e)
            }
        }
    }

    /// Remove the oldest archived batches beyond the configured maximum and
    /// record the number of stored batches in `status`
    pub fn trim_packages(&self, status: &mut OperatorStatus) -> Result<TrimOutcome, PackagingError> {
        let max = status.packaging.max_reports().max(0) as usize;
        let outcome = trim_archives(&self.dirs.upload, max)?;
        status.packaging.report_count = Some(outcome.stored as i64);
        self.metrics.set_archives_stored(outcome.stored as i64);
        Ok(outcome)
    }

    fn package(&self, status: &OperatorStatus, keep_staging: bool) -> Result<PackagingOutcome, PackagingError> {
        let max_bytes = status.packaging.max_bytes().max(1) as u64;
        let uid = Uuid::new_v4().to_string();
        let created = Utc::now().format(ARCHIVE_TIMESTAMP_FORMAT).to_string();

        self.dirs
            .check_exists_or_recreate()
            .map_err(|e| PackagingError::io(PackagingStep::Directories, self.dirs.parent.path(), e))?;

        let staged = self.stage(&uid, keep_staging)?;
        if staged.is_empty() {
            return Ok(PackagingOutcome::NoReports);
        }

        info!("Getting the start and end intervals for the manifest");
        let interval = batch_interval(&staged)?;

        let (mut files, split) = self.split(staged, max_bytes)?;
        files.sort();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();

        let manifest = Manifest::new(&uid, status, &names, interval);
        let manifest_path = self.dirs.staging.join(MANIFEST_FILE);
        info!(manifest = %manifest_path.display(), "Rendering manifest");
        manifest.render(&manifest_path)?;

        let members: Vec<Member> = files
            .iter()
            .enumerate()
            .map(|(index, path)| Member::new(upload_name(&uid, index), path))
            .collect();
        let manifest_member = Member::new(MANIFEST_FILE, &manifest_path);

        let mut archives = Vec::new();
        if split {
            for (index, member) in members.into_iter().enumerate() {
                let name = format!("{created}-cost-mgmt.{index}.tar.gz");
                write_archive(&self.dirs.upload.join(&name), &[member, manifest_member.clone()])?;
                archives.push(name);
            }
        } else {
            let name = format!("{created}-cost-mgmt.tar.gz");
            let mut members = members;
            members.push(manifest_member);
            write_archive(&self.dirs.upload.join(&name), &members)?;
            archives.push(name);
        }

        Ok(PackagingOutcome::Packaged {
            archives,
            files: names,
            split,
        })
    }

    /// Move or copy every CSV report into staging as `{uid}-{name}`,
    /// returning the newly staged paths
    fn stage(&self, uid: &str, keep_staging: bool) -> Result<Vec<PathBuf>, PackagingError> {
        let stage_err = |path: &Path, e: io::Error| PackagingError::io(PackagingStep::Stage, path, e);

        let reports: Vec<String> = self
            .dirs
            .reports
            .files()
            .map_err(|e| stage_err(self.dirs.reports.path(), e))?
            .into_iter()
            .filter(|f| f.ends_with(".csv"))
            .collect();

        if keep_staging {
            info!("Previous packaging failed, keeping staging directory");
        } else if !reports.is_empty() {
            info!("Clearing out staging directory");
            self.dirs
                .staging
                .remove_contents()
                .map_err(|e| stage_err(self.dirs.staging.path(), e))?;
        }

        let mut staged = Vec::new();
        if !reports.is_empty() {
            info!(files = reports.len(), action = ?self.action, "Moving or copying report files to staging directory");
        }
        for name in reports {
            let from = self.dirs.reports.join(&name);
            let to = self.dirs.staging.join(format!("{uid}-{name}"));
            self.action.apply(&from, &to).map_err(|e| stage_err(&from, e))?;
            staged.push(to);
        }
        Ok(staged)
    }

    /// Split every file at or over `max_bytes` when the batch needs it
    fn split(&self, staged: Vec<PathBuf>, max_bytes: u64) -> Result<(Vec<PathBuf>, bool), PackagingError> {
        let mut sizes = Vec::with_capacity(staged.len());
        for path in &staged {
            let size = fs::metadata(path)
                .map_err(|e| PackagingError::io(PackagingStep::Split, path, e))?
                .len();
            sizes.push(size);
        }

        if !needs_split(&sizes, max_bytes) {
            info!("Files do not require splitting");
            return Ok((staged, false));
        }

        info!(max_bytes = max_bytes, "Files require splitting");
        let mut files = Vec::new();
        for (path, size) in staged.into_iter().zip(sizes) {
            if size >= max_bytes {
                files.extend(split_file(&path, max_bytes)?);
            } else {
                files.push(path);
            }
        }
        Ok((files, true))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
