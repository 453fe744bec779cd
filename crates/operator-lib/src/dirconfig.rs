//! Working directory layout
//!
//! All report state lives under one base directory:
//! - `data/` receives CSV reports as they are generated
//! - `staging/` holds the batch being packaged
//! - `upload/` holds finished archives until they are uploaded or trimmed

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default base directory for report state
pub const DEFAULT_BASE_DIR: &str = "/tmp/costmanagement-metrics-operator-reports";

const REPORTS_DIR: &str = "data";
const STAGING_DIR: &str = "staging";
const UPLOAD_DIR: &str = "upload";

/// One managed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    path: PathBuf,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn create(&self) -> io::Result<()> {
        fs::create_dir_all(&self.path)
    }

    /// Delete every entry in the directory, keeping the directory itself
    pub fn remove_contents(&self) -> io::Result<()> {
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Names of the regular files in the directory, sorted
    pub fn files(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl std::fmt::Display for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// The base directory and its three working subdirectories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub parent: Directory,
    pub reports: Directory,
    pub staging: Directory,
    pub upload: Directory,
}

impl DirectoryConfig {
    /// Layout under `base` without touching the filesystem
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            reports: Directory::new(base.join(REPORTS_DIR)),
            staging: Directory::new(base.join(STAGING_DIR)),
            upload: Directory::new(base.join(UPLOAD_DIR)),
            parent: Directory::new(base),
        }
    }

    /// Layout under `base`, creating any missing directory
    pub fn create(base: impl Into<PathBuf>) -> io::Result<Self> {
        let config = Self::new(base);
        config.check_exists_or_recreate()?;
        Ok(config)
    }

    /// Recreate any directory that has gone missing
    pub fn check_exists_or_recreate(&self) -> io::Result<()> {
        for dir in [&self.parent, &self.reports, &self.staging, &self.upload] {
            if !dir.exists() {
                info!(path = %dir, "Recreating directory");
                dir.create()?;
            }
        }
        Ok(())
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DIR)
    }
}
