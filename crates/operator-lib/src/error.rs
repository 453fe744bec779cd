//! Error types for report collection and packaging

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the metrics source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{error_type}: {message}")]
    Api { error_type: String, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read {path}: {source}")]
    Credentials {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid metrics source configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Step of a report write that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    Open,
    Read,
    Write,
    Stat,
    Sync,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            WriteStep::Open => "failed to get or create csv",
            WriteStep::Read => "failed to read csv",
            WriteStep::Write => "failed to write to file",
            WriteStep::Stat => "failed to get file size",
            WriteStep::Sync => "failed to sync file",
        };
        f.write_str(text)
    }
}

/// A CSV report write failure, naming the step and file
#[derive(Error, Debug)]
#[error("write report: {step}: {}: {source}", path.display())]
pub struct ReportError {
    pub step: WriteStep,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ReportError {
    pub fn new(step: WriteStep, path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        Self {
            step,
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Report generation failures
#[derive(Error, Debug)]
pub enum CollectorError {
    /// The node queries returned nothing for the requested hour
    #[error("no data to collect")]
    NoData,

    /// No namespace has opted in to resource optimization
    #[error("no enabled namespaces for resource optimization")]
    NoEnabledNamespaces,

    #[error("query: {query}: error querying prometheus: {source}")]
    Query {
        query: String,
        #[source]
        source: SourceError,
    },

    #[error("expected a {expected} in response to query, got a {got}")]
    UnexpectedResult { expected: &'static str, got: String },

    #[error("failed to query for namespaces: {0}")]
    NamespaceFilter(#[source] SourceError),

    #[error("failed to write {report} report: {source}")]
    Report {
        report: String,
        #[source]
        source: ReportError,
    },
}

impl CollectorError {
    /// Sentinel outcomes that are not failures of the collection cycle
    pub fn is_sentinel(&self) -> bool {
        matches!(self, CollectorError::NoData | CollectorError::NoEnabledNamespaces)
    }
}

/// Packaging step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingStep {
    Directories,
    Stage,
    Interval,
    Split,
    Manifest,
    Archive,
    Trim,
    Inspect,
}

impl fmt::Display for PackagingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PackagingStep::Directories => "check directories",
            PackagingStep::Stage => "move or copy files",
            PackagingStep::Interval => "get start and end",
            PackagingStep::Split => "split files",
            PackagingStep::Manifest => "render manifest",
            PackagingStep::Archive => "write tarball",
            PackagingStep::Trim => "trim packages",
            PackagingStep::Inspect => "read archive",
        };
        f.write_str(text)
    }
}

/// Packaging failures
#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("{step}: {}: {source}", path.display())]
    Io {
        step: PackagingStep,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("get start and end: could not index the {column} column in {}", file.display())]
    MissingColumn { column: &'static str, file: PathBuf },

    #[error("get start and end: {} has no data rows", file.display())]
    NoRows { file: PathBuf },

    #[error("get start and end: failed to parse {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("render manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("read archive: {} has no manifest.json", path.display())]
    MissingManifest { path: PathBuf },
}

impl PackagingError {
    pub fn io(step: PackagingStep, path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        PackagingError::Io {
            step,
            path: path.into(),
            source: source.into(),
        }
    }

    /// Step that produced this error
    pub fn step(&self) -> PackagingStep {
        match self {
            PackagingError::Io { step, .. } => *step,
            PackagingError::MissingColumn { .. }
            | PackagingError::NoRows { .. }
            | PackagingError::Timestamp { .. } => PackagingStep::Interval,
            PackagingError::Manifest(_) => PackagingStep::Manifest,
            PackagingError::MissingManifest { .. } => PackagingStep::Inspect,
        }
    }
}
