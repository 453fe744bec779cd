//! Library for the cost metrics operator
//!
//! This crate provides the core functionality for:
//! - Querying Prometheus and aggregating series into report rows
//! - Writing hourly usage reports as append-only CSV files
//! - Packaging reports into manifest-bearing archives for upload
//! - Health checks and observability

pub mod collector;
pub mod dirconfig;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod packaging;
pub mod report;
pub mod status;

pub use collector::{
    generate_reports, MetricsSource, PrometheusConfig, PrometheusSource, QueryEngine,
    ReportConfig, ReportKind, ReportSummary, RetryPolicy,
};
pub use dirconfig::{Directory, DirectoryConfig};
pub use error::{CollectorError, PackagingError, ReportError, SourceError};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{OperatorMetrics, StructuredLogger};
pub use packaging::{FileAction, FilePackager, PackagingOutcome, TrimOutcome};
pub use status::OperatorStatus;
