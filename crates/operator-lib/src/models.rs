//! Core data models for the cost metrics operator
//!
//! A query result is normalized into label sets paired with either a single
//! sample (instant vector) or an ordered list of samples (range matrix).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Label names mapped to label values for one series
pub type LabelSet = BTreeMap<String, String>;

/// Default resolution of a range query
pub const DEFAULT_STEP: Duration = Duration::from_secs(60);

/// One timestamped sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePair {
    /// Unix timestamp in seconds
    pub timestamp: f64,
    pub value: f64,
}

impl SamplePair {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A series from a range query. `values` may be empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeSeries {
    pub metric: LabelSet,
    pub values: Vec<SamplePair>,
}

/// A series from an instant query
#[derive(Debug, Clone, PartialEq)]
pub struct InstantSample {
    pub metric: LabelSet,
    pub value: SamplePair,
}

/// Result payload returned by the metrics source
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Matrix(Vec<RangeSeries>),
    Vector(Vec<InstantSample>),
    Scalar(SamplePair),
    String { timestamp: f64, value: String },
}

impl QueryValue {
    /// Result type name as reported by the Prometheus API
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Matrix(_) => "matrix",
            QueryValue::Vector(_) => "vector",
            QueryValue::Scalar(_) => "scalar",
            QueryValue::String { .. } => "string",
        }
    }
}

/// A successful query: the payload plus any warnings the source attached
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub value: QueryValue,
    pub warnings: Vec<String>,
}

impl QueryResult {
    pub fn new(value: QueryValue) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Time window evaluated by a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Self {
        Self { start, end, step }
    }

    /// The hour beginning at `start`: `start .. start + 59m59s` at one-minute resolution
    pub fn hour(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: start + ChronoDuration::minutes(59) + ChronoDuration::seconds(59),
            step: DEFAULT_STEP,
        }
    }

    /// Same step, shifted to a new window
    pub fn with_bounds(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            step: self.step,
        }
    }
}
