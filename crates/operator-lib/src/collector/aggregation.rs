//! Result accumulation
//!
//! Series from every query in a group merge into one `MappedResults`. Each
//! series lands in the row named by its row key; fields written by earlier
//! queries stay in place unless a later query writes the same field.

use super::query::{Method, Query};
use crate::models::{InstantSample, LabelSet, RangeSeries, SamplePair};
use std::collections::btree_map::{self, BTreeMap};

/// Seconds represented by one sample of a range query
const SECONDS_PER_SAMPLE: f64 = 60.0;

/// Field name to value for one row
pub type MappedValues = BTreeMap<String, String>;

/// Rows keyed by their composite row key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedResults {
    rows: BTreeMap<String, MappedValues>,
}

impl MappedResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MappedValues> {
        self.rows.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MappedValues> {
        self.rows.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, MappedValues> {
        self.rows.iter_mut()
    }

    fn row_mut(&mut self, key: String) -> &mut MappedValues {
        self.rows.entry(key).or_default()
    }

    /// Merge a range query's series, reducing each one with the query's method
    pub fn merge_matrix(&mut self, matrix: &[RangeSeries], query: &Query) {
        for series in matrix {
            let row = self.row_mut(generate_key(&series.metric, &query.row_key));
            apply_labels(row, &series.metric, query);

            if let Some(spec) = &query.aggregation {
                let value = reduce(spec.method, &series.values);
                if let Some(name) = &spec.value_name {
                    row.insert(name.clone(), format_value(value));
                }
                if let Some(name) = &spec.transformed_name {
                    let factor = transform_factor(spec.method, series.values.len());
                    row.insert(name.clone(), format_value(value * factor));
                }
            }
        }
    }

    /// Merge an instant query's samples; values are stored as returned
    pub fn merge_vector(&mut self, vector: &[InstantSample], query: &Query) {
        for sample in vector {
            let row = self.row_mut(generate_key(&sample.metric, &query.row_key));
            apply_labels(row, &sample.metric, query);

            if let Some(name) = query.aggregation.as_ref().and_then(|s| s.value_name.as_ref()) {
                row.insert(name.clone(), format_value(sample.value.value));
            }
        }
    }
}

impl<'a> IntoIterator for &'a MappedResults {
    type Item = (&'a String, &'a MappedValues);
    type IntoIter = btree_map::Iter<'a, String, MappedValues>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

fn apply_labels(row: &mut MappedValues, metric: &LabelSet, query: &Query) {
    for (field, label) in &query.static_fields {
        let value = metric.get(label).cloned().unwrap_or_default();
        row.insert(field.clone(), value);
    }
    for (field, pattern) in &query.label_fields {
        row.insert(field.clone(), find_fields(metric, pattern));
    }
}

/// Row identity for a series.
///
/// One label yields its raw value. Several labels yield their values sorted
/// and comma-joined, so the order follows the values, not the label names.
pub fn generate_key(metric: &LabelSet, keys: &[String]) -> String {
    if let [single] = keys {
        return metric.get(single).cloned().unwrap_or_default();
    }
    let mut values: Vec<&str> = keys
        .iter()
        .map(|k| metric.get(k).map(String::as_str).unwrap_or(""))
        .collect();
    values.sort_unstable();
    values.join(",")
}

/// Collect every label whose name starts with `pattern` as sorted `name:value`
/// pairs joined by `|`. A single trailing `*` on the pattern is ignored.
pub fn find_fields(metric: &LabelSet, pattern: &str) -> String {
    let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
    let mut found: Vec<String> = metric
        .iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .map(|(name, value)| format!("{name}:{value}"))
        .collect();
    found.sort();
    found.join("|")
}

/// Reduce samples to a scalar. Empty input reduces to 0 for every method.
pub fn reduce(method: Method, values: &[SamplePair]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match method {
        Method::Sum => sum(values),
        Method::Avg => sum(values) / values.len() as f64,
        Method::Max => extreme(values, |candidate, current| candidate > current),
        Method::Min => extreme(values, |candidate, current| candidate < current),
        Method::None => 0.0,
    }
}

fn sum(values: &[SamplePair]) -> f64 {
    values.iter().map(|s| s.value).sum()
}

// Keeps the first sample unless a later one compares strictly better, so a
// leading NaN sticks and later NaNs are skipped.
fn extreme(values: &[SamplePair], better: impl Fn(f64, f64) -> bool) -> f64 {
    values.iter().skip(1).fold(values[0].value, |current, s| {
        if better(s.value, current) {
            s.value
        } else {
            current
        }
    })
}

/// Scale converting a reduced per-second rate into a total over the window
pub fn transform_factor(method: Method, sample_count: usize) -> f64 {
    match method {
        Method::Max => SECONDS_PER_SAMPLE * sample_count as f64,
        _ => SECONDS_PER_SAMPLE,
    }
}

/// Fixed six-decimal text, never scientific notation
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "+" } else { "-" };
        format!("{sign}Inf")
    } else {
        format!("{value:.6}")
    }
}

/// Last `/`-separated segment of a node's provider id
pub fn resource_id(provider_id: &str) -> String {
    provider_id
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
