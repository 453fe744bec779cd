//! Query declarations
//!
//! A query names the PromQL expression to evaluate, the labels that identify
//! the row each series merges into, the labels copied verbatim into that row
//! and an optional reduction of the series' samples to one value.

/// Statistical reduction applied to a series' samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    Sum,
    Max,
    Min,
    Avg,
    /// Unset or unknown; reduces to 0
    #[default]
    None,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Sum => "sum",
            Method::Max => "max",
            Method::Min => "min",
            Method::Avg => "avg",
            Method::None => "",
        }
    }
}

impl From<&str> for Method {
    fn from(value: &str) -> Self {
        match value {
            "sum" => Method::Sum,
            "max" => Method::Max,
            "min" => Method::Min,
            "avg" => Method::Avg,
            _ => Method::None,
        }
    }
}

/// How a query's sample values are saved into its row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregationSpec {
    /// Field receiving the reduced value
    pub value_name: Option<String>,
    pub method: Method,
    /// Field receiving the reduced rate converted to a period total
    pub transformed_name: Option<String>,
}

impl AggregationSpec {
    pub fn new(value_name: impl Into<String>, method: Method) -> Self {
        Self {
            value_name: Some(value_name.into()),
            method,
            transformed_name: None,
        }
    }

    /// Saves only the raw value; used by instant queries
    pub fn value(value_name: impl Into<String>) -> Self {
        Self::new(value_name, Method::None)
    }

    /// Saves only the transformed total
    pub fn total_only(method: Method, transformed_name: impl Into<String>) -> Self {
        Self {
            value_name: None,
            method,
            transformed_name: Some(transformed_name.into()),
        }
    }

    pub fn transformed(mut self, transformed_name: impl Into<String>) -> Self {
        self.transformed_name = Some(transformed_name.into());
        self
    }
}

/// A named query and the way its results merge into rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub name: String,
    pub query_string: String,
    /// Labels whose values identify the row
    pub row_key: Vec<String>,
    /// (output field, label name) pairs copied verbatim
    pub static_fields: Vec<(String, String)>,
    /// (output field, label-name prefix pattern) pairs collected as `name:value`
    pub label_fields: Vec<(String, String)>,
    pub aggregation: Option<AggregationSpec>,
}

impl Query {
    pub fn new(name: impl Into<String>, query_string: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query_string: query_string.into(),
            row_key: Vec::new(),
            static_fields: Vec::new(),
            label_fields: Vec::new(),
            aggregation: None,
        }
    }

    pub fn row_key(mut self, labels: &[&str]) -> Self {
        self.row_key = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn static_field(mut self, field: &str, label: &str) -> Self {
        self.static_fields.push((field.to_string(), label.to_string()));
        self
    }

    /// Copy each label into a field of the same name
    pub fn static_labels(mut self, labels: &[&str]) -> Self {
        for label in labels {
            self.static_fields.push((label.to_string(), label.to_string()));
        }
        self
    }

    pub fn label_field(mut self, field: &str, pattern: &str) -> Self {
        self.label_fields.push((field.to_string(), pattern.to_string()));
        self
    }

    pub fn aggregate(mut self, spec: AggregationSpec) -> Self {
        self.aggregation = Some(spec);
        self
    }
}
