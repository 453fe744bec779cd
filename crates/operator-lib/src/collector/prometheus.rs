//! Prometheus HTTP API client
//!
//! Speaks `/api/v1/query_range` and `/api/v1/query`, with an optional bearer
//! token read from a file, an optional CA bundle and optional insecure TLS.

use super::{async_trait, MetricsSource};
use crate::error::SourceError;
use crate::models::{InstantSample, LabelSet, QueryResult, QueryValue, RangeSeries, SamplePair, TimeRange};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Connection settings for a Prometheus server
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Base URL, e.g. `https://thanos-querier.openshift-monitoring.svc:9091`
    pub address: String,
    pub bearer_token_file: Option<PathBuf>,
    pub ca_cert_file: Option<PathBuf>,
    pub skip_tls_verification: bool,
    /// Transport-level request timeout
    pub request_timeout: Duration,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:9090".to_string(),
            bearer_token_file: None,
            ca_cert_file: None,
            skip_tls_verification: false,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// `MetricsSource` backed by a Prometheus-compatible HTTP API
#[derive(Debug, Clone)]
pub struct PrometheusSource {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl PrometheusSource {
    pub fn new(config: &PrometheusConfig) -> Result<Self, SourceError> {
        let mut base = Url::parse(&config.address)
            .map_err(|e| SourceError::Config(format!("invalid address {}: {e}", config.address)))?;
        // API paths are joined onto the base, so a path prefix must end in `/`
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let token = match &config.bearer_token_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Credentials {
                    path: path.clone(),
                    source,
                })?;
                Some(raw.trim().to_string())
            }
            None => None,
        };

        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
        if let Some(path) = &config.ca_cert_file {
            let pem = std::fs::read(path).map_err(|source| SourceError::Credentials {
                path: path.clone(),
                source,
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| SourceError::Config(format!("invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if config.skip_tls_verification {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| SourceError::Config(format!("cannot create http client: {e}")))?;

        info!(address = %base, "Configured Prometheus source");
        Ok(Self {
            client,
            base,
            token,
        })
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<QueryResult, SourceError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| SourceError::Config(format!("invalid api path {path}: {e}")))?;
        debug!(url = %url, "Querying Prometheus");

        let mut request = self.client.get(url.clone()).query(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|source| SourceError::Http {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| SourceError::Http {
            url: url.to_string(),
            source,
        })?;

        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(decoded) => decoded.into_result(),
            Err(_) if !status.is_success() => Err(SourceError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(SourceError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl MetricsSource for PrometheusSource {
    async fn query_range(&self, query: &str, range: &TimeRange) -> Result<QueryResult, SourceError> {
        let params = [
            ("query", query.to_string()),
            ("start", unix_seconds(range.start)),
            ("end", unix_seconds(range.end)),
            ("step", range.step.as_secs_f64().to_string()),
        ];
        self.get("api/v1/query_range", &params).await
    }

    async fn query(&self, query: &str, time: DateTime<Utc>) -> Result<QueryResult, SourceError> {
        let params = [("query", query.to_string()), ("time", unix_seconds(time))];
        self.get("api/v1/query", &params).await
    }
}

fn unix_seconds(time: DateTime<Utc>) -> String {
    format!("{:.3}", time.timestamp_millis() as f64 / 1000.0)
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    data: Option<ApiData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum ApiData {
    Matrix(Vec<ApiRangeSeries>),
    Vector(Vec<ApiSample>),
    Scalar(ApiPair),
    String(ApiPair),
}

#[derive(Debug, Deserialize)]
struct ApiRangeSeries {
    #[serde(default)]
    metric: LabelSet,
    #[serde(default)]
    values: Vec<ApiPair>,
}

#[derive(Debug, Deserialize)]
struct ApiSample {
    #[serde(default)]
    metric: LabelSet,
    value: ApiPair,
}

#[derive(Debug, Deserialize)]
struct ApiPair(f64, String);

impl ApiPair {
    fn sample(&self) -> Result<SamplePair, SourceError> {
        Ok(SamplePair::new(self.0, parse_sample_value(&self.1)?))
    }
}

impl ApiResponse {
    fn into_result(self) -> Result<QueryResult, SourceError> {
        if self.status != "success" {
            return Err(SourceError::Api {
                error_type: self.error_type.unwrap_or_else(|| "error".to_string()),
                message: self.error.unwrap_or_default(),
            });
        }
        let data = self
            .data
            .ok_or_else(|| SourceError::Decode("response has no data".to_string()))?;

        let value = match data {
            ApiData::Matrix(series) => QueryValue::Matrix(
                series
                    .into_iter()
                    .map(|s| {
                        let values = s.values.iter().map(ApiPair::sample).collect::<Result<_, _>>()?;
                        Ok(RangeSeries {
                            metric: s.metric,
                            values,
                        })
                    })
                    .collect::<Result<_, SourceError>>()?,
            ),
            ApiData::Vector(samples) => QueryValue::Vector(
                samples
                    .into_iter()
                    .map(|s| {
                        Ok(InstantSample {
                            value: s.value.sample()?,
                            metric: s.metric,
                        })
                    })
                    .collect::<Result<_, SourceError>>()?,
            ),
            ApiData::Scalar(pair) => QueryValue::Scalar(pair.sample()?),
            ApiData::String(pair) => QueryValue::String {
                timestamp: pair.0,
                value: pair.1,
            },
        };

        Ok(QueryResult::new(value).with_warnings(self.warnings))
    }
}

fn parse_sample_value(raw: &str) -> Result<f64, SourceError> {
    match raw {
        "NaN" => Ok(f64::NAN),
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        other => other
            .parse()
            .map_err(|_| SourceError::Decode(format!("invalid sample value {other:?}"))),
    }
}
