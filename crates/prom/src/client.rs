//! Prometheus HTTP API client.
//!
//! Thin reqwest wrapper over `/api/v1/query`, `/api/v1/query_range` and
//! `/api/v1/targets`, decoding the API envelope into `patrol_core` backend
//! types. Network and API failures are returned verbatim; retry policy
//! belongs to the caller.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use patrol_core::backend::{
    ActiveTarget, BackendError, MetricsBackend, Sample, Series, SeriesPoint,
};

use crate::error::PromError;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A Prometheus query client bound to one server.
#[derive(Debug, Clone)]
pub struct PromClient {
    http: reqwest::Client,
    base_url: String,
}

impl PromClient {
    /// Create a client with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PromError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a specific per-request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PromError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Perform one API call and unwrap the response envelope.
    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PromError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        let envelope: ApiResponse<T> = response.json().await?;

        if envelope.status != "success" {
            return Err(PromError::Api {
                error_type: envelope.error_type,
                message: envelope.error,
            });
        }
        envelope.data.ok_or_else(|| PromError::Api {
            error_type: "missing_data".to_string(),
            message: "success response without data".to_string(),
        })
    }

    /// Instant query, decoded to samples.
    pub async fn query(&self, query: &str, ts: DateTime<Utc>) -> Result<Vec<Sample>, PromError> {
        let data: QueryData = self
            .fetch(
                "/api/v1/query",
                &[
                    ("query", query.to_string()),
                    ("time", ts.to_rfc3339()),
                ],
            )
            .await?;
        parse_vector(&data)
    }

    /// Range query, decoded to series.
    pub async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<Series>, PromError> {
        let data: QueryData = self
            .fetch(
                "/api/v1/query_range",
                &[
                    ("query", query.to_string()),
                    ("start", start.to_rfc3339()),
                    ("end", end.to_rfc3339()),
                    ("step", format!("{}s", step.as_secs().max(1))),
                ],
            )
            .await?;
        parse_matrix(&data)
    }

    /// The full active-target inventory.
    pub async fn targets(&self) -> Result<Vec<ActiveTarget>, PromError> {
        let data: TargetsData = self.fetch("/api/v1/targets", &[]).await?;
        Ok(data.active_targets.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl MetricsBackend for PromClient {
    async fn instant_query(
        &self,
        query: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<Sample>, BackendError> {
        Ok(self.query(query, ts).await?)
    }

    async fn range_query(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<Series>, BackendError> {
        Ok(self.query_range(query, start, end, step).await?)
    }

    async fn active_targets(&self) -> Result<Vec<ActiveTarget>, BackendError> {
        Ok(self.targets().await?)
    }
}

/* --------------------------------------------------------------------------
   API envelope
   -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    data: Option<T>,
    #[serde(default, rename = "errorType")]
    error_type: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    metric: HashMap<String, String>,
    /// `[unix_seconds, "value"]` -- Prometheus encodes the value as a
    /// string to keep full float precision.
    value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    metric: HashMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

#[derive(Debug, Deserialize)]
struct TargetsData {
    #[serde(rename = "activeTargets", default)]
    active_targets: Vec<ActiveTargetJson>,
}

#[derive(Debug, Deserialize)]
struct ActiveTargetJson {
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(rename = "scrapePool", default)]
    scrape_pool: String,
    #[serde(rename = "scrapeUrl", default)]
    scrape_url: String,
    #[serde(default)]
    health: String,
    #[serde(rename = "lastError", default)]
    last_error: String,
}

impl From<ActiveTargetJson> for ActiveTarget {
    fn from(t: ActiveTargetJson) -> Self {
        ActiveTarget {
            scrape_pool: t.scrape_pool,
            labels: t.labels.into_iter().collect(),
            health: t.health,
            scrape_url: t.scrape_url,
            last_error: t.last_error,
        }
    }
}

/* --------------------------------------------------------------------------
   Result decoding
   -------------------------------------------------------------------------- */

fn parse_value(raw: &str) -> Result<f64, PromError> {
    raw.parse::<f64>().map_err(|_| PromError::Api {
        error_type: "bad_value".to_string(),
        message: format!("unparsable sample value {raw:?}"),
    })
}

pub(crate) fn parse_vector(data: &QueryData) -> Result<Vec<Sample>, PromError> {
    if data.result_type != "vector" {
        return Err(PromError::UnexpectedResultType(data.result_type.clone()));
    }
    let raw: Vec<VectorSample> = serde_json::from_value(data.result.clone())?;
    raw.into_iter()
        .map(|s| {
            Ok(Sample {
                labels: s.metric.into_iter().collect(),
                value: parse_value(&s.value.1)?,
            })
        })
        .collect()
}

pub(crate) fn parse_matrix(data: &QueryData) -> Result<Vec<Series>, PromError> {
    if data.result_type != "matrix" {
        return Err(PromError::UnexpectedResultType(data.result_type.clone()));
    }
    let raw: Vec<MatrixSeries> = serde_json::from_value(data.result.clone())?;
    raw.into_iter()
        .map(|s| {
            let points = s
                .values
                .iter()
                .map(|(ts, v)| {
                    Ok(SeriesPoint {
                        timestamp: *ts,
                        value: parse_value(v)?,
                    })
                })
                .collect::<Result<Vec<_>, PromError>>()?;
            Ok(Series {
                labels: s.metric.into_iter().collect(),
                points,
            })
        })
        .collect()
}
