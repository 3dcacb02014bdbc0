//! The metrics backend abstraction.
//!
//! The pipeline needs exactly three capabilities from the time-series
//! backend: instant queries, range queries, and the active-target
//! inventory. Any backend exposing these can be substituted; the Prometheus
//! HTTP implementation lives in `patrol-prom`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A metric label set. Sorted map so rendering a target name from the full
/// label set is deterministic.
pub type LabelSet = BTreeMap<String, String>;

/// Errors from a backend are propagated verbatim; the core attaches no
/// retry policy.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// A single instantaneous value keyed by a label set.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: LabelSet,
    pub value: f64,
}

/// One timestamped point in a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Seconds since the Unix epoch (fractional).
    pub timestamp: f64,
    pub value: f64,
}

/// An ordered sequence of timestamped values keyed by a label set.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: LabelSet,
    pub points: Vec<SeriesPoint>,
}

/// One monitored endpoint from the backend's service-discovery inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTarget {
    /// Named group of targets sharing a collection configuration.
    pub scrape_pool: String,
    pub labels: LabelSet,
    /// `up`, `down` or `unknown`.
    pub health: String,
    pub scrape_url: String,
    pub last_error: String,
}

/// The query interface the pipeline and the target cache consume.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Evaluate `query` at a single instant.
    async fn instant_query(
        &self,
        query: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<Sample>, BackendError>;

    /// Evaluate `query` over `[start, end]` at `step` resolution.
    async fn range_query(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<Series>, BackendError>;

    /// Fetch the full active-target inventory in one call.
    async fn active_targets(&self) -> Result<Vec<ActiveTarget>, BackendError>;
}
