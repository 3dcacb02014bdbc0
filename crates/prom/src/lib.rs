//! `patrol-prom` -- Prometheus HTTP API backend for the inspection
//! pipeline.
//!
//! [`client::PromClient`] implements `patrol_core`'s `MetricsBackend` trait
//! over the `/api/v1` HTTP endpoints. [`cache::IndexedTargetCache`] keeps a
//! background-refreshed, multi-dimensional index over the active-target
//! inventory for concurrent readers.

pub mod cache;
pub mod client;
pub mod error;
pub mod targets;

pub use cache::IndexedTargetCache;
pub use client::PromClient;
pub use error::PromError;
