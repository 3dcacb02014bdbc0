//! `patrol-core` -- inspection template rendering and result evaluation.
//!
//! Pure logic, no I/O. This crate owns the YAML template data model, the
//! two-phase variable resolver, query rendering, threshold classification,
//! result aggregation with highlight and pagination post-processing, and the
//! [`backend::MetricsBackend`] trait that abstracts the time-series backend.
//! The HTTP transport and the target cache live in `patrol-prom`.

pub mod aggregate;
pub mod backend;
pub mod error;
pub mod highlight;
pub mod paginate;
pub mod result;
pub mod runner;
pub mod template;
pub mod threshold;
pub mod validate;
pub mod vars;

pub use error::CoreError;
