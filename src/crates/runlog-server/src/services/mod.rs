//! Read-side services used by the HTTP API and the CLI

pub mod query;

pub use query::{MetricPointRecord, QueryService, RunSummary};
