//! Request handlers

pub mod health;
pub mod runs;

pub use health::{health, not_found};
pub use runs::{get_configs, get_metric_paths, get_metrics, list_runs};
