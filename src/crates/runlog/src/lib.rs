//! File-backed run store for experiment configs and metrics
//!
//! A training process logs configs and step-indexed metrics into one SQLite
//! file per run while other processes read the same file concurrently.
//! [`Run`] is the entry point for training code; [`RunStore`] and
//! [`RunReader`] are the write and read handles underneath it.

pub mod db;
pub mod error;
pub mod flatten;
pub mod models;
pub mod naming;
pub mod repositories;
pub mod run;
pub mod settings;
pub mod store;
pub mod value;

pub use db::{sidecar_paths, Database};
pub use error::{Result, StoreError};
pub use flatten::{flatten_json, normalize_path};
pub use models::{meta_keys, MetricPoint, RunOutcome, RunStatus, SeriesPoint, StepRange};
pub use naming::{generate_run_name, resolve_run_name};
pub use run::{Run, RunBuilder};
pub use settings::{run_path_in, runs_dir_in, Settings, RUN_FILE_EXTENSION};
pub use store::{RunRead, RunReader, RunStore};
pub use value::{AsMetricValue, AsStep, TypeTag, TypedValue};
