//! Domain models stored in a run file

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Reserved `run_meta` keys
pub mod meta_keys {
    pub const STATUS: &str = "status";
    pub const RUN_NAME: &str = "run_name";
    pub const PROJECT: &str = "project";
    pub const EXPERIMENT_NAME: &str = "experiment_name";
    pub const CREATED_AT: &str = "created_at";
    pub const CLOSED_AT: &str = "closed_at";
}

/// Lifecycle status of a run.
///
/// `Unknown` never gets written; it is what a listing reports for a file
/// it could not read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
            RunStatus::Unknown => "unknown",
        }
    }

    /// Whether the run has been finalized
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Finished | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "finished" => Ok(RunStatus::Finished),
            "failed" => Ok(RunStatus::Failed),
            other => Err(StoreError::invalid(format!("invalid run status: {}", other))),
        }
    }
}

/// Terminal status chosen when finalizing a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Finished,
    Failed,
}

impl From<RunOutcome> for RunStatus {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Finished => RunStatus::Finished,
            RunOutcome::Failed => RunStatus::Failed,
        }
    }
}

impl FromStr for RunOutcome {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "finished" => Ok(RunOutcome::Finished),
            "failed" => Ok(RunOutcome::Failed),
            other => Err(StoreError::invalid(format!(
                "finalize status must be 'finished' or 'failed', got '{}'",
                other
            ))),
        }
    }
}

/// One stored metric point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Step within the series
    pub step: i64,

    /// Logged value
    pub value: f64,

    /// Write time in Unix milliseconds
    pub ts: i64,
}

/// A metric point together with the path of its series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub path: String,
    pub step: i64,
    pub value: f64,
    pub ts: i64,
}

/// Inclusive step bounds for point queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRange {
    pub min_step: Option<i64>,
    pub max_step: Option<i64>,
}

impl StepRange {
    /// Range without bounds
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(min_step: Option<i64>, max_step: Option<i64>) -> Self {
        Self { min_step, max_step }
    }

    /// Bounds as SQL parameters, open ends replaced by the i64 extremes
    pub(crate) fn bounds(&self) -> (i64, i64) {
        (self.min_step.unwrap_or(i64::MIN), self.max_step.unwrap_or(i64::MAX))
    }
}
