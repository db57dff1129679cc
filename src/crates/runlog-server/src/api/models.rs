//! Request and response models of the HTTP API

use runlog::StepRange;
use serde::{Deserialize, Serialize};

/// Query parameters of `GET /api/runs/:project/:run/metrics`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MetricsQuery {
    /// Restrict to one series
    pub path: Option<String>,
    pub min_step: Option<i64>,
    pub max_step: Option<i64>,
}

impl MetricsQuery {
    pub fn step_range(&self) -> StepRange {
        StepRange::new(self.min_step, self.max_step)
    }

    /// Series path, ignoring an empty `path=`
    pub fn series(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_query_range() {
        let query = MetricsQuery {
            path: Some(String::new()),
            min_step: Some(2),
            max_step: None,
        };
        assert_eq!(query.series(), None);
        assert_eq!(query.step_range(), StepRange::new(Some(2), None));
    }
}
