//! Query service over a projects directory
//!
//! Every operation opens a short-lived read-only handle on the run file,
//! reads, and closes it again, so the service never holds a file open
//! between requests and never blocks the run's writer.

use chrono::{DateTime, FixedOffset, SecondsFormat, TimeZone, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use runlog::{
    meta_keys, run_path_in, runs_dir_in, RunRead, RunReader, RunStatus, StepRange, StoreError,
    TypedValue, RUN_FILE_EXTENSION,
};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, StoreError>;

/// One entry of the run listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub project: String,

    /// File stem of the run file
    pub run_name: String,

    pub status: RunStatus,
    pub experiment_name: Option<String>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
}

impl RunSummary {
    fn unknown(project: &str, run_name: &str) -> Self {
        Self {
            project: project.to_string(),
            run_name: run_name.to_string(),
            status: RunStatus::Unknown,
            experiment_name: None,
            created_at: None,
            closed_at: None,
        }
    }

    fn created_at_parsed(&self) -> Option<DateTime<FixedOffset>> {
        self.created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    }
}

/// One metric point on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPointRecord {
    pub path: String,
    pub step: i64,

    /// Non-finite values serialize as `null`
    pub value: f64,

    /// Write time, serialized as RFC 3339 UTC with milliseconds
    #[serde(serialize_with = "serialize_ts_millis")]
    pub ts: i64,
}

fn serialize_ts_millis<S: Serializer>(ts: &i64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match Utc.timestamp_millis_opt(*ts).single() {
        Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => serializer.serialize_i64(*ts),
    }
}

/// Read-only queries over `<projects_dir>/<project>/runs/<run>.sqlite`
#[derive(Debug, Clone)]
pub struct QueryService {
    projects_dir: PathBuf,
}

impl QueryService {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Every run below the projects directory, newest first.
    ///
    /// A file that cannot be read shows up with status `unknown` instead of
    /// failing the listing.
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let mut runs = Vec::new();

        for project in sorted_entries(&self.projects_dir, EntryKind::Dir).await? {
            let Some(project_name) = visible_file_name(&project) else {
                continue;
            };
            let runs_dir = runs_dir_in(&self.projects_dir, &project_name);
            if !is_kind(&runs_dir, EntryKind::Dir).await {
                continue;
            }
            let files = match sorted_entries(&runs_dir, EntryKind::File).await {
                Ok(files) => files,
                Err(e) => {
                    warn!(project = %project_name, dir = %runs_dir.display(), error = %e, "Skipping unreadable runs directory");
                    continue;
                }
            };

            for file in files {
                if file.extension().map_or(true, |ext| ext != RUN_FILE_EXTENSION) {
                    continue;
                }
                let Some(run_name) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                    continue;
                };
                if run_name.starts_with('.') {
                    continue;
                }
                runs.push(summarize_run(&project_name, &run_name, &file).await);
            }
        }

        runs.sort_by(compare_summaries);
        debug!(dir = %self.projects_dir.display(), count = runs.len(), "Listed runs");
        Ok(runs)
    }

    /// All configs of a run
    pub async fn get_configs(&self, project: &str, run: &str) -> Result<BTreeMap<String, TypedValue>> {
        self.read_run(project, run, |reader| reader.read_all_configs().boxed())
            .await
    }

    /// Sorted paths of every series with at least one point
    pub async fn get_metric_paths(&self, project: &str, run: &str) -> Result<Vec<String>> {
        self.read_run(project, run, |reader| {
            async move {
                let paths = reader.read_all_metric_paths().await?;
                Ok::<_, StoreError>(paths.into_iter().collect())
            }
            .boxed()
        })
        .await
    }

    /// Points of one series, or of every series when `path` is `None`
    pub async fn get_metrics(
        &self,
        project: &str,
        run: &str,
        path: Option<&str>,
        range: StepRange,
    ) -> Result<Vec<MetricPointRecord>> {
        let path = path.map(str::to_string);
        self.read_run(project, run, move |reader| {
            async move {
                let records: Vec<MetricPointRecord> = match path {
                    Some(path) => reader
                        .read_metric_points(&path, Some(range))
                        .await?
                        .into_iter()
                        .map(|p| MetricPointRecord {
                            path: path.clone(),
                            step: p.step,
                            value: p.value,
                            ts: p.ts,
                        })
                        .collect(),
                    None => reader
                        .read_all_metric_points(Some(range))
                        .await?
                        .into_iter()
                        .map(|p| MetricPointRecord {
                            path: p.path,
                            step: p.step,
                            value: p.value,
                            ts: p.ts,
                        })
                        .collect(),
                };
                Ok::<_, StoreError>(records)
            }
            .boxed()
        })
        .await
    }

    /// Path of an existing run file
    async fn resolve_run(&self, project: &str, run: &str) -> Result<PathBuf> {
        if !is_valid_identifier(project) || !is_valid_identifier(run) {
            return Err(StoreError::run_not_found(project, run));
        }
        let path = run_path_in(&self.projects_dir, project, run);
        if !is_kind(&path, EntryKind::File).await {
            return Err(StoreError::run_not_found(project, run));
        }
        Ok(path)
    }

    /// Open a reader, run `read` against it and close it on every path
    async fn read_run<T, F>(&self, project: &str, run: &str, read: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a RunReader) -> BoxFuture<'a, Result<T>>,
    {
        let path = self.resolve_run(project, run).await?;
        let reader = RunReader::open(&path).await?;
        let result = read(&reader).await;
        reader.close().await;

        if let Err(e) = &result {
            warn!(project, run, error = %e, "Run read failed");
        }
        result
    }
}

async fn summarize_run(project: &str, run_name: &str, path: &Path) -> RunSummary {
    match read_meta(path).await {
        Ok(meta) => RunSummary {
            project: project.to_string(),
            run_name: run_name.to_string(),
            status: meta
                .get(meta_keys::STATUS)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(RunStatus::Unknown),
            experiment_name: meta.get(meta_keys::EXPERIMENT_NAME).cloned(),
            created_at: meta.get(meta_keys::CREATED_AT).cloned(),
            closed_at: meta.get(meta_keys::CLOSED_AT).cloned(),
        },
        Err(e) => {
            let e = StoreError::malformed(path, e);
            warn!(project, run = run_name, error = %e, kind = e.kind(), "Unreadable run in listing");
            RunSummary::unknown(project, run_name)
        }
    }
}

async fn read_meta(path: &Path) -> Result<BTreeMap<String, String>> {
    let reader = RunReader::open(path).await?;
    let meta = reader.read_meta_all().await;
    reader.close().await;
    meta
}

/// Newest `created_at` first, missing timestamps last, then project and
/// run name
fn compare_summaries(a: &RunSummary, b: &RunSummary) -> Ordering {
    let by_created = match (a.created_at_parsed(), b.created_at_parsed()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_created
        .then_with(|| a.project.cmp(&b.project))
        .then_with(|| a.run_name.cmp(&b.run_name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

/// Whether `path` exists and is of `kind`, following symlinks
async fn is_kind(path: &Path, kind: EntryKind) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => match kind {
            EntryKind::Dir => meta.is_dir(),
            EntryKind::File => meta.is_file(),
        },
        Err(_) => false,
    }
}

/// Sorted entries of `dir` of the given kind; a missing directory is empty.
///
/// Only failing to open `dir` is an error. A failing entry is logged and
/// ends the scan with what was read so far.
async fn sorted_entries(dir: &Path, kind: EntryKind) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if is_kind(&path, kind).await {
                    paths.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Stopped reading directory early");
                break;
            }
        }
    }
    paths.sort();
    Ok(paths)
}

fn visible_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.starts_with('.'))
        .map(str::to_string)
}

/// Project and run names must stay inside their directory
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(project: &str, run: &str, created_at: Option<&str>) -> RunSummary {
        RunSummary {
            created_at: created_at.map(str::to_string),
            ..RunSummary::unknown(project, run)
        }
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("exp1"));
        assert!(is_valid_identifier("bold-owl-2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier(".."));
        assert!(!is_valid_identifier(".hidden"));
        assert!(!is_valid_identifier("a/b"));
        assert!(!is_valid_identifier("a\\b"));
        assert!(!is_valid_identifier("a\0b"));
    }

    #[test]
    fn test_listing_order() {
        let mut runs = vec![
            summary("p", "old", Some("2025-01-01T00:00:00+00:00")),
            summary("p", "none", None),
            summary("p", "new", Some("2025-03-01T00:00:00+00:00")),
            summary("a", "same", Some("2025-01-01T00:00:00+00:00")),
        ];
        runs.sort_by(compare_summaries);
        let names: Vec<&str> = runs.iter().map(|r| r.run_name.as_str()).collect();
        assert_eq!(names, vec!["new", "same", "old", "none"]);
    }

    #[test]
    fn test_ts_serialization() {
        let record = MetricPointRecord {
            path: "loss".to_string(),
            step: 0,
            value: f64::NAN,
            ts: 1_735_734_600_250,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ts"], "2025-01-01T12:30:00.250Z");
        assert!(json["value"].is_null());
    }

    #[tokio::test]
    async fn test_missing_root_lists_nothing() {
        let service = QueryService::new("/nonexistent/runlog/projects");
        assert!(service.list_runs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sorted_entries_filters_by_kind() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("c.sqlite"), b"").unwrap();

        let dirs = sorted_entries(dir.path(), EntryKind::Dir).await.unwrap();
        assert_eq!(dirs, vec![dir.path().join("a"), dir.path().join("b")]);

        let files = sorted_entries(dir.path(), EntryKind::File).await.unwrap();
        assert_eq!(files, vec![dir.path().join("c.sqlite")]);
    }

    #[tokio::test]
    async fn test_traversal_is_not_found() {
        let service = QueryService::new("/tmp");
        let err = service.get_configs("..", "etc").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
