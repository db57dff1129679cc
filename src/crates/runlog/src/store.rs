//! Run store: the single writer and the read-only handle of a run file
//!
//! [`RunStore`] owns the only write connection to a run file for the whole
//! run. Every write is one transaction on that connection, so calls apply
//! in order and are durable once they return. The file stays in WAL mode
//! while the run is live, which lets [`RunReader`] handles in other
//! processes read committed snapshots without blocking the writer.
//!
//! [`RunStore::finalize`] records the terminal status, checkpoints the WAL
//! into the main file and closes the connection, leaving a single
//! self-contained file behind.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::db::{sidecar_paths, Database, DatabasePool};
use crate::error::{Result, StoreError};
use crate::models::{meta_keys, MetricPoint, RunOutcome, RunStatus, SeriesPoint, StepRange};
use crate::repositories::{ConfigRepository, MetaRepository, MetricRepository, PointRow};
use crate::value::{AsMetricValue, AsStep, TypedValue};

/// Read operations shared by the writer and read-only handles
#[async_trait]
pub trait RunRead: Send + Sync {
    /// Current lifecycle status
    async fn read_status(&self) -> Result<RunStatus>;

    /// All bookkeeping entries
    async fn read_meta_all(&self) -> Result<BTreeMap<String, String>>;

    /// All config entries, keyed by path
    async fn read_all_configs(&self) -> Result<BTreeMap<String, TypedValue>>;

    /// Paths of every series with at least one point
    async fn read_all_metric_paths(&self) -> Result<BTreeSet<String>>;

    /// Points of one series ordered by step
    async fn read_metric_points(&self, path: &str, filter: Option<StepRange>) -> Result<Vec<MetricPoint>>;

    /// Points of every series ordered by path, then step
    async fn read_all_metric_points(&self, filter: Option<StepRange>) -> Result<Vec<SeriesPoint>>;
}

/// Writer-side mutable state
#[derive(Debug, Default)]
struct WriterState {
    /// Series ids of committed registrations
    series: HashMap<String, i64>,

    /// Last `ts` handed out, in Unix milliseconds
    last_ts: i64,
}

/// The single writer of a run file
#[derive(Debug)]
pub struct RunStore {
    path: PathBuf,
    db: Mutex<Option<Database>>,
    state: Mutex<WriterState>,
}

impl RunStore {
    /// Open a run file for writing, creating file and schema if absent.
    ///
    /// Opening an existing file keeps its data. A new file starts with
    /// `status = running`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::open_writer(&path).await?;

        let init = async {
            let mut tx = db.pool().begin().await?;
            MetaRepository::set_if_absent(&mut tx, meta_keys::STATUS, RunStatus::Running.as_str()).await?;
            MetaRepository::set_if_absent(&mut tx, meta_keys::CREATED_AT, &now_rfc3339()).await?;
            tx.commit().await
        };
        if let Err(e) = init.await {
            db.close().await;
            return Err(StoreError::unavailable(&path, e));
        }

        info!(path = %path.display(), "Run store opened");

        Ok(Self {
            path,
            db: Mutex::new(Some(db)),
            state: Mutex::new(WriterState::default()),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether finalize or discard has run
    pub fn is_closed(&self) -> bool {
        self.db.lock().is_none()
    }

    fn pool(&self) -> Result<DatabasePool> {
        self.db
            .lock()
            .as_ref()
            .map(|db| db.pool().clone())
            .ok_or(StoreError::StoreClosed)
    }

    /// Write time for the next point, never earlier than the previous one
    fn next_ts(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut state = self.state.lock();
        state.last_ts = state.last_ts.max(now);
        state.last_ts
    }

    /// Create or overwrite one bookkeeping entry.
    ///
    /// `status` only accepts `running`, `finished` or `failed`.
    pub async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        if key == meta_keys::STATUS {
            value.parse::<RunStatus>()?;
        }
        let pool = self.pool()?;
        let mut conn = pool.acquire().await?;
        MetaRepository::set(&mut conn, key, value).await?;
        Ok(())
    }

    /// Read one bookkeeping entry
    pub async fn read_meta(&self, key: &str) -> Result<Option<String>> {
        let pool = self.pool()?;
        Ok(MetaRepository::get(&pool, key).await?)
    }

    /// Create or overwrite one config entry
    pub async fn upsert_config(&self, key: &str, value: impl Into<TypedValue>) -> Result<()> {
        self.upsert_configs([(key.to_string(), value.into())]).await
    }

    /// Create or overwrite several config entries in one transaction
    pub async fn upsert_configs<I, K>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, TypedValue)>,
        K: AsRef<str>,
    {
        let entries: Vec<(K, TypedValue)> = entries.into_iter().collect();
        if entries.is_empty() {
            return Ok(());
        }

        let pool = self.pool()?;
        let updated_at = now_rfc3339();

        let mut tx = pool.begin().await?;
        for (key, value) in &entries {
            let (tag, raw) = value.encode();
            ConfigRepository::upsert(&mut tx, key.as_ref(), tag.as_str(), &raw, &updated_at).await?;
        }
        tx.commit().await?;

        debug!(path = %self.path.display(), count = entries.len(), "Configs written");
        Ok(())
    }

    /// Record `value` at `step` of the series `path`.
    ///
    /// Re-logging a step overwrites its value and refreshes its timestamp.
    pub async fn log_metric(&self, path: &str, step: impl AsStep, value: impl AsMetricValue) -> Result<()> {
        let step = step.as_step()?;
        let value = checked_metric_value(path, value.as_metric_value()?)?;
        self.write_points(step, vec![(path.to_string(), value)]).await
    }

    /// Record several series at the same step in one transaction.
    ///
    /// Every value is coerced before anything is written, so one bad value
    /// rejects the whole call.
    pub async fn log_metrics<I, K, V>(&self, values: I, step: impl AsStep) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsMetricValue,
    {
        let step = step.as_step()?;
        let points = values
            .into_iter()
            .map(|(path, value)| {
                let path = path.as_ref();
                let value = checked_metric_value(path, value.as_metric_value()?)?;
                Ok((path.to_string(), value))
            })
            .collect::<Result<Vec<_>>>()?;

        if points.is_empty() {
            return Ok(());
        }
        self.write_points(step, points).await
    }

    async fn write_points(&self, step: i64, points: Vec<(String, f64)>) -> Result<()> {
        let pool = self.pool()?;
        let ts = self.next_ts();
        let mut registered = Vec::new();

        let mut tx = pool.begin().await?;
        for (path, y) in &points {
            let cached = self.state.lock().series.get(path).copied();
            let series_id = match cached {
                Some(id) => id,
                None => {
                    let id = MetricRepository::ensure_series(&mut tx, path).await?;
                    registered.push((path.clone(), id));
                    id
                }
            };
            MetricRepository::upsert_point(&mut tx, series_id, step, *y, ts).await?;
        }
        tx.commit().await?;

        // Only committed registrations are cached; a rolled back id could
        // be handed to another path later.
        if !registered.is_empty() {
            let mut state = self.state.lock();
            for (path, id) in registered {
                debug!(series = %path, id, "Metric series registered");
                state.series.insert(path, id);
            }
        }
        Ok(())
    }

    /// Record the terminal status, checkpoint the WAL into the main file
    /// and release the write handle.
    ///
    /// A second call does nothing.
    pub async fn finalize(&self, outcome: RunOutcome) -> Result<()> {
        let db = match self.db.lock().take() {
            Some(db) => db,
            None => {
                debug!(path = %self.path.display(), "Run store already finalized");
                return Ok(());
            }
        };

        let status = RunStatus::from(outcome);
        let result = async {
            let mut tx = db.pool().begin().await?;
            MetaRepository::set(&mut tx, meta_keys::STATUS, status.as_str()).await?;
            MetaRepository::set(&mut tx, meta_keys::CLOSED_AT, &now_rfc3339()).await?;
            tx.commit().await?;
            db.checkpoint().await
        }
        .await;

        // The handle is released on every path
        db.close().await;

        match result {
            Ok(_) => {
                info!(path = %self.path.display(), status = %status, "Run store finalized");
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Run store finalize failed");
                Err(e)
            }
        }
    }

    /// Close the handle and delete the run file together with its WAL
    /// sidecars.
    pub async fn discard(&self) -> Result<()> {
        let db = self.db.lock().take();
        if let Some(db) = db {
            db.close().await;
        }

        let [wal, shm] = sidecar_paths(&self.path);
        for file in [self.path.clone(), wal, shm] {
            match std::fs::remove_file(&file) {
                Ok(()) => debug!(path = %file.display(), "Removed run file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(path = %self.path.display(), "Run store discarded");
        Ok(())
    }
}

#[async_trait]
impl RunRead for RunStore {
    async fn read_status(&self) -> Result<RunStatus> {
        read_status(&self.pool()?, &self.path).await
    }

    async fn read_meta_all(&self) -> Result<BTreeMap<String, String>> {
        Ok(MetaRepository::list(&self.pool()?).await?)
    }

    async fn read_all_configs(&self) -> Result<BTreeMap<String, TypedValue>> {
        read_configs(&self.pool()?, &self.path).await
    }

    async fn read_all_metric_paths(&self) -> Result<BTreeSet<String>> {
        let paths = MetricRepository::list_paths(&self.pool()?).await?;
        Ok(paths.into_iter().collect())
    }

    async fn read_metric_points(&self, path: &str, filter: Option<StepRange>) -> Result<Vec<MetricPoint>> {
        read_points(&self.pool()?, path, filter).await
    }

    async fn read_all_metric_points(&self, filter: Option<StepRange>) -> Result<Vec<SeriesPoint>> {
        read_all_points(&self.pool()?, filter).await
    }
}

/// Read-only handle on a run file
#[derive(Debug)]
pub struct RunReader {
    db: Database,
}

impl RunReader {
    /// Open an existing run file read-only. Never creates the file.
    ///
    /// A finalized run without sidecars is opened immutable, so reading
    /// it leaves no `-wal`/`-shm` files behind.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(db) = open_finalized(path).await {
            return Ok(Self { db });
        }

        let db = Database::open_reader(path).await?;
        Ok(Self { db })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Read one bookkeeping entry
    pub async fn read_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(MetaRepository::get(self.db.pool(), key).await?)
    }

    /// Release the handle
    pub async fn close(self) {
        self.db.close().await;
    }
}

/// Immutable handle on `path` if it holds a finalized run and no
/// connection has it open
async fn open_finalized(path: &Path) -> Option<Database> {
    if !path.is_file() || sidecar_paths(path).iter().any(|p| p.exists()) {
        return None;
    }

    let db = Database::open_immutable(path).await.ok()?;
    match read_status(db.pool(), db.path()).await {
        Ok(status) if status.is_terminal() => Some(db),
        _ => {
            db.close().await;
            None
        }
    }
}

#[async_trait]
impl RunRead for RunReader {
    async fn read_status(&self) -> Result<RunStatus> {
        read_status(self.db.pool(), self.db.path()).await
    }

    async fn read_meta_all(&self) -> Result<BTreeMap<String, String>> {
        Ok(MetaRepository::list(self.db.pool()).await?)
    }

    async fn read_all_configs(&self) -> Result<BTreeMap<String, TypedValue>> {
        read_configs(self.db.pool(), self.db.path()).await
    }

    async fn read_all_metric_paths(&self) -> Result<BTreeSet<String>> {
        let paths = MetricRepository::list_paths(self.db.pool()).await?;
        Ok(paths.into_iter().collect())
    }

    async fn read_metric_points(&self, path: &str, filter: Option<StepRange>) -> Result<Vec<MetricPoint>> {
        read_points(self.db.pool(), path, filter).await
    }

    async fn read_all_metric_points(&self, filter: Option<StepRange>) -> Result<Vec<SeriesPoint>> {
        read_all_points(self.db.pool(), filter).await
    }
}

async fn read_status(pool: &DatabasePool, path: &Path) -> Result<RunStatus> {
    match MetaRepository::get(pool, meta_keys::STATUS).await? {
        Some(raw) => raw
            .parse::<RunStatus>()
            .map_err(|e| StoreError::malformed(path, e)),
        None => Err(StoreError::malformed(path, "missing status")),
    }
}

async fn read_configs(pool: &DatabasePool, path: &Path) -> Result<BTreeMap<String, TypedValue>> {
    let rows = ConfigRepository::list(pool).await?;
    rows.into_iter()
        .map(|row| {
            let value = TypedValue::decode(&row.type_tag, row.value.as_deref())
                .map_err(|e| StoreError::malformed(path, format!("config '{}': {}", row.path, e)))?;
            Ok((row.path, value))
        })
        .collect()
}

async fn read_points(pool: &DatabasePool, path: &str, filter: Option<StepRange>) -> Result<Vec<MetricPoint>> {
    let (min_step, max_step) = filter.unwrap_or_default().bounds();
    let rows = MetricRepository::list_points(pool, path, min_step, max_step).await?;
    Ok(rows
        .into_iter()
        .map(|row| MetricPoint {
            step: row.step,
            value: row.y,
            ts: row.ts,
        })
        .collect())
}

async fn read_all_points(pool: &DatabasePool, filter: Option<StepRange>) -> Result<Vec<SeriesPoint>> {
    let (min_step, max_step) = filter.unwrap_or_default().bounds();
    let rows = MetricRepository::list_all_points(pool, min_step, max_step).await?;
    Ok(rows.into_iter().map(series_point).collect())
}

fn series_point(row: PointRow) -> SeriesPoint {
    SeriesPoint {
        path: row.path,
        step: row.step,
        value: row.y,
        ts: row.ts,
    }
}

/// SQLite stores NaN as NULL, which the schema rejects
fn checked_metric_value(path: &str, value: f64) -> Result<f64> {
    if value.is_nan() {
        return Err(StoreError::invalid(format!("metric '{}' value is NaN", path)));
    }
    Ok(value)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
