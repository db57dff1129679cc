//! Database connection management
//!
//! Opens run files either as the single writer (WAL journal, creates the
//! file and schema) or read-only (never creates, never changes the journal
//! mode). Both sides use a pool capped at one connection, so a handle maps
//! to exactly one SQLite connection.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};

/// Type alias for the database connection pool
pub type DatabasePool = SqlitePool;

/// How long the writer waits on a lock before giving up
pub const WRITER_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a reader waits on a lock before giving up
pub const READER_BUSY_TIMEOUT: Duration = Duration::from_secs(3);

/// Outcome of `PRAGMA wal_checkpoint`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointResult {
    /// Non-zero when a reader or writer prevented a full checkpoint
    pub busy: i64,

    /// Frames in the WAL file
    pub log_frames: i64,

    /// Frames moved into the database file
    pub checkpointed_frames: i64,
}

/// Database connection wrapper for one run file
#[derive(Clone, Debug)]
pub struct Database {
    pool: DatabasePool,
    path: PathBuf,
}

impl Database {
    /// Open a run file for writing, creating it and its parent directory
    /// if needed, and bring the schema up to date.
    ///
    /// Every failure is reported as `StorageUnavailable`.
    pub async fn open_writer(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::unavailable(
                        path,
                        format!("failed to create directory {}: {}", parent.display(), e),
                    )
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(WRITER_BUSY_TIMEOUT);

        debug!(path = %path.display(), "Opening run file for writing");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(WRITER_BUSY_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::unavailable(path, e))?;

        let db = Self {
            pool,
            path: path.to_path_buf(),
        };

        if let Err(e) = db.run_migrations().await {
            db.pool.close().await;
            return Err(StoreError::unavailable(path, e));
        }

        info!(path = %path.display(), "Run file opened for writing");
        Ok(db)
    }

    /// Open an existing run file read-only.
    ///
    /// A missing file is `StorageUnavailable`; nothing is created.
    pub async fn open_reader(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .read_only(true)
            .busy_timeout(READER_BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(READER_BUSY_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::unavailable(path, e))?;

        debug!(path = %path.display(), "Run file opened read-only");

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Open a run file that no connection will change again.
    ///
    /// SQLite skips locking and never touches the `-wal`/`-shm` sidecars.
    /// Only valid while nobody writes the file.
    pub async fn open_immutable(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .read_only(true)
            .immutable(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(READER_BUSY_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::unavailable(path, e))?;

        debug!(path = %path.display(), "Run file opened immutable");

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run migrations on the database
    ///
    /// Migrations are embedded in the binary and located in ./migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!(path = %self.path.display(), "Run schema up to date");
        Ok(())
    }

    /// Move all WAL frames into the database file and truncate the WAL
    pub async fn checkpoint(&self) -> Result<CheckpointResult> {
        let row = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .fetch_one(&self.pool)
            .await?;

        let result = CheckpointResult {
            busy: row.try_get(0)?,
            log_frames: row.try_get(1)?,
            checkpointed_frames: row.try_get(2)?,
        };

        if result.busy != 0 {
            warn!(
                path = %self.path.display(),
                log_frames = result.log_frames,
                checkpointed_frames = result.checkpointed_frames,
                "WAL checkpoint could not complete, a reader holds an older snapshot"
            );
        } else {
            debug!(path = %self.path.display(), frames = result.checkpointed_frames, "WAL checkpointed");
        }

        Ok(result)
    }

    /// Perform a health check by running a simple query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection
    pub async fn close(&self) {
        self.pool.close().await;
        debug!(path = %self.path.display(), "Run file closed");
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Paths of the WAL sidecar files of a run file
pub fn sidecar_paths(path: &Path) -> [PathBuf; 2] {
    let mut wal = path.as_os_str().to_owned();
    wal.push("-wal");
    let mut shm = path.as_os_str().to_owned();
    shm.push("-shm");
    [PathBuf::from(wal), PathBuf::from(shm)]
}
