//! Metric series and point repository

use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};

/// A point joined with the path of its series
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PointRow {
    pub path: String,
    pub step: i64,
    pub y: f64,
    pub ts: i64,
}

/// Repository for the `metric_series` and `metric_points` tables
pub struct MetricRepository;

impl MetricRepository {
    /// Resolve the id of a series, registering the path on first use
    pub async fn ensure_series(conn: &mut SqliteConnection, path: &str) -> Result<i64, sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO metric_series (path) VALUES (?)")
            .bind(path)
            .execute(&mut *conn)
            .await?;

        sqlx::query_scalar("SELECT id FROM metric_series WHERE path = ?")
            .bind(path)
            .fetch_one(&mut *conn)
            .await
    }

    /// Create or overwrite the point at `(series_id, step)`
    pub async fn upsert_point(
        conn: &mut SqliteConnection,
        series_id: i64,
        step: i64,
        y: f64,
        ts: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO metric_points (series_id, step, y, ts) VALUES (?, ?, ?, ?)
             ON CONFLICT(series_id, step) DO UPDATE SET y = excluded.y, ts = excluded.ts",
        )
        .bind(series_id)
        .bind(step)
        .bind(y)
        .bind(ts)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Paths of all series holding at least one point, ordered by path
    pub async fn list_paths<'e, E>(executor: E) -> Result<Vec<String>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar(
            "SELECT s.path FROM metric_series s
             WHERE EXISTS (SELECT 1 FROM metric_points p WHERE p.series_id = s.id)
             ORDER BY s.path ASC",
        )
        .fetch_all(executor)
        .await
    }

    /// Points of one series within `[min_step, max_step]`, ordered by step
    pub async fn list_points<'e, E>(
        executor: E,
        path: &str,
        min_step: i64,
        max_step: i64,
    ) -> Result<Vec<PointRow>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, PointRow>(
            "SELECT s.path, p.step, p.y, p.ts
             FROM metric_points p
             JOIN metric_series s ON p.series_id = s.id
             WHERE s.path = ? AND p.step BETWEEN ? AND ?
             ORDER BY p.step ASC",
        )
        .bind(path)
        .bind(min_step)
        .bind(max_step)
        .fetch_all(executor)
        .await
    }

    /// Points of every series within `[min_step, max_step]`, ordered by
    /// path then step
    pub async fn list_all_points<'e, E>(
        executor: E,
        min_step: i64,
        max_step: i64,
    ) -> Result<Vec<PointRow>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, PointRow>(
            "SELECT s.path, p.step, p.y, p.ts
             FROM metric_points p
             JOIN metric_series s ON p.series_id = s.id
             WHERE p.step BETWEEN ? AND ?
             ORDER BY s.path ASC, p.step ASC",
        )
        .bind(min_step)
        .bind(max_step)
        .fetch_all(executor)
        .await
    }
}
