//! Config entry repository

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};

/// Raw config row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConfigRow {
    /// Hierarchical path, e.g. `model/hidden`
    pub path: String,

    /// One of `bool`, `int`, `float`, `str`, `datetime`, `null`
    pub type_tag: String,

    /// Canonical text form
    pub value: Option<String>,

    /// Last write time (RFC 3339)
    pub updated_at: String,
}

/// Repository for the `configs` table
pub struct ConfigRepository;

impl ConfigRepository {
    /// Create or overwrite the entry at `path`
    pub async fn upsert(
        conn: &mut SqliteConnection,
        path: &str,
        type_tag: &str,
        value: &str,
        updated_at: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO configs (path, type_tag, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                type_tag = excluded.type_tag,
                value = excluded.value,
                updated_at = excluded.updated_at",
        )
        .bind(path)
        .bind(type_tag)
        .bind(value)
        .bind(updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Get all entries ordered by path
    pub async fn list<'e, E>(executor: E) -> Result<Vec<ConfigRow>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ConfigRow>(
            "SELECT path, type_tag, value, updated_at FROM configs ORDER BY path ASC",
        )
        .fetch_all(executor)
        .await
    }
}
