//! Run metadata repository

use sqlx::{Executor, Sqlite, SqliteConnection};
use std::collections::BTreeMap;

/// Repository for the `run_meta` key/value table
pub struct MetaRepository;

impl MetaRepository {
    /// Create or overwrite a metadata entry
    pub async fn set(conn: &mut SqliteConnection, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO run_meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Insert a metadata entry only if the key is absent
    pub async fn set_if_absent(
        conn: &mut SqliteConnection,
        key: &str,
        value: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("INSERT OR IGNORE INTO run_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a metadata value by key
    pub async fn get<'e, E>(executor: E, key: &str) -> Result<Option<String>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM run_meta WHERE key = ?")
                .bind(key)
                .fetch_optional(executor)
                .await?;
        Ok(value.flatten())
    }

    /// Get every metadata entry
    pub async fn list<'e, E>(executor: E) -> Result<BTreeMap<String, String>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT key, value FROM run_meta ORDER BY key ASC")
                .fetch_all(executor)
                .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }
}
