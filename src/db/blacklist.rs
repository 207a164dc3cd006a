//! Blacklisted torrent hashes
//!
//! Hashes are stored lowercase; lookups are case-insensitive on input.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;

use super::sqlite_helpers::{datetime_to_str, decode_err, str_to_datetime};

#[derive(Debug, Clone)]
pub struct BlacklistRecord {
    pub id: i64,
    pub hash: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, SqliteRow> for BlacklistRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let created_at: String = row.try_get("created_at")?;

        Ok(Self {
            id: row.try_get("id")?,
            hash: row.try_get("hash")?,
            name: row.try_get("name")?,
            created_at: str_to_datetime(&created_at).map_err(decode_err)?,
        })
    }
}

pub struct BlacklistRepository {
    pool: SqlitePool,
}

impl BlacklistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns false when the hash was already blacklisted
    pub async fn add(&self, hash: &str, name: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO torrent_blacklist (hash, name, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(hash.trim().to_lowercase())
        .bind(name)
        .bind(datetime_to_str(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn contains(&self, hash: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM torrent_blacklist WHERE hash = ?1")
            .bind(hash.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    pub async fn list(&self) -> Result<Vec<BlacklistRecord>> {
        let records =
            sqlx::query_as::<_, BlacklistRecord>("SELECT * FROM torrent_blacklist ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(records)
    }
}
