//! Watched movie repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;

use super::sqlite_helpers::{datetime_to_str, decode_err, int_to_bool, str_to_datetime, str_to_datetime_opt};
use crate::fetch::{Transfer, WatchTarget};

#[derive(Debug, Clone)]
pub struct WatchMovieRecord {
    pub id: i64,
    pub tmdb_movie_id: i64,
    pub name: String,
    pub transfer_id: Option<i64>,
    pub transfer_hash: Option<String>,
    pub collected: bool,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WatchMovieRecord {
    pub fn target(&self) -> WatchTarget {
        WatchTarget::Movie {
            watch_movie_id: self.id,
            tmdb_movie_id: self.tmdb_movie_id,
        }
    }
}

impl sqlx::FromRow<'_, SqliteRow> for WatchMovieRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let last_attempt_at: Option<String> = row.try_get("last_attempt_at")?;
        let created_at: String = row.try_get("created_at")?;
        let collected: i64 = row.try_get("collected")?;

        Ok(Self {
            id: row.try_get("id")?,
            tmdb_movie_id: row.try_get("tmdb_movie_id")?,
            name: row.try_get("name")?,
            transfer_id: row.try_get("transfer_id")?,
            transfer_hash: row.try_get("transfer_hash")?,
            collected: int_to_bool(collected),
            last_attempt_at: str_to_datetime_opt(last_attempt_at.as_deref()).map_err(decode_err)?,
            created_at: str_to_datetime(&created_at).map_err(decode_err)?,
        })
    }
}

#[derive(Debug)]
pub struct CreateWatchMovie {
    pub tmdb_movie_id: i64,
    pub name: String,
}

pub struct MovieRepository {
    pool: SqlitePool,
}

impl MovieRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateWatchMovie) -> Result<WatchMovieRecord> {
        let record = sqlx::query_as::<_, WatchMovieRecord>(
            r#"
            INSERT INTO watch_movie (tmdb_movie_id, name, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING *
            "#,
        )
        .bind(input.tmdb_movie_id)
        .bind(&input.name)
        .bind(datetime_to_str(Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<WatchMovieRecord>> {
        let record = sqlx::query_as::<_, WatchMovieRecord>("SELECT * FROM watch_movie WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Movies without a transfer that have not been collected yet
    pub async fn list_wanted(&self) -> Result<Vec<WatchMovieRecord>> {
        let records = sqlx::query_as::<_, WatchMovieRecord>(
            r#"
            SELECT * FROM watch_movie
            WHERE transfer_hash IS NULL AND collected = 0
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Returns the number of records updated
    pub async fn set_transfer(&self, id: i64, transfer: &Transfer) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE watch_movie SET transfer_id = ?1, transfer_hash = ?2 WHERE id = ?3",
        )
        .bind(transfer.id as i64)
        .bind(transfer.hash.to_lowercase())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_attempted(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE watch_movie SET last_attempt_at = ?1 WHERE id = ?2")
            .bind(datetime_to_str(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
