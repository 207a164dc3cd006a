//! Watched TV show repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;

use super::sqlite_helpers::{datetime_to_str, decode_err, str_to_datetime};
use crate::fetch::WatchTarget;

#[derive(Debug, Clone)]
pub struct WatchTvShowRecord {
    pub id: i64,
    pub tmdb_show_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl WatchTvShowRecord {
    /// Fetch a whole season of this show as one transfer
    pub fn season_target(&self, season_number: u32) -> WatchTarget {
        WatchTarget::Season {
            watch_show_id: self.id,
            tmdb_show_id: self.tmdb_show_id,
            season_number,
        }
    }
}

impl sqlx::FromRow<'_, SqliteRow> for WatchTvShowRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let created_at: String = row.try_get("created_at")?;

        Ok(Self {
            id: row.try_get("id")?,
            tmdb_show_id: row.try_get("tmdb_show_id")?,
            name: row.try_get("name")?,
            created_at: str_to_datetime(&created_at).map_err(decode_err)?,
        })
    }
}

#[derive(Debug)]
pub struct CreateWatchTvShow {
    pub tmdb_show_id: i64,
    pub name: String,
}

pub struct TvShowRepository {
    pool: SqlitePool,
}

impl TvShowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateWatchTvShow) -> Result<WatchTvShowRecord> {
        let record = sqlx::query_as::<_, WatchTvShowRecord>(
            r#"
            INSERT INTO watch_tv_show (tmdb_show_id, name, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING *
            "#,
        )
        .bind(input.tmdb_show_id)
        .bind(&input.name)
        .bind(datetime_to_str(Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<WatchTvShowRecord>> {
        let record =
            sqlx::query_as::<_, WatchTvShowRecord>("SELECT * FROM watch_tv_show WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }
}
