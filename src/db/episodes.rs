//! Watched episode repository
//!
//! Episode rows are always read joined with their show so a record carries
//! the provider id needed for metadata lookups.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;

use super::sqlite_helpers::{datetime_to_str, decode_err, int_to_bool, str_to_datetime, str_to_datetime_opt};
use crate::fetch::{Transfer, WatchTarget};

const SELECT_EPISODE: &str = r#"
    SELECT e.*, s.tmdb_show_id
    FROM watch_tv_episode e
    JOIN watch_tv_show s ON s.id = e.watch_tv_show_id
"#;

#[derive(Debug, Clone)]
pub struct WatchTvEpisodeRecord {
    pub id: i64,
    pub watch_tv_show_id: i64,
    pub tmdb_show_id: i64,
    pub season_number: u32,
    pub episode_number: u32,
    pub transfer_id: Option<i64>,
    pub transfer_hash: Option<String>,
    pub collected: bool,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WatchTvEpisodeRecord {
    pub fn target(&self) -> WatchTarget {
        WatchTarget::Episode {
            watch_episode_id: self.id,
            tmdb_show_id: self.tmdb_show_id,
            season_number: self.season_number,
            episode_number: self.episode_number,
        }
    }
}

impl sqlx::FromRow<'_, SqliteRow> for WatchTvEpisodeRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let last_attempt_at: Option<String> = row.try_get("last_attempt_at")?;
        let created_at: String = row.try_get("created_at")?;
        let collected: i64 = row.try_get("collected")?;
        let season_number: i64 = row.try_get("season_number")?;
        let episode_number: i64 = row.try_get("episode_number")?;

        Ok(Self {
            id: row.try_get("id")?,
            watch_tv_show_id: row.try_get("watch_tv_show_id")?,
            tmdb_show_id: row.try_get("tmdb_show_id")?,
            season_number: u32::try_from(season_number).map_err(|e| sqlx::Error::Decode(e.into()))?,
            episode_number: u32::try_from(episode_number)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
            transfer_id: row.try_get("transfer_id")?,
            transfer_hash: row.try_get("transfer_hash")?,
            collected: int_to_bool(collected),
            last_attempt_at: str_to_datetime_opt(last_attempt_at.as_deref()).map_err(decode_err)?,
            created_at: str_to_datetime(&created_at).map_err(decode_err)?,
        })
    }
}

#[derive(Debug)]
pub struct CreateWatchTvEpisode {
    pub watch_tv_show_id: i64,
    pub season_number: u32,
    pub episode_number: u32,
}

pub struct EpisodeRepository {
    pool: SqlitePool,
}

impl EpisodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateWatchTvEpisode) -> Result<WatchTvEpisodeRecord> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO watch_tv_episode (watch_tv_show_id, season_number, episode_number, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(input.watch_tv_show_id)
        .bind(input.season_number)
        .bind(input.episode_number)
        .bind(datetime_to_str(Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Episode {} vanished after insert", id))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<WatchTvEpisodeRecord>> {
        let record = sqlx::query_as::<_, WatchTvEpisodeRecord>(&format!(
            "{} WHERE e.id = ?1",
            SELECT_EPISODE
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn list_for_season(
        &self,
        watch_tv_show_id: i64,
        season_number: u32,
    ) -> Result<Vec<WatchTvEpisodeRecord>> {
        let records = sqlx::query_as::<_, WatchTvEpisodeRecord>(&format!(
            "{} WHERE e.watch_tv_show_id = ?1 AND e.season_number = ?2 ORDER BY e.episode_number",
            SELECT_EPISODE
        ))
        .bind(watch_tv_show_id)
        .bind(season_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Episodes without a transfer that have not been collected yet
    pub async fn list_wanted(&self) -> Result<Vec<WatchTvEpisodeRecord>> {
        let records = sqlx::query_as::<_, WatchTvEpisodeRecord>(&format!(
            "{} WHERE e.transfer_hash IS NULL AND e.collected = 0 ORDER BY e.id",
            SELECT_EPISODE
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn set_transfer(&self, id: i64, transfer: &Transfer) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE watch_tv_episode SET transfer_id = ?1, transfer_hash = ?2 WHERE id = ?3",
        )
        .bind(transfer.id as i64)
        .bind(transfer.hash.to_lowercase())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Point every episode of a season at the same transfer, in one statement
    pub async fn set_transfer_for_season(
        &self,
        watch_tv_show_id: i64,
        season_number: u32,
        transfer: &Transfer,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE watch_tv_episode SET transfer_id = ?1, transfer_hash = ?2
            WHERE watch_tv_show_id = ?3 AND season_number = ?4
            "#,
        )
        .bind(transfer.id as i64)
        .bind(transfer.hash.to_lowercase())
        .bind(watch_tv_show_id)
        .bind(season_number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_attempted(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE watch_tv_episode SET last_attempt_at = ?1 WHERE id = ?2")
            .bind(datetime_to_str(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
