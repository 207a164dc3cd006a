//! Database connection and repositories

pub mod blacklist;
pub mod episodes;
pub mod movies;
pub mod schema;
pub mod sqlite_helpers;
pub mod tv_shows;

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

pub use blacklist::{BlacklistRecord, BlacklistRepository};
pub use episodes::{CreateWatchTvEpisode, EpisodeRepository, WatchTvEpisodeRecord};
pub use movies::{CreateWatchMovie, MovieRepository, WatchMovieRecord};
pub use tv_shows::{CreateWatchTvShow, TvShowRepository, WatchTvShowRecord};

use crate::fetch::{BlacklistStore, Transfer, TransferSink, WatchTarget};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect, creating the database file and its schema when missing
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL '{}'", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let memory = is_memory_url(url);
        if !memory {
            if let Some(parent) = options.get_filename().parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // Every connection to an in-memory database is a separate database
        let max_connections = if memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        schema::sync_schema(&pool).await?;
        info!(url = %url, "Database ready");

        Ok(Self { pool })
    }

    /// Connect to a database file path
    pub async fn open(path: &Path) -> Result<Self> {
        Self::connect(&format!("sqlite:{}", path.display())).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn movies(&self) -> MovieRepository {
        MovieRepository::new(self.pool.clone())
    }

    pub fn tv_shows(&self) -> TvShowRepository {
        TvShowRepository::new(self.pool.clone())
    }

    pub fn episodes(&self) -> EpisodeRepository {
        EpisodeRepository::new(self.pool.clone())
    }

    pub fn blacklist(&self) -> BlacklistRepository {
        BlacklistRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl BlacklistStore for Database {
    async fn is_blacklisted(&self, hash: &str) -> Result<bool> {
        self.blacklist().contains(hash).await
    }
}

#[async_trait]
impl TransferSink for Database {
    async fn commit(&self, target: &WatchTarget, transfer: &Transfer) -> Result<()> {
        let updated = match target {
            WatchTarget::Movie { watch_movie_id, .. } => {
                self.movies().set_transfer(*watch_movie_id, transfer).await?
            }
            WatchTarget::Episode {
                watch_episode_id, ..
            } => {
                self.episodes()
                    .set_transfer(*watch_episode_id, transfer)
                    .await?
            }
            WatchTarget::Season {
                watch_show_id,
                season_number,
                ..
            } => {
                self.episodes()
                    .set_transfer_for_season(*watch_show_id, *season_number, transfer)
                    .await?
            }
        };

        if updated == 0 {
            bail!("No watch record to attach the transfer to for {}", target);
        }

        info!(watch = %target, hash = %transfer.hash, records = updated, "Saved torrent details");
        Ok(())
    }
}
