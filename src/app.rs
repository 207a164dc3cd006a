//! Wiring of the concrete collaborators behind one handle

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::fetch::{
    DownloadClient, DownloadDirs, FetchContext, FetchReport, FetchSettings, Indexer, LinkTracer,
    MetadataProvider, WatchTarget, fetch,
};
use crate::indexer::{HttpLinkTracer, JackettConfig, JackettIndexer};
use crate::services::{
    RateLimitedClient, TmdbClient, TmdbConfig, TorrentService, TorrentServiceConfig,
};

const TRACE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AppServices {
    pub db: Database,
    pub metadata: Arc<dyn MetadataProvider>,
    pub indexer: Arc<dyn Indexer>,
    pub tracer: Arc<dyn LinkTracer>,
    pub downloads: Arc<dyn DownloadClient>,
    pub settings: FetchSettings,
    torrent: Option<Arc<TorrentService>>,
}

impl AppServices {
    /// Assemble from already built collaborators
    pub fn new(
        db: Database,
        metadata: Arc<dyn MetadataProvider>,
        indexer: Arc<dyn Indexer>,
        tracer: Arc<dyn LinkTracer>,
        downloads: Arc<dyn DownloadClient>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            db,
            metadata,
            indexer,
            tracer,
            downloads,
            settings,
            torrent: None,
        }
    }

    /// Connect the database and start every external collaborator
    pub async fn build(config: &Config) -> Result<Self> {
        let db = Database::connect(&config.database_url).await?;

        let tmdb = TmdbClient::new(
            Arc::new(RateLimitedClient::for_tmdb()?),
            TmdbConfig {
                base_url: config.tmdb_base_url.clone(),
                api_key: config.tmdb_api_key.clone(),
                language: config.tmdb_language.clone(),
            },
        );

        let jackett = JackettIndexer::new(
            RateLimitedClient::for_indexer()?,
            JackettConfig {
                base_url: config.jackett_url.clone(),
                api_key: config.jackett_api_key.clone(),
            },
        );

        let tracer = HttpLinkTracer::new(TRACE_TIMEOUT, config.redirect_max_hops)?;

        let torrent = Arc::new(
            TorrentService::start(TorrentServiceConfig {
                download_dir: config.downloads_path.clone(),
                session_dir: config.session_path.clone(),
                enable_dht: config.torrent_enable_dht,
                listen_port: config.torrent_listen_port,
                add_timeout: config.torrent_add_timeout,
            })
            .await
            .context("Failed to start torrent client")?,
        );

        let settings = FetchSettings {
            host_rewrite: config.jackett_host_rewrite.clone(),
            download_dirs: DownloadDirs {
                movie_subdir: config.movie_download_dir.clone(),
                tv_subdir: config.tv_download_dir.clone(),
            },
            resolve_concurrency: config.resolve_concurrency,
        };

        let mut app = Self::new(
            db,
            Arc::new(tmdb),
            Arc::new(jackett),
            Arc::new(tracer),
            torrent.clone(),
            settings,
        );
        app.torrent = Some(torrent);

        info!("Services ready");
        Ok(app)
    }

    pub async fn fetch(&self, target: &WatchTarget) -> FetchReport {
        let ctx = FetchContext {
            metadata: self.metadata.as_ref(),
            indexer: self.indexer.as_ref(),
            tracer: self.tracer.as_ref(),
            downloads: self.downloads.as_ref(),
            blacklist: &self.db,
            sink: &self.db,
            settings: &self.settings,
        };
        fetch(ctx, target).await
    }

    /// Stamp the attempt time on the watch record(s) behind `target`
    pub async fn mark_attempted(&self, target: &WatchTarget) -> Result<()> {
        match target {
            WatchTarget::Movie { watch_movie_id, .. } => {
                self.db.movies().mark_attempted(*watch_movie_id).await
            }
            WatchTarget::Episode {
                watch_episode_id, ..
            } => self.db.episodes().mark_attempted(*watch_episode_id).await,
            WatchTarget::Season {
                watch_show_id,
                season_number,
                ..
            } => {
                let episodes = self
                    .db
                    .episodes()
                    .list_for_season(*watch_show_id, *season_number)
                    .await?;
                for episode in episodes {
                    self.db.episodes().mark_attempted(episode.id).await?;
                }
                Ok(())
            }
        }
    }

    pub async fn movie_target(&self, watch_movie_id: i64) -> Result<WatchTarget> {
        let movie = self
            .db
            .movies()
            .get_by_id(watch_movie_id)
            .await?
            .with_context(|| format!("No watched movie with id {}", watch_movie_id))?;
        Ok(movie.target())
    }

    pub async fn episode_target(&self, watch_episode_id: i64) -> Result<WatchTarget> {
        let episode = self
            .db
            .episodes()
            .get_by_id(watch_episode_id)
            .await?
            .with_context(|| format!("No watched episode with id {}", watch_episode_id))?;
        Ok(episode.target())
    }

    pub async fn season_target(&self, watch_show_id: i64, season_number: u32) -> Result<WatchTarget> {
        let show = self
            .db
            .tv_shows()
            .get_by_id(watch_show_id)
            .await?
            .with_context(|| format!("No watched show with id {}", watch_show_id))?;
        Ok(show.season_target(season_number))
    }

    pub async fn shutdown(&self) {
        if let Some(torrent) = &self.torrent {
            torrent.stop().await;
        }
        self.db.close().await;
    }
}
