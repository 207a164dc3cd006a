//! Wanted sweep: run a fetch attempt for every watch record without a transfer
//!
//! At most one attempt per target is in flight at any time, across sweeps
//! and on-demand fetches alike.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::app::AppServices;
use crate::fetch::{FetchReport, WatchTarget};

/// Targets with an attempt currently running
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    targets: Arc<Mutex<HashSet<WatchTarget>>>,
}

/// Two attempts that would commit to the same watch record
fn overlaps(a: &WatchTarget, b: &WatchTarget) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (season @ WatchTarget::Season { .. }, other)
        | (other, season @ WatchTarget::Season { .. }) => season_of(season) == season_of(other),
        _ => false,
    }
}

fn season_of(target: &WatchTarget) -> Option<(i64, u32)> {
    match target {
        WatchTarget::Movie { .. } => None,
        WatchTarget::Episode {
            tmdb_show_id,
            season_number,
            ..
        }
        | WatchTarget::Season {
            tmdb_show_id,
            season_number,
            ..
        } => Some((*tmdb_show_id, *season_number)),
    }
}

impl InFlight {
    /// Claim `target`, or `None` when an overlapping attempt is already running
    ///
    /// A season overlaps every episode of that season.
    pub fn try_claim(&self, target: &WatchTarget) -> Option<InFlightGuard> {
        let mut targets = self.targets.lock();
        if targets.iter().any(|running| overlaps(running, target)) {
            return None;
        }
        targets.insert(target.clone());
        Some(InFlightGuard {
            registry: self.clone(),
            target: target.clone(),
        })
    }

    pub fn contains(&self, target: &WatchTarget) -> bool {
        self.targets.lock().contains(target)
    }

    pub fn is_empty(&self) -> bool {
        self.targets.lock().is_empty()
    }
}

/// Releases the claim when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlight,
    target: WatchTarget,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.targets.lock().remove(&self.target);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub wanted: usize,
    pub acquired: usize,
    pub not_acquired: usize,
    /// Already being fetched elsewhere
    pub skipped: usize,
    /// Tasks that panicked or were cancelled
    pub errors: usize,
    /// Discarded transfers the download client refused to remove
    pub orphaned: usize,
}

/// One attempt for `target`, unless one is already running
pub async fn fetch_target(
    app: &AppServices,
    in_flight: &InFlight,
    target: &WatchTarget,
) -> Option<FetchReport> {
    let Some(_guard) = in_flight.try_claim(target) else {
        debug!(watch = %target, "Fetch already in progress, skipping");
        return None;
    };

    if let Err(e) = app.mark_attempted(target).await {
        warn!(watch = %target, error = %e, "Failed to record attempt time");
    }

    Some(app.fetch(target).await)
}

async fn wanted_targets(app: &AppServices) -> Result<Vec<WatchTarget>> {
    let movies = app.db.movies().list_wanted().await?;
    let episodes = app.db.episodes().list_wanted().await?;

    Ok(movies
        .iter()
        .map(|m| m.target())
        .chain(episodes.iter().map(|e| e.target()))
        .collect())
}

pub async fn run_sweep(
    app: Arc<AppServices>,
    in_flight: InFlight,
    max_concurrent: usize,
) -> Result<SweepSummary> {
    let targets = wanted_targets(&app).await?;
    let mut summary = SweepSummary {
        wanted: targets.len(),
        ..Default::default()
    };

    if targets.is_empty() {
        debug!("Nothing wanted");
        return Ok(summary);
    }

    info!(wanted = targets.len(), max_concurrent, "Starting fetch sweep");

    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    for target in targets {
        let permit = semaphore.clone().acquire_owned().await?;
        let app = app.clone();
        let in_flight = in_flight.clone();
        tasks.spawn(async move {
            let _permit = permit;
            fetch_target(&app, &in_flight, &target).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(report)) => {
                summary.orphaned += report.orphaned.len();
                if report.acquired {
                    summary.acquired += 1;
                } else {
                    summary.not_acquired += 1;
                }
            }
            Ok(None) => summary.skipped += 1,
            Err(e) => {
                error!(error = %e, "Fetch task failed");
                summary.errors += 1;
            }
        }
    }

    info!(
        job = "auto_fetch",
        wanted = summary.wanted,
        acquired = summary.acquired,
        not_acquired = summary.not_acquired,
        skipped = summary.skipped,
        errors = summary.errors,
        orphaned = summary.orphaned,
        "Fetch sweep finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{CreateWatchMovie, CreateWatchTvEpisode, CreateWatchTvShow, Database};
    use crate::fetch::{
        CanonicalMedia, DownloadClient, FetchSettings, Indexer, LinkTracer, MediaKind,
        MetadataError, MetadataProvider, RawSearchResult, ResolutionError, SearchOutcome,
        Transfer, TransferError,
    };

    struct StaticMetadata;

    #[async_trait]
    impl MetadataProvider for StaticMetadata {
        async fn movie(&self, _id: i64) -> Result<CanonicalMedia, MetadataError> {
            Ok(CanonicalMedia::titled("Alpha"))
        }

        async fn show(&self, _id: i64) -> Result<CanonicalMedia, MetadataError> {
            Ok(CanonicalMedia::titled("Show"))
        }

        async fn episode(
            &self,
            _id: i64,
            season: u32,
            episode: u32,
        ) -> Result<CanonicalMedia, MetadataError> {
            Ok(CanonicalMedia {
                title: "Show".to_string(),
                season_number: Some(season),
                episode_number: Some(episode),
            })
        }
    }

    /// Only movies have releases
    struct MovieOnlyIndexer;

    #[async_trait]
    impl Indexer for MovieOnlyIndexer {
        async fn search(&self, kind: MediaKind, _query: &str) -> SearchOutcome {
            match kind {
                MediaKind::Movie => SearchOutcome::ok(vec![RawSearchResult {
                    title: "Alpha.2020.1080p".to_string(),
                    seeders: 5,
                    link: String::new(),
                    magnet_uri: Some("magnet:?xt=urn:btih:aaaa".to_string()),
                }]),
                MediaKind::Tv => SearchOutcome::ok(Vec::new()),
            }
        }
    }

    struct NoTrace;

    #[async_trait]
    impl LinkTracer for NoTrace {
        async fn trace(&self, url: &str) -> Result<String, ResolutionError> {
            Err(ResolutionError::InvalidUrl(url.to_string()))
        }
    }

    struct AcceptingClient;

    #[async_trait]
    impl DownloadClient for AcceptingClient {
        fn base_download_dir(&self) -> PathBuf {
            PathBuf::from("/downloads")
        }

        async fn add_transfer(
            &self,
            _locator: &str,
            _download_dir: &Path,
            _start_paused: bool,
        ) -> Result<Transfer, TransferError> {
            Ok(Transfer::added(1, "aaaa"))
        }

        async fn start(&self, _transfer: &Transfer) -> Result<(), TransferError> {
            Ok(())
        }

        async fn remove(&self, _transfer: &Transfer) -> Result<(), TransferError> {
            Ok(())
        }
    }

    async fn app() -> Arc<AppServices> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Arc::new(AppServices::new(
            db,
            Arc::new(StaticMetadata),
            Arc::new(MovieOnlyIndexer),
            Arc::new(NoTrace),
            Arc::new(AcceptingClient),
            FetchSettings::default(),
        ))
    }

    #[test]
    fn test_in_flight_claim_is_exclusive() {
        let in_flight = InFlight::default();
        let target = WatchTarget::Movie {
            watch_movie_id: 1,
            tmdb_movie_id: 2,
        };

        let guard = in_flight.try_claim(&target).unwrap();
        assert!(in_flight.try_claim(&target).is_none());
        assert!(in_flight.contains(&target));

        drop(guard);
        assert!(in_flight.is_empty());
        assert!(in_flight.try_claim(&target).is_some());
    }

    #[test]
    fn test_season_claim_blocks_its_episodes() {
        let in_flight = InFlight::default();
        let episode = |watch_episode_id, season_number| WatchTarget::Episode {
            watch_episode_id,
            tmdb_show_id: 1399,
            season_number,
            episode_number: 3,
        };
        let season = WatchTarget::Season {
            watch_show_id: 1,
            tmdb_show_id: 1399,
            season_number: 1,
        };

        let first = in_flight.try_claim(&episode(10, 1)).unwrap();
        let second = in_flight.try_claim(&episode(11, 1)).unwrap();
        assert!(in_flight.try_claim(&season).is_none());

        drop(first);
        drop(second);
        let _season = in_flight.try_claim(&season).unwrap();
        assert!(in_flight.try_claim(&episode(12, 1)).is_none());
        assert!(in_flight.try_claim(&episode(13, 2)).is_some());
    }

    #[tokio::test]
    async fn test_claimed_target_is_skipped() {
        let app = app().await;
        let in_flight = InFlight::default();
        let target = WatchTarget::Movie {
            watch_movie_id: 1,
            tmdb_movie_id: 2,
        };

        let _guard = in_flight.try_claim(&target).unwrap();
        assert!(fetch_target(&app, &in_flight, &target).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_fetches_wanted_records() {
        let app = app().await;
        let movie = app
            .db
            .movies()
            .create(CreateWatchMovie {
                tmdb_movie_id: 10,
                name: "Alpha".to_string(),
            })
            .await
            .unwrap();
        let show = app
            .db
            .tv_shows()
            .create(CreateWatchTvShow {
                tmdb_show_id: 20,
                name: "Show".to_string(),
            })
            .await
            .unwrap();
        let episode = app
            .db
            .episodes()
            .create(CreateWatchTvEpisode {
                watch_tv_show_id: show.id,
                season_number: 1,
                episode_number: 1,
            })
            .await
            .unwrap();

        let in_flight = InFlight::default();
        let summary = run_sweep(app.clone(), in_flight.clone(), 2).await.unwrap();

        assert_eq!(
            summary,
            SweepSummary {
                wanted: 2,
                acquired: 1,
                not_acquired: 1,
                skipped: 0,
                errors: 0,
                orphaned: 0,
            }
        );
        assert!(in_flight.is_empty());

        let movie = app.db.movies().get_by_id(movie.id).await.unwrap().unwrap();
        assert_eq!(movie.transfer_hash.as_deref(), Some("aaaa"));
        assert!(movie.last_attempt_at.is_some());

        let episode = app.db.episodes().get_by_id(episode.id).await.unwrap().unwrap();
        assert_eq!(episode.transfer_hash, None);
        assert!(episode.last_attempt_at.is_some());

        // Acquired records are no longer wanted
        let again = run_sweep(app, in_flight, 2).await.unwrap();
        assert_eq!(again.wanted, 1);
    }
}
