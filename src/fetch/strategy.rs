//! Media-kind specific pieces of a fetch attempt
//!
//! | Target  | Canonical title       | Match inputs            | Folder | Commit                 |
//! |---------|-----------------------|-------------------------|--------|------------------------|
//! | Movie   | movie lookup          | title                   | movie  | movie record           |
//! | Episode | episode lookup        | title, season, episode  | tv     | episode record         |
//! | Season  | show lookup           | title, season           | tv     | every episode of season|

use std::path::{Path, PathBuf};

use super::traits::{MetadataError, MetadataProvider};
use super::types::{CanonicalMedia, MediaKind, WatchTarget};
use crate::services::filename_parser::{MovieRelease, TvRelease};

/// Per-kind download subdirectories, relative to the client's base directory
#[derive(Debug, Clone)]
pub struct DownloadDirs {
    pub movie_subdir: String,
    pub tv_subdir: String,
}

impl Default for DownloadDirs {
    fn default() -> Self {
        Self {
            movie_subdir: "movies".to_string(),
            tv_subdir: "tv".to_string(),
        }
    }
}

impl WatchTarget {
    pub fn kind(&self) -> MediaKind {
        match self {
            WatchTarget::Movie { .. } => MediaKind::Movie,
            WatchTarget::Episode { .. } | WatchTarget::Season { .. } => MediaKind::Tv,
        }
    }

    /// Look up the canonical metadata the candidates are matched against
    pub async fn canonical_media(
        &self,
        metadata: &dyn MetadataProvider,
    ) -> Result<CanonicalMedia, MetadataError> {
        match self {
            WatchTarget::Movie { tmdb_movie_id, .. } => metadata.movie(*tmdb_movie_id).await,
            WatchTarget::Episode {
                tmdb_show_id,
                season_number,
                episode_number,
                ..
            } => {
                let mut media = metadata
                    .episode(*tmdb_show_id, *season_number, *episode_number)
                    .await?;
                media.season_number.get_or_insert(*season_number);
                media.episode_number.get_or_insert(*episode_number);
                Ok(media)
            }
            WatchTarget::Season {
                tmdb_show_id,
                season_number,
                ..
            } => {
                let show = metadata.show(*tmdb_show_id).await?;
                Ok(CanonicalMedia {
                    title: show.title,
                    season_number: Some(*season_number),
                    episode_number: None,
                })
            }
        }
    }

    /// The free-text indexer query
    ///
    /// Episode releases are named after the show, so episodes search by the
    /// parent show's title rather than their own.
    pub async fn search_query(
        &self,
        metadata: &dyn MetadataProvider,
        canonical: &CanonicalMedia,
    ) -> Result<String, MetadataError> {
        match self {
            WatchTarget::Episode { tmdb_show_id, .. } => {
                Ok(metadata.show(*tmdb_show_id).await?.title)
            }
            WatchTarget::Movie { .. } | WatchTarget::Season { .. } => Ok(canonical.title.clone()),
        }
    }

    /// Whether a release title is this target
    pub fn matches(&self, release_title: &str, canonical: &CanonicalMedia) -> bool {
        match self {
            WatchTarget::Movie { .. } => MovieRelease::parse(release_title).is_match(&canonical.title),
            WatchTarget::Episode {
                season_number,
                episode_number,
                ..
            } => TvRelease::parse(release_title).is_match(
                &canonical.title,
                canonical.season_number.unwrap_or(*season_number),
                Some(canonical.episode_number.unwrap_or(*episode_number)),
            ),
            WatchTarget::Season { season_number, .. } => TvRelease::parse(release_title)
                .is_match(
                    &canonical.title,
                    canonical.season_number.unwrap_or(*season_number),
                    None,
                ),
        }
    }

    pub fn download_dir(&self, base: &Path, dirs: &DownloadDirs) -> PathBuf {
        let subdir = match self.kind() {
            MediaKind::Movie => &dirs.movie_subdir,
            MediaKind::Tv => &dirs.tv_subdir,
        };
        base.join(subdir.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingMetadata {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MetadataProvider for RecordingMetadata {
        async fn movie(&self, id: i64) -> Result<CanonicalMedia, MetadataError> {
            self.calls.lock().push(format!("movie:{}", id));
            Ok(CanonicalMedia::titled("Alpha"))
        }

        async fn show(&self, id: i64) -> Result<CanonicalMedia, MetadataError> {
            self.calls.lock().push(format!("show:{}", id));
            Ok(CanonicalMedia::titled("Show"))
        }

        async fn episode(
            &self,
            id: i64,
            season: u32,
            episode: u32,
        ) -> Result<CanonicalMedia, MetadataError> {
            self.calls
                .lock()
                .push(format!("episode:{}:{}:{}", id, season, episode));
            Ok(CanonicalMedia {
                title: "Pilot".to_string(),
                season_number: Some(season),
                episode_number: Some(episode),
            })
        }
    }

    fn episode_target() -> WatchTarget {
        WatchTarget::Episode {
            watch_episode_id: 3,
            tmdb_show_id: 42,
            season_number: 1,
            episode_number: 2,
        }
    }

    #[tokio::test]
    async fn test_episode_searches_by_show_title() {
        let metadata = RecordingMetadata::default();
        let target = episode_target();

        let canonical = target.canonical_media(&metadata).await.unwrap();
        let query = target.search_query(&metadata, &canonical).await.unwrap();

        assert_eq!(canonical.title, "Pilot");
        assert_eq!(query, "Show");
        assert_eq!(
            *metadata.calls.lock(),
            vec!["episode:42:1:2".to_string(), "show:42".to_string()]
        );
    }

    #[tokio::test]
    async fn test_season_canonical_carries_season() {
        let metadata = RecordingMetadata::default();
        let target = WatchTarget::Season {
            watch_show_id: 9,
            tmdb_show_id: 42,
            season_number: 4,
        };

        let canonical = target.canonical_media(&metadata).await.unwrap();
        let query = target.search_query(&metadata, &canonical).await.unwrap();

        assert_eq!(canonical.season_number, Some(4));
        assert_eq!(query, "Show");
        assert_eq!(metadata.calls.lock().len(), 1);
    }

    #[test]
    fn test_season_matches_only_packs() {
        let target = WatchTarget::Season {
            watch_show_id: 9,
            tmdb_show_id: 42,
            season_number: 4,
        };
        let canonical = CanonicalMedia {
            title: "Show".to_string(),
            season_number: Some(4),
            episode_number: None,
        };

        assert!(target.matches("Show.S04.1080p.WEB", &canonical));
        assert!(!target.matches("Show.S04E01.1080p.WEB", &canonical));
        assert!(!target.matches("Show.S03.1080p.WEB", &canonical));
    }

    #[test]
    fn test_download_dir_strips_leading_slash() {
        let dirs = DownloadDirs {
            movie_subdir: "/films".to_string(),
            tv_subdir: "series".to_string(),
        };
        let base = Path::new("/data/downloads");

        let movie = WatchTarget::Movie {
            watch_movie_id: 1,
            tmdb_movie_id: 603,
        };
        assert_eq!(
            movie.download_dir(base, &dirs),
            PathBuf::from("/data/downloads/films")
        );
        assert_eq!(
            episode_target().download_dir(base, &dirs),
            PathBuf::from("/data/downloads/series")
        );
    }
}
