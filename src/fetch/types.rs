//! Value types that flow through a fetch attempt

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad media family, used for indexer categories and download folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Tv => write!(f, "tv"),
        }
    }
}

/// A request to acquire one unit of media
///
/// Each variant carries the watch record it commits to and the provider
/// ids needed to look up its canonical metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchTarget {
    Movie {
        watch_movie_id: i64,
        tmdb_movie_id: i64,
    },
    Episode {
        watch_episode_id: i64,
        tmdb_show_id: i64,
        season_number: u32,
        episode_number: u32,
    },
    /// A full season, fetched as a single transfer
    Season {
        watch_show_id: i64,
        tmdb_show_id: i64,
        season_number: u32,
    },
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchTarget::Movie { watch_movie_id, .. } => write!(f, "movie#{}", watch_movie_id),
            WatchTarget::Episode {
                watch_episode_id,
                season_number,
                episode_number,
                ..
            } => write!(
                f,
                "episode#{} (S{:02}E{:02})",
                watch_episode_id, season_number, episode_number
            ),
            WatchTarget::Season {
                watch_show_id,
                season_number,
                ..
            } => write!(f, "show#{} season {}", watch_show_id, season_number),
        }
    }
}

/// Resolved metadata for a target, fetched once per attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMedia {
    pub title: String,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
}

impl CanonicalMedia {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            season_number: None,
            episode_number: None,
        }
    }
}

/// One release as reported by the indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSearchResult {
    pub title: String,
    pub seeders: u32,
    /// Results-page download link, usually pointing back at the indexer proxy
    pub link: String,
    /// Direct magnet locator, when the indexer already knows it
    pub magnet_uri: Option<String>,
}

impl RawSearchResult {
    /// The direct locator, treating an empty string as absent
    pub fn direct_locator(&self) -> Option<&str> {
        self.magnet_uri.as_deref().filter(|m| !m.trim().is_empty())
    }
}

/// A filtered result whose fetchable locator has been resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCandidate {
    pub result: RawSearchResult,
    pub resolved_locator: String,
}

impl ResolvedCandidate {
    pub fn title(&self) -> &str {
        &self.result.title
    }

    pub fn seeders(&self) -> u32 {
        self.result.seeders
    }
}

/// Handle for a transfer registered with the download client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transfer {
    pub id: usize,
    /// Lowercase hex info hash
    pub hash: String,
    /// Added by this attempt. A transfer the client already managed is never
    /// removed by the attempt that found it.
    pub owned: bool,
}

impl Transfer {
    pub fn added(id: usize, hash: impl Into<String>) -> Self {
        Self {
            id,
            hash: hash.into(),
            owned: true,
        }
    }

    pub fn existing(id: usize, hash: impl Into<String>) -> Self {
        Self {
            id,
            hash: hash.into(),
            owned: false,
        }
    }
}

/// Outcome of an indexer search. `ok = false` is an expected result, not a fault.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub ok: bool,
    pub results: Vec<RawSearchResult>,
    pub error_detail: Option<String>,
}

impl SearchOutcome {
    pub fn ok(results: Vec<RawSearchResult>) -> Self {
        Self {
            ok: true,
            results,
            error_detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            results: Vec::new(),
            error_detail: Some(detail.into()),
        }
    }
}

/// Terminal state of a fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchOutcome {
    Committed,
    MetadataFailed,
    SearchFailed,
    NoMatch,
    NoResolvableCandidate,
    Exhausted,
    CommitFailed,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Committed)
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchOutcome::Committed => "committed",
            FetchOutcome::MetadataFailed => "metadata_failed",
            FetchOutcome::SearchFailed => "search_failed",
            FetchOutcome::NoMatch => "no_match",
            FetchOutcome::NoResolvableCandidate => "no_resolvable_candidate",
            FetchOutcome::Exhausted => "exhausted",
            FetchOutcome::CommitFailed => "commit_failed",
        };
        write!(f, "{}", s)
    }
}

/// What a fetch attempt reports to its caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub acquired: bool,
    pub outcome: FetchOutcome,
    /// The committed transfer, only set when `acquired`
    pub transfer: Option<Transfer>,
    /// Discarded transfers the download client failed to remove
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub orphaned: Vec<Transfer>,
}

impl FetchReport {
    pub fn committed(transfer: Transfer) -> Self {
        Self {
            acquired: true,
            outcome: FetchOutcome::Committed,
            transfer: Some(transfer),
            orphaned: Vec::new(),
        }
    }

    pub fn failed(outcome: FetchOutcome) -> Self {
        Self {
            acquired: outcome.is_success(),
            outcome,
            transfer: None,
            orphaned: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_locator_ignores_blank_magnet() {
        let mut result = RawSearchResult {
            title: "Alpha.2020.1080p".to_string(),
            seeders: 3,
            link: "http://jackett/dl/1".to_string(),
            magnet_uri: Some("   ".to_string()),
        };
        assert_eq!(result.direct_locator(), None);

        result.magnet_uri = Some("magnet:?xt=urn:btih:abc".to_string());
        assert_eq!(result.direct_locator(), Some("magnet:?xt=urn:btih:abc"));
    }

    #[test]
    fn test_only_committed_is_acquired() {
        for outcome in [
            FetchOutcome::MetadataFailed,
            FetchOutcome::SearchFailed,
            FetchOutcome::NoMatch,
            FetchOutcome::NoResolvableCandidate,
            FetchOutcome::Exhausted,
            FetchOutcome::CommitFailed,
        ] {
            assert!(!FetchReport::failed(outcome).acquired, "{}", outcome);
        }

        let report = FetchReport::committed(Transfer::added(1, "abc"));
        assert!(report.acquired);
        assert_eq!(report.outcome, FetchOutcome::Committed);
    }

    #[test]
    fn test_target_display() {
        let target = WatchTarget::Episode {
            watch_episode_id: 7,
            tmdb_show_id: 1399,
            season_number: 1,
            episode_number: 2,
        };
        assert_eq!(target.to_string(), "episode#7 (S01E02)");
    }
}
