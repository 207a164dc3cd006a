//! Release-name parsers for scene-style torrent titles
//!
//! Parses titles like:
//! - "Chicago.Fire.S14E08.1080p.WEB.h264-ETHEL"
//! - "Corner Gas 6x12 720p HDTV"
//! - "Severance.S02.COMPLETE.1080p.ATVP.WEB-DL"
//! - "Blade.Runner.2049.2017.2160p.UHD.BluRay.x265-TERMiNAL"
//!
//! and decides whether a parsed title matches a canonical title from the
//! metadata provider.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

// Multi-episode releases ("S01E02E03", "S01E02-E03") are their first episode
static SXXEXX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+?)\s+S(\d{1,2})\s?E(\d{1,3})(?:-?E\d{1,3})*\b").expect("valid regex")
});
static NXNN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s+(\d{1,2})x(\d{2,3})\b").expect("valid regex"));
static VERBOSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+?)\s+Season\s*(\d{1,2})\s*Episode\s*(\d{1,3})\b").expect("valid regex")
});
static SEASON_PACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s+(?:S|Season\s*)(\d{1,2})\b").expect("valid regex"));
// Greedy so the last year wins: "Blade Runner 2049 2017" is titled "Blade Runner 2049"
static MOVIE_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)[\s(\[]+((?:19|20)\d{2})(?:[\s)\]]|$)").expect("valid regex")
});
static QUALITY_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(.+?)\s+(?:2160p|1080p|720p|576p|480p|4k|uhd|bluray|blu ray|bdrip|brrip|web ?dl|webrip|hdtv|dvdrip|hdrip|x264|x265|h264|h265|hevc|remux)\b",
    )
    .expect("valid regex")
});
static TRAILING_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(?(19\d{2}|20\d{2})\)?\s*$").expect("valid regex"));
static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// A parsed TV release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvRelease {
    pub show_name: Option<String>,
    pub season: Option<u32>,
    /// `None` for a full-season pack
    pub episode: Option<u32>,
    pub original_title: String,
}

impl TvRelease {
    pub fn parse(title: &str) -> Self {
        let mut result = TvRelease {
            original_title: title.to_string(),
            ..Default::default()
        };

        let cleaned = clean_separators(title);

        let episode_caps = SXXEXX_RE
            .captures(&cleaned)
            .or_else(|| NXNN_RE.captures(&cleaned))
            .or_else(|| VERBOSE_RE.captures(&cleaned));

        if let Some(caps) = episode_caps {
            result.show_name = caps.get(1).map(|m| m.as_str().trim().to_string());
            result.season = caps.get(2).and_then(|m| m.as_str().parse().ok());
            result.episode = caps.get(3).and_then(|m| m.as_str().parse().ok());
        } else if let Some(caps) = SEASON_PACK_RE.captures(&cleaned) {
            result.show_name = caps.get(1).map(|m| m.as_str().trim().to_string());
            result.season = caps.get(2).and_then(|m| m.as_str().parse().ok());
        }

        trace!(
            title = title,
            show = ?result.show_name,
            season = ?result.season,
            episode = ?result.episode,
            "Parsed TV release"
        );

        result
    }

    /// Whether this release is `title`, season `season` and, when given,
    /// episode `episode`. Without an episode only full-season packs match.
    pub fn is_match(&self, title: &str, season: u32, episode: Option<u32>) -> bool {
        let Some(show_name) = self.show_name.as_deref() else {
            return false;
        };

        if !names_match(show_name, title) {
            return false;
        }

        if self.season != Some(season) {
            return false;
        }

        self.episode == episode
    }
}

/// A parsed movie release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRelease {
    pub title: String,
    pub year: Option<u32>,
    pub original_title: String,
}

impl MovieRelease {
    pub fn parse(release: &str) -> Self {
        let cleaned = clean_separators(release);

        let (title, year) = if let Some(caps) = MOVIE_YEAR_RE.captures(&cleaned) {
            (
                caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
                caps.get(2).and_then(|m| m.as_str().parse().ok()),
            )
        } else if let Some(caps) = QUALITY_MARKER_RE.captures(&cleaned) {
            (caps.get(1).map(|m| m.as_str()).unwrap_or_default(), None)
        } else {
            (cleaned.as_str(), None)
        };

        Self {
            title: title.trim().to_string(),
            year,
            original_title: release.to_string(),
        }
    }

    /// A year-like number can belong to the title ("Blade Runner 2049"), so
    /// the title with the year appended is accepted too.
    pub fn is_match(&self, title: &str) -> bool {
        if self.title.is_empty() {
            return false;
        }
        let canonical = normalize_title(title);
        if normalize_title(&self.title) == canonical {
            return true;
        }
        self.year
            .is_some_and(|year| normalize_title(&format!("{} {}", self.title, year)) == canonical)
    }
}

fn clean_separators(title: &str) -> String {
    title
        .replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Show names match with or without a trailing year ("Doctor Who 2005")
fn names_match(parsed: &str, canonical: &str) -> bool {
    let canonical = normalize_title(canonical);
    if normalize_title(parsed) == canonical {
        return true;
    }

    let without_year = TRAILING_YEAR_RE.replace(parsed, "");
    !without_year.is_empty() && normalize_title(&without_year) == canonical
}

/// Normalize a title for comparison
/// - Lowercase, "&" spelled out
/// - Apostrophes dropped, other punctuation becomes a space
/// - Leading article removed
pub fn normalize_title(title: &str) -> String {
    let lowered = title
        .to_lowercase()
        .replace('&', " and ")
        .replace(['\'', '\u{2019}'], "");

    let spaced = NON_ALNUM_RE.replace_all(&lowered, " ");
    let mut normalized = spaced.trim().to_string();

    for article in ["the ", "a ", "an "] {
        if let Some(rest) = normalized.strip_prefix(article) {
            normalized = rest.to_string();
            break;
        }
    }

    normalized
}
