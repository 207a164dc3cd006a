//! Application configuration management

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::indexer::HostRewrite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => anyhow::bail!("Unknown log format '{}'", other),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL, built from DATABASE_PATH when only a path is given
    pub database_url: String,

    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_language: String,

    pub jackett_url: String,
    pub jackett_api_key: String,
    /// Host (and port) that result links are rewritten to before tracing
    pub jackett_host_rewrite: Option<HostRewrite>,

    /// Base directory the torrent client downloads into
    pub downloads_path: PathBuf,
    /// Session/state directory (DHT, resume data)
    pub session_path: PathBuf,
    pub movie_download_dir: String,
    pub tv_download_dir: String,
    pub torrent_enable_dht: bool,
    /// 0 = random
    pub torrent_listen_port: u16,
    /// How long adding a torrent may wait for magnet metadata
    pub torrent_add_timeout: Duration,

    /// Cron expression (with seconds) for the wanted sweep
    pub fetch_schedule: String,
    pub fetch_max_concurrent: usize,
    pub resolve_concurrency: usize,
    pub redirect_max_hops: usize,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let database_url = var("DATABASE_PATH")
            .or_else(|| var("DATABASE_URL"))
            .unwrap_or_else(|| "./data/fetcharr.db".to_string());
        let database_url = if database_url.starts_with("sqlite:") {
            database_url
        } else {
            format!("sqlite:{}", database_url)
        };

        let jackett_host_rewrite = var("JACKETT_HOST_REWRITE")
            .map(|v| v.parse::<HostRewrite>())
            .transpose()
            .context("Invalid JACKETT_HOST_REWRITE")?;

        Ok(Self {
            database_url,

            tmdb_api_key: var("TMDB_API_KEY").context("TMDB_API_KEY is required")?,
            tmdb_base_url: or("TMDB_BASE_URL", "https://api.themoviedb.org/3"),
            tmdb_language: or("TMDB_LANGUAGE", "en-US"),

            jackett_url: or("JACKETT_URL", "http://localhost:9117"),
            jackett_api_key: var("JACKETT_API_KEY").context("JACKETT_API_KEY is required")?,
            jackett_host_rewrite,

            downloads_path: PathBuf::from(or("DOWNLOADS_PATH", "./data/downloads")),
            session_path: PathBuf::from(or("SESSION_PATH", "./data/session")),
            movie_download_dir: or("MOVIE_DOWNLOAD_DIR", "movies"),
            tv_download_dir: or("TV_DOWNLOAD_DIR", "tv"),

            torrent_enable_dht: var("TORRENT_ENABLE_DHT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),

            torrent_listen_port: or("TORRENT_LISTEN_PORT", "0")
                .parse()
                .context("Invalid TORRENT_LISTEN_PORT")?,

            torrent_add_timeout: Duration::from_secs(
                or("TORRENT_ADD_TIMEOUT_SECS", "120")
                    .parse()
                    .context("Invalid TORRENT_ADD_TIMEOUT_SECS")?,
            ),

            fetch_schedule: or("FETCH_SCHEDULE", "0 */30 * * * *"),

            fetch_max_concurrent: or("FETCH_MAX_CONCURRENT", "2")
                .parse()
                .context("Invalid FETCH_MAX_CONCURRENT")?,

            resolve_concurrency: or("RESOLVE_CONCURRENCY", "4")
                .parse()
                .context("Invalid RESOLVE_CONCURRENCY")?,

            redirect_max_hops: or("REDIRECT_MAX_HOPS", "10")
                .parse()
                .context("Invalid REDIRECT_MAX_HOPS")?,

            log_format: or("LOG_FORMAT", "json").parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[("TMDB_API_KEY", "tmdb"), ("JACKETT_API_KEY", "jackett")];

    #[test]
    fn test_defaults() {
        let config = config(REQUIRED).unwrap();
        assert_eq!(config.database_url, "sqlite:./data/fetcharr.db");
        assert_eq!(config.jackett_url, "http://localhost:9117");
        assert_eq!(config.movie_download_dir, "movies");
        assert_eq!(config.tv_download_dir, "tv");
        assert_eq!(config.fetch_max_concurrent, 2);
        assert_eq!(config.resolve_concurrency, 4);
        assert_eq!(config.redirect_max_hops, 10);
        assert_eq!(config.torrent_add_timeout, Duration::from_secs(120));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.torrent_enable_dht);
        assert!(config.jackett_host_rewrite.is_none());
    }

    #[test]
    fn test_api_keys_are_required() {
        assert!(config(&[("TMDB_API_KEY", "tmdb")]).is_err());
        assert!(config(&[("JACKETT_API_KEY", "jackett"), ("TMDB_API_KEY", " ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("DATABASE_URL", "sqlite::memory:"),
            ("JACKETT_HOST_REWRITE", "jackett:9117"),
            ("TORRENT_ENABLE_DHT", "false"),
            ("LOG_FORMAT", "pretty"),
            ("TORRENT_ADD_TIMEOUT_SECS", "15"),
        ]);
        let config = config(&pairs).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(
            config.jackett_host_rewrite,
            Some(HostRewrite::new("jackett", Some(9117)))
        );
        assert!(!config.torrent_enable_dht);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.torrent_add_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("FETCH_MAX_CONCURRENT", "lots"));
        assert!(config(&pairs).is_err());
    }
}
