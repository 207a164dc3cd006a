//! TMDB (The Movie Database) API client
//!
//! Base URL: https://api.themoviedb.org/3
//!
//! Only the lookups a fetch attempt needs are implemented: movie details,
//! show details and episode details.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::rate_limiter::{RateLimitedClient, RetryConfig, is_transient_status, retry_async};
use crate::fetch::{CanonicalMedia, MetadataError, MetadataProvider};

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub base_url: String,
    pub api_key: String,
    pub language: String,
}

/// TMDB API client with rate limiting and retry logic
pub struct TmdbClient {
    client: Arc<RateLimitedClient>,
    config: TmdbConfig,
    retry_config: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbShow {
    pub id: i64,
    pub name: String,
    pub original_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbEpisode {
    pub id: i64,
    pub name: String,
    pub season_number: u32,
    pub episode_number: u32,
    pub air_date: Option<String>,
}

impl TmdbMovie {
    /// Releases are named after the original title, not the localized one
    fn canonical(self) -> CanonicalMedia {
        let title = self
            .original_title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(self.title);
        CanonicalMedia::titled(title)
    }
}

impl TmdbClient {
    pub fn new(client: Arc<RateLimitedClient>, config: TmdbConfig) -> Self {
        Self {
            client,
            config,
            retry_config: RetryConfig::default(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetadataError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let client = self.client.clone();
        let api_key = self.config.api_key.clone();
        let language = self.config.language.clone();

        debug!(path = %path, "TMDB lookup");

        retry_async(
            || {
                let url = url.clone();
                let client = client.clone();
                let key = api_key.clone();
                let language = language.clone();
                async move {
                    let params = [("api_key", key), ("language", language)];
                    let response = client
                        .get_with_query(&url, &params)
                        .await
                        .map_err(|e| Attempt::Retry(MetadataError::Transport(format!("{:#}", e))))?;

                    let status = response.status().as_u16();
                    match status {
                        404 => return Err(Attempt::Fail(MetadataError::NotFound(url))),
                        401 => {
                            return Err(Attempt::Fail(MetadataError::Transport(
                                "TMDB API key is invalid".into(),
                            )));
                        }
                        s if !(200..300).contains(&s) => {
                            if s == 429 {
                                warn!("TMDB rate limit hit, will retry");
                            }
                            let error =
                                MetadataError::Transport(format!("TMDB answered with status {}", s));
                            return Err(if is_transient_status(s) {
                                Attempt::Retry(error)
                            } else {
                                Attempt::Fail(error)
                            });
                        }
                        _ => {}
                    }

                    let body = response
                        .text()
                        .await
                        .map_err(|e| Attempt::Retry(MetadataError::Transport(e.to_string())))?;
                    serde_json::from_str::<T>(&body)
                        .map_err(|e| Attempt::Fail(MetadataError::Decode(e.to_string())))
                }
            },
            Attempt::is_retry,
            &self.retry_config,
            "tmdb_lookup",
        )
        .await
        .map_err(Attempt::into_inner)
    }
}

/// A lookup failure tagged with whether another attempt could help
#[derive(Debug)]
enum Attempt {
    Retry(MetadataError),
    Fail(MetadataError),
}

impl Attempt {
    fn is_retry(&self) -> bool {
        matches!(self, Attempt::Retry(_))
    }

    fn into_inner(self) -> MetadataError {
        match self {
            Attempt::Retry(e) | Attempt::Fail(e) => e,
        }
    }
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attempt::Retry(e) | Attempt::Fail(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn movie(&self, tmdb_movie_id: i64) -> Result<CanonicalMedia, MetadataError> {
        let movie: TmdbMovie = self.get_json(&format!("/movie/{}", tmdb_movie_id)).await?;
        Ok(movie.canonical())
    }

    async fn show(&self, tmdb_show_id: i64) -> Result<CanonicalMedia, MetadataError> {
        let show: TmdbShow = self.get_json(&format!("/tv/{}", tmdb_show_id)).await?;
        Ok(CanonicalMedia::titled(show.name))
    }

    async fn episode(
        &self,
        tmdb_show_id: i64,
        season_number: u32,
        episode_number: u32,
    ) -> Result<CanonicalMedia, MetadataError> {
        let episode: TmdbEpisode = self
            .get_json(&format!(
                "/tv/{}/season/{}/episode/{}",
                tmdb_show_id, season_number, episode_number
            ))
            .await?;

        Ok(CanonicalMedia {
            title: episode.name,
            season_number: Some(episode.season_number),
            episode_number: Some(episode.episode_number),
        })
    }
}
