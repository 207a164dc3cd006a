//! Jackett JSON search API
//!
//! `GET {base}/api/v2.0/indexers/all/results?apikey=..&Query=..&Category[]=..`
//! searches every tracker Jackett is configured with.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetch::{Indexer, MediaKind, RawSearchResult, SearchOutcome};
use crate::services::rate_limiter::{RateLimitedClient, RetryConfig, is_transient_status, retry_async};

/// Torznab top-level categories
const CATEGORY_MOVIES: u32 = 2000;
const CATEGORY_TV: u32 = 5000;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("indexer request failed: {0}")]
    Request(String),

    #[error("indexer answered with status {0}")]
    Status(u16),

    #[error("unexpected indexer response: {0}")]
    Decode(String),
}

impl IndexerError {
    fn is_transient(&self) -> bool {
        match self {
            IndexerError::Request(_) => true,
            IndexerError::Status(status) => is_transient_status(*status),
            IndexerError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JackettConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JackettResponse {
    #[serde(default)]
    results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JackettResult {
    title: String,
    #[serde(default)]
    seeders: Option<u32>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    magnet_uri: Option<String>,
}

impl JackettResult {
    /// Results with neither a link nor a magnet cannot be fetched at all
    fn into_raw(self) -> Option<RawSearchResult> {
        let link = self.link.unwrap_or_default();
        if link.is_empty() && self.magnet_uri.as_deref().is_none_or(str::is_empty) {
            return None;
        }

        Some(RawSearchResult {
            title: self.title,
            seeders: self.seeders.unwrap_or(0),
            link,
            magnet_uri: self.magnet_uri,
        })
    }
}

pub struct JackettIndexer {
    client: RateLimitedClient,
    config: JackettConfig,
    retry: RetryConfig,
}

impl JackettIndexer {
    pub fn new(client: RateLimitedClient, config: JackettConfig) -> Self {
        Self {
            client,
            config,
            retry: RetryConfig::default(),
        }
    }

    fn results_url(&self) -> String {
        format!(
            "{}/api/v2.0/indexers/all/results",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn search_once(&self, category: u32, query: &str) -> Result<JackettResponse, IndexerError> {
        let category = category.to_string();
        let params = [
            ("apikey", self.config.api_key.as_str()),
            ("Query", query),
            ("Category[]", category.as_str()),
        ];

        let response = self
            .client
            .get_with_query(&self.results_url(), &params)
            .await
            .map_err(|e| IndexerError::Request(format!("{:#}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexerError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IndexerError::Request(e.to_string()))?;
        parse_results(&body)
    }
}

fn parse_results(body: &str) -> Result<JackettResponse, IndexerError> {
    serde_json::from_str(body).map_err(|e| IndexerError::Decode(e.to_string()))
}

fn category_for(kind: MediaKind) -> u32 {
    match kind {
        MediaKind::Movie => CATEGORY_MOVIES,
        MediaKind::Tv => CATEGORY_TV,
    }
}

#[async_trait]
impl Indexer for JackettIndexer {
    async fn search(&self, kind: MediaKind, query: &str) -> SearchOutcome {
        let category = category_for(kind);
        debug!(query = %query, category, "Searching Jackett");

        let response = retry_async(
            || self.search_once(category, query),
            IndexerError::is_transient,
            &self.retry,
            "jackett_search",
        )
        .await;

        match response {
            Ok(response) => {
                let results: Vec<RawSearchResult> = response
                    .results
                    .into_iter()
                    .filter_map(JackettResult::into_raw)
                    .collect();
                info!(query = %query, count = results.len(), "Jackett search finished");
                SearchOutcome::ok(results)
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Jackett search failed");
                SearchOutcome::failed(e.to_string())
            }
        }
    }
}
