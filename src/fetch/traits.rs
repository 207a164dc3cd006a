//! Collaborator seams used by the fetch pipeline
//!
//! Every external system the pipeline talks to sits behind one of these
//! traits so an attempt can be driven by real services or by in-process
//! fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use super::types::{CanonicalMedia, MediaKind, SearchOutcome, Transfer, WatchTarget};

/// Metadata lookup failures. Fatal for the current attempt.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found on metadata provider: {0}")]
    NotFound(String),

    #[error("metadata request failed: {0}")]
    Transport(String),

    #[error("unexpected metadata response: {0}")]
    Decode(String),
}

/// A results-page link could not be turned into a fetchable locator.
/// Only ever drops the one candidate.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("invalid link '{0}'")]
    InvalidUrl(String),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("{0} redirected without a Location header")]
    MissingLocation(String),

    #[error("gave up after {0} redirects")]
    TooManyRedirects(usize),
}

/// Download client failures
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("download client rejected the transfer: {0}")]
    Rejected(String),

    #[error("transfer {0} is not known to the download client")]
    NotFound(usize),

    #[error("download client error: {0}")]
    Client(String),
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Movie lookup; the title is the provider's original title
    async fn movie(&self, tmdb_movie_id: i64) -> Result<CanonicalMedia, MetadataError>;

    /// Show lookup; only the title is populated
    async fn show(&self, tmdb_show_id: i64) -> Result<CanonicalMedia, MetadataError>;

    async fn episode(
        &self,
        tmdb_show_id: i64,
        season_number: u32,
        episode_number: u32,
    ) -> Result<CanonicalMedia, MetadataError>;
}

#[async_trait]
pub trait Indexer: Send + Sync {
    /// Free-text search. Failures are reported through `SearchOutcome::ok`.
    async fn search(&self, kind: MediaKind, query: &str) -> SearchOutcome;
}

/// Follows a results-page link to the locator the download client can fetch
#[async_trait]
pub trait LinkTracer: Send + Sync {
    async fn trace(&self, url: &str) -> Result<String, ResolutionError>;
}

#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Base directory the client downloads into
    fn base_download_dir(&self) -> PathBuf;

    async fn add_transfer(
        &self,
        locator: &str,
        download_dir: &Path,
        start_paused: bool,
    ) -> Result<Transfer, TransferError>;

    async fn start(&self, transfer: &Transfer) -> Result<(), TransferError>;

    /// Remove the transfer, keeping any files already written
    async fn remove(&self, transfer: &Transfer) -> Result<(), TransferError>;
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    async fn is_blacklisted(&self, hash: &str) -> anyhow::Result<bool>;
}

/// Persists the chosen transfer against the watch record(s) of a target
#[async_trait]
pub trait TransferSink: Send + Sync {
    async fn commit(&self, target: &WatchTarget, transfer: &Transfer) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResolutionError::Status {
            url: "http://jackett/dl".to_string(),
            status: 502,
        };
        assert_eq!(err.to_string(), "http://jackett/dl answered with status 502");

        let err = TransferError::NotFound(4);
        assert_eq!(
            err.to_string(),
            "transfer 4 is not known to the download client"
        );
    }
}
