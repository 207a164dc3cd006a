//! librqbit-backed download client
//!
//! Transfers are added paused so their info hash can be checked against the
//! blacklist before a single piece is requested.

use std::path::{Path, PathBuf};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use librqbit::api::TorrentIdOrHash;
use librqbit::{AddTorrent, AddTorrentOptions, AddTorrentResponse, Session, SessionOptions};
use tracing::{debug, info, warn};

use crate::fetch::{DownloadClient, Transfer, TransferError};

#[derive(Debug, Clone)]
pub struct TorrentServiceConfig {
    pub download_dir: PathBuf,
    pub session_dir: PathBuf,
    pub enable_dht: bool,
    pub listen_port: u16,
    /// Deadline for an add, which waits for magnet metadata from peers
    pub add_timeout: Duration,
}

impl Default for TorrentServiceConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./data/downloads"),
            session_dir: PathBuf::from("./data/session"),
            enable_dht: true,
            listen_port: 0,
            add_timeout: Duration::from_secs(120),
        }
    }
}

pub fn get_info_hash_hex<T: AsRef<librqbit::ManagedTorrent>>(handle: &T) -> String {
    handle
        .as_ref()
        .info_hash()
        .0
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn add_options(download_dir: &Path, start_paused: bool) -> AddTorrentOptions {
    AddTorrentOptions {
        paused: start_paused,
        output_folder: Some(download_dir.to_string_lossy().into_owned()),
        overwrite: true,
        ..Default::default()
    }
}

/// Run an add against a deadline, reporting expiry as a rejection
async fn add_within<T, F>(limit: Duration, add: F) -> Result<T, TransferError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, add).await {
        Ok(result) => result.map_err(|e| TransferError::Rejected(format!("{:#}", e))),
        Err(_) => Err(TransferError::Rejected(format!(
            "no metadata after {}s",
            limit.as_secs()
        ))),
    }
}

pub struct TorrentService {
    session: Arc<Session>,
    config: TorrentServiceConfig,
}

impl TorrentService {
    pub async fn start(config: TorrentServiceConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.download_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.download_dir.display()))?;
        tokio::fs::create_dir_all(&config.session_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.session_dir.display()))?;

        let session_opts = SessionOptions {
            disable_dht: !config.enable_dht,
            disable_dht_persistence: !config.enable_dht,
            persistence: Some(librqbit::SessionPersistenceConfig::Json {
                folder: Some(config.session_dir.clone()),
            }),
            listen_port_range: if config.listen_port > 0 {
                Some(config.listen_port..config.listen_port + 1)
            } else {
                None
            },
            ..Default::default()
        };

        let session = Session::new_with_opts(config.download_dir.clone(), session_opts)
            .await
            .context("Failed to create torrent session")?;

        info!(
            download_dir = %config.download_dir.display(),
            dht = config.enable_dht,
            "Torrent session started"
        );

        Ok(Self { session, config })
    }

    fn handle(&self, transfer: &Transfer) -> Result<Arc<librqbit::ManagedTorrent>, TransferError> {
        self.session
            .get(TorrentIdOrHash::Id(transfer.id))
            .ok_or(TransferError::NotFound(transfer.id))
    }

    pub async fn stop(&self) {
        self.session.stop().await;
    }
}

#[async_trait]
impl DownloadClient for TorrentService {
    fn base_download_dir(&self) -> PathBuf {
        self.config.download_dir.clone()
    }

    async fn add_transfer(
        &self,
        locator: &str,
        download_dir: &Path,
        start_paused: bool,
    ) -> Result<Transfer, TransferError> {
        let response = add_within(
            self.config.add_timeout,
            self.session.add_torrent(
                AddTorrent::from_url(locator),
                Some(add_options(download_dir, start_paused)),
            ),
        )
        .await?;

        match response {
            AddTorrentResponse::Added(id, handle) => {
                let hash = get_info_hash_hex(&handle);
                debug!(id, hash = %hash, dir = %download_dir.display(), "Added torrent");
                Ok(Transfer::added(id, hash))
            }
            AddTorrentResponse::AlreadyManaged(id, handle) => {
                let hash = get_info_hash_hex(&handle);
                warn!(id, hash = %hash, "Torrent is already managed by the session");
                Ok(Transfer::existing(id, hash))
            }
            AddTorrentResponse::ListOnly(_) => Err(TransferError::Rejected(
                "torrent was added in list-only mode".to_string(),
            )),
        }
    }

    async fn start(&self, transfer: &Transfer) -> Result<(), TransferError> {
        let handle = self.handle(transfer)?;
        self.session
            .unpause(&handle)
            .await
            .map_err(|e| TransferError::Client(format!("{:#}", e)))
    }

    async fn remove(&self, transfer: &Transfer) -> Result<(), TransferError> {
        self.session
            .delete(TorrentIdOrHash::Id(transfer.id), false)
            .await
            .map_err(|e| TransferError::Client(format!("{:#}", e)))?;
        debug!(id = transfer.id, hash = %transfer.hash, "Removed torrent");
        Ok(())
    }
}
