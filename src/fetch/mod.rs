//! Torrent acquisition for watched media
//!
//! A fetch attempt looks up canonical metadata for a [`WatchTarget`], searches
//! the indexer, keeps the releases whose names match, resolves each release to
//! a fetchable locator and then walks the candidates from most to least seeded
//! until one is neither blacklisted nor rejected by the download client.

pub mod candidates;
pub mod orchestrator;
pub mod strategy;
pub mod traits;
pub mod types;

pub use orchestrator::{FetchContext, FetchSettings, fetch};
pub use strategy::DownloadDirs;
pub use traits::{
    BlacklistStore, DownloadClient, Indexer, LinkTracer, MetadataError, MetadataProvider,
    ResolutionError, TransferError, TransferSink,
};
pub use types::{
    CanonicalMedia, FetchOutcome, FetchReport, MediaKind, RawSearchResult, ResolvedCandidate,
    SearchOutcome, Transfer, WatchTarget,
};
