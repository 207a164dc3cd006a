//! Concrete collaborators: metadata provider, download client and shared HTTP plumbing

pub mod filename_parser;
pub mod rate_limiter;
pub mod tmdb;
pub mod torrent;

pub use rate_limiter::{RateLimitConfig, RateLimitedClient, RetryConfig};
pub use tmdb::{TmdbClient, TmdbConfig};
pub use torrent::{TorrentService, TorrentServiceConfig};
