//! Indexer proxy integration
//!
//! - `jackett`: free-text search through a Jackett instance
//! - `redirect`: turning results-page links into locators a torrent client can fetch

pub mod jackett;
pub mod redirect;

pub use jackett::{IndexerError, JackettConfig, JackettIndexer};
pub use redirect::{HostRewrite, HttpLinkTracer};
