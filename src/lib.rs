//! fetcharr: torrent acquisition for watched movies and TV
//!
//! Watch records live in SQLite. A fetch attempt looks the target up on TMDB,
//! searches Jackett, keeps the releases whose names match, and hands the best
//! seeded one that is not blacklisted to an embedded librqbit session.

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod fetch;
pub mod indexer;
pub mod jobs;
pub mod services;
