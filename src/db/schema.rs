//! Table definitions, applied idempotently on connect

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "watch_movie",
        r#"
        CREATE TABLE IF NOT EXISTS watch_movie (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tmdb_movie_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            transfer_id INTEGER,
            transfer_hash TEXT,
            collected INTEGER NOT NULL DEFAULT 0,
            last_attempt_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "watch_tv_show",
        r#"
        CREATE TABLE IF NOT EXISTS watch_tv_show (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tmdb_show_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "watch_tv_episode",
        r#"
        CREATE TABLE IF NOT EXISTS watch_tv_episode (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            watch_tv_show_id INTEGER NOT NULL REFERENCES watch_tv_show(id) ON DELETE CASCADE,
            season_number INTEGER NOT NULL,
            episode_number INTEGER NOT NULL,
            transfer_id INTEGER,
            transfer_hash TEXT,
            collected INTEGER NOT NULL DEFAULT 0,
            last_attempt_at TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (watch_tv_show_id, season_number, episode_number)
        )
        "#,
    ),
    (
        "torrent_blacklist",
        r#"
        CREATE TABLE IF NOT EXISTS torrent_blacklist (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hash TEXT NOT NULL UNIQUE,
            name TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    ),
];

pub async fn sync_schema(pool: &SqlitePool) -> Result<()> {
    for (table, statement) in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create table {}", table))?;
        debug!(table = %table, "Table ready");
    }
    Ok(())
}
