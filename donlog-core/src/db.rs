//! Database pool creation and schema initialization.
//!
//! The schema is created idempotently at startup so that a fresh database
//! file (or an in-memory database in tests) is usable without a separate
//! migration step.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Statements executed on startup. Each is idempotent.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS seasons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        start INTEGER NOT NULL,
        finish INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS players (
        player_tag TEXT NOT NULL,
        season_id INTEGER NOT NULL,
        donations INTEGER NOT NULL DEFAULT 0,
        received INTEGER NOT NULL DEFAULT 0,
        last_updated INTEGER NOT NULL,
        PRIMARY KEY (player_tag, season_id)
    )",
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player_tag TEXT NOT NULL,
        player_name TEXT NOT NULL,
        clan_tag TEXT NOT NULL,
        donations INTEGER NOT NULL,
        received INTEGER NOT NULL,
        time INTEGER NOT NULL,
        reported INTEGER NOT NULL DEFAULT 0,
        season_id INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS events_player_tag_idx ON events (player_tag)",
    "CREATE INDEX IF NOT EXISTS events_clan_tag_idx ON events (clan_tag)",
    "CREATE INDEX IF NOT EXISTS events_reported_idx ON events (reported)",
    "CREATE INDEX IF NOT EXISTS events_season_id_idx ON events (season_id)",
    "CREATE TABLE IF NOT EXISTS playerevents (
        player_tag TEXT NOT NULL,
        donations INTEGER NOT NULL,
        received INTEGER NOT NULL,
        event_id INTEGER NOT NULL,
        live INTEGER NOT NULL DEFAULT 1,
        trophies INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (player_tag, event_id)
    )",
    "CREATE TABLE IF NOT EXISTS tempevents (
        channel_id INTEGER NOT NULL,
        fmt TEXT NOT NULL
    )",
];

/// Create a connection pool for the given SQLite URL.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Create all engine tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema initialized");
    Ok(())
}
