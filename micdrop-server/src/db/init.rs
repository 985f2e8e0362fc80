//! Database schema initialization
//!
//! Creates the party tables on startup. Safe to run on every boot:
//! all statements are `IF NOT EXISTS`.

use sqlx::SqlitePool;

use micdrop_common::Result;

/// Initialize the database schema.
///
/// Creates the `parties` and `songs` tables plus the lookup index if
/// they do not already exist. Existing data is never touched.
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parties (
            handle TEXT PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'open',
            fairness_enabled INTEGER NOT NULL DEFAULT 1,
            current_song_eid TEXT,
            current_song_started_at INTEGER,
            current_song_remaining_secs INTEGER,
            created_at INTEGER NOT NULL,
            last_activity_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            party_handle TEXT NOT NULL REFERENCES parties(handle) ON DELETE CASCADE,
            external_id TEXT NOT NULL,
            title TEXT NOT NULL,
            artist_hint TEXT,
            song_hint TEXT,
            cover_url TEXT NOT NULL,
            duration_iso TEXT,
            singer_name TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            played_at INTEGER,
            is_priority INTEGER NOT NULL DEFAULT 0,
            is_manual INTEGER NOT NULL DEFAULT 0,
            order_index INTEGER,
            tie_breaker INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_songs_party_added ON songs(party_handle, added_at)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("database schema initialized");
    Ok(())
}
