//! Party row persistence
//!
//! One row per party keyed by handle. Status and queue settings live
//! here; the songs themselves are in the `songs` table.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use micdrop_common::{Party, PartyStatus, Result};

use super::{millis_to_datetime, opt_millis_to_datetime};

type PartyRow = (
    String,         // handle
    String,         // status
    i64,            // fairness_enabled
    Option<String>, // current_song_eid
    Option<i64>,    // current_song_started_at
    Option<i64>,    // current_song_remaining_secs
    i64,            // created_at
    i64,            // last_activity_at
);

fn row_to_party(row: PartyRow) -> Party {
    let (handle, status, fairness, eid, started, remaining, created, activity) = row;
    Party {
        handle,
        status: PartyStatus::parse(&status).unwrap_or(PartyStatus::Open),
        fairness_enabled: fairness != 0,
        current_song_eid: eid,
        current_song_started_at: opt_millis_to_datetime(started),
        current_song_remaining_secs: remaining,
        created_at: millis_to_datetime(created),
        last_activity_at: millis_to_datetime(activity),
    }
}

/// Fetch a party by handle. Returns `None` when no such party exists.
pub async fn get(pool: &SqlitePool, handle: &str) -> Result<Option<Party>> {
    let row: Option<PartyRow> = sqlx::query_as(
        r#"
        SELECT handle, status, fairness_enabled, current_song_eid,
               current_song_started_at, current_song_remaining_secs,
               created_at, last_activity_at
        FROM parties WHERE handle = ?
        "#,
    )
    .bind(handle)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_party))
}

/// Insert a freshly created party row.
pub async fn insert(pool: &SqlitePool, party: &Party) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO parties (handle, status, fairness_enabled, current_song_eid,
                             current_song_started_at, current_song_remaining_secs,
                             created_at, last_activity_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&party.handle)
    .bind(party.status.as_str())
    .bind(party.fairness_enabled as i64)
    .bind(&party.current_song_eid)
    .bind(party.current_song_started_at.map(|t| t.timestamp_millis()))
    .bind(party.current_song_remaining_secs)
    .bind(party.created_at.timestamp_millis())
    .bind(party.last_activity_at.timestamp_millis())
    .execute(pool)
    .await?;

    Ok(())
}

/// Write back every mutable field of an existing party row.
pub async fn update(pool: &SqlitePool, party: &Party) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE parties
        SET status = ?, fairness_enabled = ?, current_song_eid = ?,
            current_song_started_at = ?, current_song_remaining_secs = ?,
            last_activity_at = ?
        WHERE handle = ?
        "#,
    )
    .bind(party.status.as_str())
    .bind(party.fairness_enabled as i64)
    .bind(&party.current_song_eid)
    .bind(party.current_song_started_at.map(|t| t.timestamp_millis()))
    .bind(party.current_song_remaining_secs)
    .bind(party.last_activity_at.timestamp_millis())
    .bind(&party.handle)
    .execute(pool)
    .await?;

    Ok(())
}

/// Bump the activity timestamp without touching anything else.
pub async fn touch(pool: &SqlitePool, handle: &str, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE parties SET last_activity_at = ? WHERE handle = ?")
        .bind(at.timestamp_millis())
        .bind(handle)
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete a party and all of its songs.
///
/// Song rows are removed explicitly so the wipe does not depend on
/// SQLite foreign key enforcement being enabled.
pub async fn wipe(pool: &SqlitePool, handle: &str) -> Result<()> {
    sqlx::query("DELETE FROM songs WHERE party_handle = ?")
        .bind(handle)
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM parties WHERE handle = ?")
        .bind(handle)
        .execute(pool)
        .await?;

    Ok(())
}

/// Wipe a party only if it is still idle past `cutoff`.
///
/// Runs in a transaction so a concurrent recreate of the same handle
/// (which resets `last_activity_at`) cannot lose its fresh state to
/// the sweep. Returns true when the party was wiped.
pub async fn wipe_if_idle(
    pool: &SqlitePool,
    handle: &str,
    cutoff: DateTime<Utc>,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM parties WHERE handle = ? AND last_activity_at <= ?")
        .bind(handle)
        .bind(cutoff.timestamp_millis())
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("DELETE FROM songs WHERE party_handle = ?")
        .bind(handle)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// Handles of parties whose last activity is at or before `cutoff`.
pub async fn expired_handles(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT handle FROM parties WHERE last_activity_at <= ?")
            .bind(cutoff.timestamp_millis())
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(h,)| h).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_memory, init::initialize_database};
    use chrono::Duration;

    async fn test_pool() -> SqlitePool {
        let pool = connect_memory().await.unwrap();
        initialize_database(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let pool = test_pool().await;
        let party = Party::new("friday-night".to_string());
        insert(&pool, &party).await.unwrap();

        let loaded = get(&pool, "friday-night").await.unwrap().unwrap();
        assert_eq!(loaded.handle, "friday-night");
        assert_eq!(loaded.status, PartyStatus::Open);
        assert!(loaded.fairness_enabled);
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            party.created_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let pool = test_pool().await;
        assert!(get(&pool, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_persists_status_and_current_song() {
        let pool = test_pool().await;
        let mut party = Party::new("p".to_string());
        insert(&pool, &party).await.unwrap();

        party.status = PartyStatus::Started;
        party.fairness_enabled = false;
        party.current_song_eid = Some("yt:abc".to_string());
        party.current_song_remaining_secs = Some(180);
        update(&pool, &party).await.unwrap();

        let loaded = get(&pool, "p").await.unwrap().unwrap();
        assert_eq!(loaded.status, PartyStatus::Started);
        assert!(!loaded.fairness_enabled);
        assert_eq!(loaded.current_song_eid.as_deref(), Some("yt:abc"));
        assert_eq!(loaded.current_song_remaining_secs, Some(180));
    }

    #[tokio::test]
    async fn wipe_removes_party_and_songs() {
        let pool = test_pool().await;
        let party = Party::new("gone".to_string());
        insert(&pool, &party).await.unwrap();
        sqlx::query(
            "INSERT INTO songs (party_handle, external_id, title, cover_url, singer_name, added_at)
             VALUES ('gone', 'e1', 't', 'c', 's', 1)",
        )
        .execute(&pool)
        .await
        .unwrap();

        wipe(&pool, "gone").await.unwrap();

        assert!(get(&pool, "gone").await.unwrap().is_none());
        let songs: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs WHERE party_handle = 'gone'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(songs.0, 0);
    }

    #[tokio::test]
    async fn expired_handles_respects_cutoff() {
        let pool = test_pool().await;
        let mut old = Party::new("old".to_string());
        old.last_activity_at = Utc::now() - Duration::hours(48);
        insert(&pool, &old).await.unwrap();

        let fresh = Party::new("fresh".to_string());
        insert(&pool, &fresh).await.unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        let expired = expired_handles(&pool, cutoff).await.unwrap();
        assert_eq!(expired, vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn wipe_if_idle_spares_recently_active_parties() {
        let pool = test_pool().await;
        let mut old = Party::new("idle".to_string());
        old.last_activity_at = Utc::now() - Duration::hours(48);
        insert(&pool, &old).await.unwrap();

        let fresh = Party::new("busy".to_string());
        insert(&pool, &fresh).await.unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        assert!(wipe_if_idle(&pool, "idle", cutoff).await.unwrap());
        assert!(!wipe_if_idle(&pool, "busy", cutoff).await.unwrap());

        assert!(get(&pool, "idle").await.unwrap().is_none());
        assert!(get(&pool, "busy").await.unwrap().is_some());
    }
}
