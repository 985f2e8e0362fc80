//! Song row persistence
//!
//! Songs are append-only apart from the played timestamp, priority and
//! manual position flags, and removal. Submission order is the row id,
//! so `list` always returns songs in the order they arrived.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use micdrop_common::{Result, Song};

use super::{millis_to_datetime, opt_millis_to_datetime};

type SongRow = (
    String,         // external_id
    String,         // title
    Option<String>, // artist_hint
    Option<String>, // song_hint
    String,         // cover_url
    Option<String>, // duration_iso
    String,         // singer_name
    i64,            // added_at
    Option<i64>,    // played_at
    i64,            // is_priority
    i64,            // is_manual
    Option<i64>,    // order_index
    i64,            // tie_breaker
);

fn row_to_song(row: SongRow) -> Song {
    let (
        external_id,
        title,
        artist_hint,
        song_hint,
        cover_url,
        duration_iso,
        singer_name,
        added_at,
        played_at,
        is_priority,
        is_manual,
        order_index,
        tie_breaker,
    ) = row;
    Song {
        external_id,
        title,
        artist_hint,
        song_hint,
        cover_url,
        duration_iso,
        singer_name,
        added_at: millis_to_datetime(added_at),
        played_at: opt_millis_to_datetime(played_at),
        is_priority: is_priority != 0,
        is_manual: is_manual != 0,
        order_index,
        tie_breaker,
    }
}

/// All songs of a party in submission order.
pub async fn list(pool: &SqlitePool, handle: &str) -> Result<Vec<Song>> {
    let rows: Vec<SongRow> = sqlx::query_as(
        r#"
        SELECT external_id, title, artist_hint, song_hint, cover_url,
               duration_iso, singer_name, added_at, played_at,
               is_priority, is_manual, order_index, tie_breaker
        FROM songs WHERE party_handle = ?
        ORDER BY added_at ASC, id ASC
        "#,
    )
    .bind(handle)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_song).collect())
}

/// Append a song to a party.
pub async fn insert(pool: &SqlitePool, handle: &str, song: &Song) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO songs (party_handle, external_id, title, artist_hint, song_hint,
                           cover_url, duration_iso, singer_name, added_at, played_at,
                           is_priority, is_manual, order_index, tie_breaker)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(handle)
    .bind(&song.external_id)
    .bind(&song.title)
    .bind(&song.artist_hint)
    .bind(&song.song_hint)
    .bind(&song.cover_url)
    .bind(&song.duration_iso)
    .bind(&song.singer_name)
    .bind(song.added_at.timestamp_millis())
    .bind(song.played_at.map(|t| t.timestamp_millis()))
    .bind(song.is_priority as i64)
    .bind(song.is_manual as i64)
    .bind(song.order_index)
    .bind(song.tie_breaker)
    .execute(pool)
    .await?;

    Ok(())
}

/// Stamp the earliest unplayed copy of `external_id` as played at `at`.
///
/// Returns false when the party has no unplayed song with that id, in
/// which case nothing was written.
pub async fn mark_played(
    pool: &SqlitePool,
    handle: &str,
    external_id: &str,
    at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE songs SET played_at = ?
        WHERE id = (
            SELECT id FROM songs
            WHERE party_handle = ? AND external_id = ? AND played_at IS NULL
            ORDER BY added_at ASC, id ASC LIMIT 1
        )
        "#,
    )
    .bind(at.timestamp_millis())
    .bind(handle)
    .bind(external_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete the earliest copy of `external_id`, played or not.
///
/// Returns false when no song with that id exists in the party.
pub async fn remove_first(pool: &SqlitePool, handle: &str, external_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM songs
        WHERE id = (
            SELECT id FROM songs
            WHERE party_handle = ? AND external_id = ?
            ORDER BY added_at ASC, id ASC LIMIT 1
        )
        "#,
    )
    .bind(handle)
    .bind(external_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Set or clear the priority flag on the earliest unplayed copy.
pub async fn set_priority(
    pool: &SqlitePool,
    handle: &str,
    external_id: &str,
    is_priority: bool,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE songs SET is_priority = ?
        WHERE id = (
            SELECT id FROM songs
            WHERE party_handle = ? AND external_id = ? AND played_at IS NULL
            ORDER BY added_at ASC, id ASC LIMIT 1
        )
        "#,
    )
    .bind(is_priority as i64)
    .bind(handle)
    .bind(external_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Pin the earliest unplayed copy to a manual queue slot, or release it.
///
/// `order_index = None` clears the manual flag and returns the song to
/// automatic ordering.
pub async fn set_order_index(
    pool: &SqlitePool,
    handle: &str,
    external_id: &str,
    order_index: Option<i64>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE songs SET is_manual = ?, order_index = ?
        WHERE id = (
            SELECT id FROM songs
            WHERE party_handle = ? AND external_id = ? AND played_at IS NULL
            ORDER BY added_at ASC, id ASC LIMIT 1
        )
        "#,
    )
    .bind(order_index.is_some() as i64)
    .bind(order_index)
    .bind(handle)
    .bind(external_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_memory, init::initialize_database, parties};
    use micdrop_common::Party;

    async fn test_pool() -> SqlitePool {
        let pool = connect_memory().await.unwrap();
        initialize_database(&pool).await.unwrap();
        parties::insert(&pool, &Party::new("p".to_string()))
            .await
            .unwrap();
        pool
    }

    fn song(external_id: &str, singer: &str) -> Song {
        Song::new(
            external_id.to_string(),
            format!("Title {}", external_id),
            "https://img.example/cover.jpg".to_string(),
            singer.to_string(),
            Some("PT3M".to_string()),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn insert_and_list_keeps_submission_order() {
        let pool = test_pool().await;
        // Same added_at millisecond is possible in a burst; the row id
        // keeps the order deterministic.
        let mut a = song("e1", "alice");
        let mut b = song("e2", "bob");
        b.added_at = a.added_at;
        a.tie_breaker = 7;
        b.tie_breaker = 3;

        insert(&pool, "p", &a).await.unwrap();
        insert(&pool, "p", &b).await.unwrap();

        let listed = list(&pool, "p").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].external_id, "e1");
        assert_eq!(listed[1].external_id, "e2");
        assert_eq!(listed[0].tie_breaker, 7);
    }

    #[tokio::test]
    async fn mark_played_targets_earliest_unplayed() {
        let pool = test_pool().await;
        let mut first = song("dup", "alice");
        first.played_at = Some(Utc::now());
        insert(&pool, "p", &first).await.unwrap();
        insert(&pool, "p", &song("dup", "bob")).await.unwrap();

        let now = Utc::now();
        assert!(mark_played(&pool, "p", "dup", now).await.unwrap());

        let listed = list(&pool, "p").await.unwrap();
        assert!(listed.iter().all(|s| s.played_at.is_some()));

        // Nothing unplayed left, so a second call is a no-op.
        assert!(!mark_played(&pool, "p", "dup", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn remove_first_deletes_one_copy() {
        let pool = test_pool().await;
        let mut played = song("dup", "alice");
        played.played_at = Some(Utc::now());
        insert(&pool, "p", &played).await.unwrap();
        insert(&pool, "p", &song("dup", "bob")).await.unwrap();

        assert!(remove_first(&pool, "p", "dup").await.unwrap());
        let listed = list(&pool, "p").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].singer_name, "bob");

        assert!(remove_first(&pool, "p", "dup").await.unwrap());
        assert!(!remove_first(&pool, "p", "dup").await.unwrap());
    }

    #[tokio::test]
    async fn set_order_index_toggles_manual_flag() {
        let pool = test_pool().await;
        insert(&pool, "p", &song("e1", "alice")).await.unwrap();

        assert!(set_order_index(&pool, "p", "e1", Some(0)).await.unwrap());
        let listed = list(&pool, "p").await.unwrap();
        assert!(listed[0].is_manual);
        assert_eq!(listed[0].order_index, Some(0));

        assert!(set_order_index(&pool, "p", "e1", None).await.unwrap());
        let listed = list(&pool, "p").await.unwrap();
        assert!(!listed[0].is_manual);
        assert_eq!(listed[0].order_index, None);
    }

    #[tokio::test]
    async fn set_priority_skips_played_songs() {
        let pool = test_pool().await;
        let mut played = song("e1", "alice");
        played.played_at = Some(Utc::now());
        insert(&pool, "p", &played).await.unwrap();

        assert!(!set_priority(&pool, "p", "e1", true).await.unwrap());
    }
}
