//! Round-robin singer rotation
//!
//! Groups candidate songs into per-singer FIFO buckets and emits them
//! in rounds, so every singer gets one turn before anyone gets a
//! second. Output is fully deterministic: ties inside a round fall
//! back to submission time, then to the song's stored tie breaker.

use std::collections::{HashMap, VecDeque};

use micdrop_common::Song;

/// Interleave `candidates` one-per-singer-per-round.
///
/// Buckets are created in first-appearance order and each keeps its
/// songs in submission order. Every round draws the head of each
/// non-empty bucket, then re-sorts the round by `(added_at,
/// tie_breaker)` ascending.
///
/// When `deprioritized_singer` is set (the singer whose song finished
/// most recently) and their song would lead a round that contains at
/// least one other singer's song, it is moved to the end of that round.
/// They still sing within the same round, they just do not jump
/// straight back to the front.
pub fn round_robin(candidates: Vec<Song>, deprioritized_singer: Option<&str>) -> Vec<Song> {
    let mut singer_order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, VecDeque<Song>> = HashMap::new();
    for song in candidates {
        if !buckets.contains_key(&song.singer_name) {
            singer_order.push(song.singer_name.clone());
        }
        buckets
            .entry(song.singer_name.clone())
            .or_default()
            .push_back(song);
    }

    let mut ordered = Vec::new();
    loop {
        let mut round: Vec<Song> = Vec::new();
        for singer in &singer_order {
            if let Some(bucket) = buckets.get_mut(singer) {
                if let Some(song) = bucket.pop_front() {
                    round.push(song);
                }
            }
        }
        if round.is_empty() {
            break;
        }

        round.sort_by(|a, b| {
            a.added_at
                .cmp(&b.added_at)
                .then(a.tie_breaker.cmp(&b.tie_breaker))
        });

        if let Some(deprioritized) = deprioritized_singer {
            if round.len() >= 2 && round[0].singer_name == deprioritized {
                let head = round.remove(0);
                round.push(head);
            }
        }

        ordered.extend(round);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn song(external_id: &str, singer: &str, added_offset: i64, tie_breaker: i64) -> Song {
        let mut s = Song::new(
            external_id.to_string(),
            format!("Title {}", external_id),
            "https://img.example/c.jpg".to_string(),
            singer.to_string(),
            None,
            None,
            None,
        );
        s.added_at = DateTime::from_timestamp(1_700_000_000 + added_offset, 0).unwrap();
        s.tie_breaker = tie_breaker;
        s
    }

    fn ids(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(|s| s.external_id.as_str()).collect()
    }

    #[test]
    fn one_song_per_singer_per_round() {
        // Submissions interleaved: A1, A2, B1, A3, C1, B2.
        let candidates = vec![
            song("a1", "alice", 0, 0),
            song("a2", "alice", 1, 0),
            song("b1", "bob", 2, 0),
            song("a3", "alice", 3, 0),
            song("c1", "carol", 4, 0),
            song("b2", "bob", 5, 0),
        ];

        let ordered = round_robin(candidates, None);
        assert_eq!(ids(&ordered), vec!["a1", "b1", "c1", "a2", "b2", "a3"]);
    }

    #[test]
    fn round_is_sorted_by_added_at_not_bucket_order() {
        // Bob's first song predates Alice's even though Alice's bucket
        // was created first.
        let candidates = vec![
            song("a1", "alice", 10, 0),
            song("b1", "bob", 5, 0),
        ];

        let ordered = round_robin(candidates, None);
        assert_eq!(ids(&ordered), vec!["b1", "a1"]);
    }

    #[test]
    fn tie_breaker_decides_equal_timestamps() {
        let candidates = vec![
            song("a1", "alice", 0, 9),
            song("b1", "bob", 0, 2),
        ];

        let ordered = round_robin(candidates, None);
        assert_eq!(ids(&ordered), vec!["b1", "a1"]);
    }

    #[test]
    fn deprioritized_singer_moves_to_round_end() {
        let candidates = vec![
            song("d1", "dave", 0, 0),
            song("a1", "alice", 1, 0),
            song("d2", "dave", 2, 0),
            song("a2", "alice", 3, 0),
        ];

        let ordered = round_robin(candidates, Some("dave"));
        // Dave would lead both rounds by timestamp; he is deferred to
        // the end of each round instead, never skipped past a cycle.
        assert_eq!(ids(&ordered), vec!["a1", "d1", "a2", "d2"]);
    }

    #[test]
    fn deprioritized_singer_alone_keeps_the_lead() {
        let candidates = vec![song("d1", "dave", 0, 0), song("d2", "dave", 1, 0)];

        let ordered = round_robin(candidates, Some("dave"));
        assert_eq!(ids(&ordered), vec!["d1", "d2"]);
    }

    #[test]
    fn deprioritization_does_not_touch_non_leading_rounds() {
        // Dave's song is not at the head of the round, so the round is
        // left as sorted.
        let candidates = vec![
            song("a1", "alice", 0, 0),
            song("d1", "dave", 1, 0),
            song("b1", "bob", 2, 0),
        ];

        let ordered = round_robin(candidates, Some("dave"));
        assert_eq!(ids(&ordered), vec!["a1", "d1", "b1"]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(round_robin(Vec::new(), None).is_empty());
        assert!(round_robin(Vec::new(), Some("dave")).is_empty());
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let build = || {
            vec![
                song("a1", "alice", 0, 3),
                song("b1", "bob", 0, 1),
                song("a2", "alice", 2, 8),
                song("c1", "carol", 1, 5),
            ]
        };

        let first = round_robin(build(), Some("bob"));
        let second = round_robin(build(), Some("bob"));
        assert_eq!(ids(&first), ids(&second));
    }
}
