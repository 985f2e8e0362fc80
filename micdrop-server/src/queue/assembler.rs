//! Queue assembly
//!
//! Turns the flat stored song list into the ordered view a party sees:
//! the pinned current song first, then priority songs, then the
//! standard pool ordered by singer rotation (or raw submission order
//! when fairness is off) with operator-pinned manual slots merged in.

use micdrop_common::{Party, PartyStatus, Song};

use super::fairness::round_robin;

/// Assembled queue for one party, ready to serialize.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledQueue {
    pub current_song: Option<Song>,
    pub unplayed: Vec<Song>,
    pub played: Vec<Song>,
    pub remaining_seconds: Option<i64>,
}

impl AssembledQueue {
    pub fn empty() -> Self {
        AssembledQueue {
            current_song: None,
            unplayed: Vec::new(),
            played: Vec::new(),
            remaining_seconds: None,
        }
    }
}

/// Assemble the play order for `party` from its stored songs.
///
/// `songs` must be in submission order; played history and queue
/// ordering are derived here. The returned partitions are complete:
/// every input song appears exactly once in `current_song`, `unplayed`
/// or `played`.
pub fn assemble(party: &Party, songs: &[Song]) -> AssembledQueue {
    let (played, mut unplayed): (Vec<Song>, Vec<Song>) =
        songs.iter().cloned().partition(|s| s.played_at.is_some());

    // The pin only applies while the party is running. A ref to a
    // missing or already-played song is ignored.
    let mut pinned: Option<Song> = None;
    if party.status == PartyStatus::Started {
        if let Some(eid) = &party.current_song_eid {
            if let Some(pos) = unplayed.iter().position(|s| &s.external_id == eid) {
                pinned = Some(unplayed.remove(pos));
            }
        }
    }

    let (priority, standard): (Vec<Song>, Vec<Song>) =
        unplayed.into_iter().partition(|s| s.is_priority);

    let standard_ordered = if party.fairness_enabled {
        let (manual, floating): (Vec<Song>, Vec<Song>) = standard
            .into_iter()
            .partition(|s| s.is_manual && s.order_index.is_some());

        let deprioritized: Option<String> = played
            .iter()
            .max_by_key(|s| s.played_at)
            .map(|s| s.singer_name.clone());

        let sorted_floating = round_robin(floating, deprioritized.as_deref());
        merge_manual(manual, sorted_floating)
    } else {
        standard
    };

    let mut final_queue = Vec::with_capacity(
        pinned.is_some() as usize + priority.len() + standard_ordered.len(),
    );
    if let Some(p) = pinned {
        final_queue.push(p);
    }
    final_queue.extend(priority);
    final_queue.extend(standard_ordered);

    let mut played_out = played;
    played_out.sort_by(|a, b| b.played_at.cmp(&a.played_at));

    // Explicit operator hint beats the duration derived from the head
    // of the queue.
    let remaining_seconds = party
        .current_song_remaining_secs
        .or_else(|| final_queue.first().and_then(|s| s.duration_seconds()));

    // Only a running party distinguishes "now playing" from the rest
    // of the queue.
    let (current_song, unplayed) = match party.status {
        PartyStatus::Started => {
            let mut iter = final_queue.into_iter();
            let current = iter.next();
            (current, iter.collect())
        }
        PartyStatus::Open | PartyStatus::Closed => (None, final_queue),
    };

    AssembledQueue {
        current_song,
        unplayed,
        played: played_out,
        remaining_seconds,
    }
}

/// Merge manual items into the ordered floating items by slot index.
///
/// Walks slots `0..total`; a slot goes to the first still-unplaced
/// manual item requesting it, otherwise to the next floating item.
/// Manual items whose slot never comes up (index out of range, or a
/// collision already resolved in favor of an earlier submission) are
/// appended at the end in submission order.
fn merge_manual(manual: Vec<Song>, floating: Vec<Song>) -> Vec<Song> {
    if manual.is_empty() {
        return floating;
    }

    let total = manual.len() + floating.len();
    let mut manual: Vec<Option<Song>> = manual.into_iter().map(Some).collect();
    let mut floating = floating.into_iter();
    let mut merged = Vec::with_capacity(total);

    for slot in 0..total {
        let claimant = manual.iter_mut().find(|entry| {
            entry
                .as_ref()
                .is_some_and(|s| s.order_index == Some(slot as i64))
        });
        if let Some(entry) = claimant {
            if let Some(song) = entry.take() {
                merged.push(song);
            }
        } else if let Some(song) = floating.next() {
            merged.push(song);
        }
    }

    merged.extend(floating);
    merged.extend(manual.into_iter().flatten());
    merged
}
