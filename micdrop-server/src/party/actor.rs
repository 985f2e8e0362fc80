//! Party session actor
//!
//! One tokio task per party owns that party's authoritative state: the
//! persisted row, the full song list, and the broadcast channel all
//! attached screens listen on. All access goes through the mailbox, so
//! commands, connects and the expiry deadline are strictly serialized.
//!
//! Every mutation follows the same sequence: validate, write to
//! SQLite, commit to memory, bump the activity timestamp, broadcast
//! the freshly assembled snapshot. A persistence failure aborts the
//! sequence before the memory commit, so no broadcast can ever carry
//! state that is not durable.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, mpsc, oneshot};

use micdrop_common::wire::{ClientMessage, PartySettings, PartyView, RawPartyView};
use micdrop_common::{Error, Party, PartyStatus, Result, Song};

use crate::catalog::Catalog;
use crate::db::{parties, songs};
use crate::queue::assemble;

const MAILBOX_CAPACITY: usize = 256;

/// Operator controls, separate from the guest message protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorAction {
    Start,
    Pause,
    Close,
    SetFairness {
        enabled: bool,
    },
    /// Pin a song as "now playing", or unpin with `external_id: None`.
    SetCurrentSong {
        external_id: Option<String>,
        remaining_seconds: Option<i64>,
    },
    SetPriority {
        external_id: String,
        is_priority: bool,
    },
    /// Assign or clear a fixed queue slot.
    SetPosition {
        external_id: String,
        order_index: Option<i64>,
    },
}

/// Mailbox commands; each carries the channel its reply goes out on.
pub(crate) enum Command {
    Message {
        msg: ClientMessage,
        reply: oneshot::Sender<Result<PartyView>>,
    },
    Operator {
        action: OperatorAction,
        reply: oneshot::Sender<Result<PartyView>>,
    },
    Connect {
        reply: oneshot::Sender<Result<(PartyView, broadcast::Receiver<PartyView>)>>,
    },
    Snapshot {
        reply: oneshot::Sender<PartyView>,
    },
    Raw {
        reply: oneshot::Sender<RawPartyView>,
    },
}

/// Why a call into the actor failed at the transport level.
///
/// Either way the actor is gone (usually expired between lookup and
/// send); the registry reacts by spawning a fresh one and retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallError {
    MailboxClosed,
    ActorStopped,
}

/// Cheap cloneable handle to one party's actor task.
#[derive(Clone)]
pub struct PartyClient {
    tx: mpsc::Sender<Command>,
}

impl PartyClient {
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn same_channel(&self, other: &PartyClient) -> bool {
        self.tx.same_channel(&other.tx)
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> std::result::Result<T, CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| CallError::MailboxClosed)?;
        reply_rx.await.map_err(|_| CallError::ActorStopped)
    }

    pub(crate) async fn message(
        &self,
        msg: ClientMessage,
    ) -> std::result::Result<Result<PartyView>, CallError> {
        self.call(|reply| Command::Message { msg, reply }).await
    }

    pub(crate) async fn operator(
        &self,
        action: OperatorAction,
    ) -> std::result::Result<Result<PartyView>, CallError> {
        self.call(|reply| Command::Operator { action, reply }).await
    }

    pub(crate) async fn connect(
        &self,
    ) -> std::result::Result<Result<(PartyView, broadcast::Receiver<PartyView>)>, CallError> {
        self.call(|reply| Command::Connect { reply }).await
    }

    pub(crate) async fn snapshot(&self) -> std::result::Result<PartyView, CallError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    pub(crate) async fn raw(&self) -> std::result::Result<RawPartyView, CallError> {
        self.call(|reply| Command::Raw { reply }).await
    }
}

/// The actor itself. Constructed by the registry, consumed by `run`.
pub(crate) struct PartyActor {
    pool: SqlitePool,
    catalog: Option<Arc<dyn Catalog>>,
    party: Party,
    songs: Vec<Song>,
    ttl: Duration,
    rx: mpsc::Receiver<Command>,
    broadcast_tx: broadcast::Sender<PartyView>,
}

impl PartyActor {
    pub(crate) fn new(
        pool: SqlitePool,
        catalog: Option<Arc<dyn Catalog>>,
        party: Party,
        songs: Vec<Song>,
        ttl: Duration,
        broadcast_capacity: usize,
    ) -> (PartyActor, PartyClient) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(broadcast_capacity);
        let actor = PartyActor {
            pool,
            catalog,
            party,
            songs,
            ttl,
            rx,
            broadcast_tx,
        };
        (actor, PartyClient { tx })
    }

    /// Main loop: serve the mailbox until the sliding inactivity
    /// deadline fires or every handle is dropped.
    pub(crate) async fn run(mut self) {
        tracing::debug!(handle = %self.party.handle, "party actor started");
        loop {
            let idle = (Utc::now() - self.party.last_activity_at)
                .to_std()
                .unwrap_or_default();
            let remaining = self.ttl.saturating_sub(idle);

            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        tracing::debug!(handle = %self.party.handle, "all handles dropped, actor stopping");
                        break;
                    }
                },
                _ = tokio::time::sleep(remaining) => {
                    self.expire().await;
                    break;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Message { msg, reply } => {
                let result = self.apply_message(msg).await;
                let _ = reply.send(result);
            }
            Command::Operator { action, reply } => {
                let result = self.apply_operator(action).await;
                let _ = reply.send(result);
            }
            Command::Connect { reply } => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.view());
            }
            Command::Raw { reply } => {
                let _ = reply.send(self.raw_view());
            }
        }
    }

    fn view(&self) -> PartyView {
        let assembled = assemble(&self.party, &self.songs);
        PartyView {
            current_song: assembled.current_song,
            unplayed: assembled.unplayed,
            played: assembled.played,
            remaining_seconds: assembled.remaining_seconds,
            settings: PartySettings {
                fairness_enabled: self.party.fairness_enabled,
            },
            status: self.party.status,
        }
    }

    fn raw_view(&self) -> RawPartyView {
        RawPartyView {
            songs: self.songs.clone(),
            settings: PartySettings {
                fairness_enabled: self.party.fairness_enabled,
            },
            status: self.party.status,
        }
    }

    /// Persist and commit a new activity timestamp, re-arming expiry.
    async fn touch(&mut self) -> Result<()> {
        let now = Utc::now();
        parties::touch(&self.pool, &self.party.handle, now).await?;
        self.party.last_activity_at = now;
        Ok(())
    }

    /// Persist-then-commit a party row change. On write failure the
    /// in-memory party is left untouched.
    async fn update_party(&mut self, mutate: impl FnOnce(&mut Party)) -> Result<()> {
        let mut updated = self.party.clone();
        mutate(&mut updated);
        parties::update(&self.pool, &updated).await?;
        self.party = updated;
        Ok(())
    }

    async fn connect(&mut self) -> Result<(PartyView, broadcast::Receiver<PartyView>)> {
        self.touch().await?;
        Ok((self.view(), self.broadcast_tx.subscribe()))
    }

    async fn apply_message(&mut self, msg: ClientMessage) -> Result<PartyView> {
        if self.party.status == PartyStatus::Closed {
            tracing::warn!(handle = %self.party.handle, "message rejected, party is closed");
            return Err(Error::PartyClosed(self.party.handle.clone()));
        }

        match msg {
            ClientMessage::AddSong {
                external_id,
                title,
                cover_url,
                singer_name,
                duration_iso,
                artist_hint,
                song_hint,
            } => {
                self.add_song(
                    external_id,
                    title,
                    cover_url,
                    singer_name,
                    duration_iso,
                    artist_hint,
                    song_hint,
                )
                .await?
            }
            ClientMessage::RemoveSong { external_id } => self.remove_song(&external_id).await?,
            ClientMessage::MarkPlayed { external_id } => self.mark_played(&external_id).await?,
        }

        self.touch().await?;
        let view = self.view();
        let _ = self.broadcast_tx.send(view.clone());
        Ok(view)
    }

    #[allow(clippy::too_many_arguments)]
    async fn add_song(
        &mut self,
        external_id: String,
        title: String,
        cover_url: String,
        singer_name: String,
        duration_iso: Option<String>,
        artist_hint: Option<String>,
        song_hint: Option<String>,
    ) -> Result<()> {
        let duplicate = self
            .songs
            .iter()
            .any(|s| s.is_unplayed() && s.external_id == external_id);
        if duplicate {
            tracing::debug!(
                handle = %self.party.handle,
                external_id = %external_id,
                "duplicate add ignored"
            );
            return Ok(());
        }

        let mut song = Song::new(
            external_id,
            title,
            cover_url,
            singer_name,
            duration_iso,
            artist_hint,
            song_hint,
        );

        // Best-effort artist/song split of the raw video title; a
        // failed lookup never fails the add.
        if song.artist_hint.is_none() && song.song_hint.is_none() {
            if let Some(catalog) = &self.catalog {
                match catalog.match_track(&song.title).await {
                    Ok(Some(matched)) => {
                        song.artist_hint = Some(matched.artist);
                        song.song_hint = Some(matched.song);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(handle = %self.party.handle, error = %e, "track match failed")
                    }
                }
            }
        }

        songs::insert(&self.pool, &self.party.handle, &song).await?;
        self.songs.push(song);
        Ok(())
    }

    async fn remove_song(&mut self, external_id: &str) -> Result<()> {
        let Some(pos) = self
            .songs
            .iter()
            .position(|s| s.external_id == external_id)
        else {
            return Ok(());
        };

        songs::remove_first(&self.pool, &self.party.handle, external_id).await?;
        self.songs.remove(pos);

        // The pin must keep referencing an existing unplayed song.
        let pin_dangling = self.party.current_song_eid.as_deref() == Some(external_id)
            && !self
                .songs
                .iter()
                .any(|s| s.is_unplayed() && s.external_id == external_id);
        if pin_dangling {
            self.update_party(|p| p.clear_current_song()).await?;
        }
        Ok(())
    }

    async fn mark_played(&mut self, external_id: &str) -> Result<()> {
        let Some(pos) = self
            .songs
            .iter()
            .position(|s| s.is_unplayed() && s.external_id == external_id)
        else {
            // Already played or never existed; idempotent.
            return Ok(());
        };

        let now = Utc::now();
        if songs::mark_played(&self.pool, &self.party.handle, external_id, now).await? {
            self.songs[pos].played_at = Some(now);
        }

        if self.party.current_song_eid.as_deref() == Some(external_id) {
            self.update_party(|p| p.clear_current_song()).await?;
        }
        Ok(())
    }

    async fn apply_operator(&mut self, action: OperatorAction) -> Result<PartyView> {
        if self.party.status == PartyStatus::Closed {
            tracing::warn!(handle = %self.party.handle, "operator action rejected, party is closed");
            return Err(Error::PartyClosed(self.party.handle.clone()));
        }

        match action {
            OperatorAction::SetPriority {
                external_id,
                is_priority,
            } => {
                let Some(pos) = self
                    .songs
                    .iter()
                    .position(|s| s.is_unplayed() && s.external_id == external_id)
                else {
                    return Err(Error::NotFound(format!(
                        "no unplayed song '{}' in party",
                        external_id
                    )));
                };
                songs::set_priority(&self.pool, &self.party.handle, &external_id, is_priority)
                    .await?;
                self.songs[pos].is_priority = is_priority;
            }
            OperatorAction::SetPosition {
                external_id,
                order_index,
            } => {
                if order_index.is_some_and(|i| i < 0) {
                    return Err(Error::InvalidInput("orderIndex must be >= 0".to_string()));
                }
                let Some(pos) = self
                    .songs
                    .iter()
                    .position(|s| s.is_unplayed() && s.external_id == external_id)
                else {
                    return Err(Error::NotFound(format!(
                        "no unplayed song '{}' in party",
                        external_id
                    )));
                };
                songs::set_order_index(&self.pool, &self.party.handle, &external_id, order_index)
                    .await?;
                self.songs[pos].is_manual = order_index.is_some();
                self.songs[pos].order_index = order_index;
            }
            OperatorAction::Start => {
                self.update_party(|p| p.status = PartyStatus::Started).await?
            }
            OperatorAction::Pause => {
                self.update_party(|p| {
                    p.status = PartyStatus::Open;
                    p.clear_current_song();
                })
                .await?
            }
            OperatorAction::Close => {
                self.update_party(|p| {
                    p.status = PartyStatus::Closed;
                    p.clear_current_song();
                })
                .await?
            }
            OperatorAction::SetFairness { enabled } => {
                self.update_party(|p| p.fairness_enabled = enabled).await?
            }
            OperatorAction::SetCurrentSong {
                external_id,
                remaining_seconds,
            } => match external_id {
                Some(eid) => {
                    let exists = self
                        .songs
                        .iter()
                        .any(|s| s.is_unplayed() && s.external_id == eid);
                    if !exists {
                        return Err(Error::NotFound(format!(
                            "no unplayed song '{}' in party",
                            eid
                        )));
                    }
                    self.update_party(|p| {
                        p.current_song_eid = Some(eid);
                        p.current_song_started_at = Some(Utc::now());
                        p.current_song_remaining_secs = remaining_seconds;
                    })
                    .await?
                }
                None => self.update_party(|p| p.clear_current_song()).await?,
            },
        }

        self.touch().await?;
        let view = self.view();
        let _ = self.broadcast_tx.send(view.clone());
        Ok(view)
    }

    /// Deadline fired with no intervening activity: wipe everything.
    async fn expire(&mut self) {
        tracing::info!(handle = %self.party.handle, "party expired, wiping durable state");
        if let Err(e) = parties::wipe(&self.pool, &self.party.handle).await {
            // The row stays behind; the background sweeper retries it.
            tracing::error!(handle = %self.party.handle, error = %e, "failed to wipe expired party");
        }
    }
}
