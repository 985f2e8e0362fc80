//! Party registry
//!
//! Concurrency-safe map from party handle to the live actor owning
//! that party. Actors are spawned on first access (loading or creating
//! the durable state), remove themselves from the map when they stop,
//! and a background sweeper wipes parties that expired while no actor
//! was loaded, e.g. across a server restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::{broadcast, RwLock};

use micdrop_common::model::is_valid_handle;
use micdrop_common::wire::{ClientMessage, PartyView, RawPartyView};
use micdrop_common::{Error, Party, Result};

use crate::catalog::Catalog;
use crate::db::{parties, songs};
use crate::party::actor::{OperatorAction, PartyActor, PartyClient};

/// A call is retried once when it hits an actor that expired between
/// lookup and reply.
const CALL_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct PartyRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    pool: SqlitePool,
    catalog: Option<Arc<dyn Catalog>>,
    ttl: Duration,
    broadcast_capacity: usize,
    parties: RwLock<HashMap<String, PartyClient>>,
}

impl PartyRegistry {
    pub fn new(
        pool: SqlitePool,
        catalog: Option<Arc<dyn Catalog>>,
        ttl: Duration,
        broadcast_capacity: usize,
    ) -> Self {
        PartyRegistry {
            inner: Arc::new(Inner {
                pool,
                catalog,
                ttl,
                broadcast_capacity,
                parties: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Mint a fresh party under a server-generated unguessable handle.
    pub async fn mint(&self) -> Result<String> {
        let handle = uuid::Uuid::new_v4().to_string();
        let party = Party::new(handle.clone());
        parties::insert(&self.inner.pool, &party).await?;
        tracing::info!(handle = %handle, "party created");
        Ok(handle)
    }

    /// Route a protocol message to the party, creating it on first
    /// write. Returns the fresh assembled snapshot.
    pub async fn message(&self, handle: &str, msg: ClientMessage) -> Result<PartyView> {
        self.require_valid(handle)?;
        for _ in 0..CALL_ATTEMPTS {
            let Some(client) = self.client(handle, true).await? else {
                break;
            };
            match client.message(msg.clone()).await {
                Ok(result) => return result,
                Err(_) => continue,
            }
        }
        Err(Error::Internal(format!(
            "party '{}' actor unavailable",
            handle
        )))
    }

    /// Route an operator action, creating the party on first write.
    pub async fn operator(&self, handle: &str, action: OperatorAction) -> Result<PartyView> {
        self.require_valid(handle)?;
        for _ in 0..CALL_ATTEMPTS {
            let Some(client) = self.client(handle, true).await? else {
                break;
            };
            match client.operator(action.clone()).await {
                Ok(result) => return result,
                Err(_) => continue,
            }
        }
        Err(Error::Internal(format!(
            "party '{}' actor unavailable",
            handle
        )))
    }

    /// Attach a connection: counts as activity, lazily creates the
    /// party, and returns the initial snapshot plus the broadcast
    /// receiver for everything that follows it.
    ///
    /// Subscribing inside the actor guarantees no snapshot can fall
    /// between the initial state and the first received broadcast.
    pub async fn connect(
        &self,
        handle: &str,
    ) -> Result<(PartyView, broadcast::Receiver<PartyView>)> {
        self.require_valid(handle)?;
        for _ in 0..CALL_ATTEMPTS {
            let Some(client) = self.client(handle, true).await? else {
                break;
            };
            match client.connect().await {
                Ok(result) => return result,
                Err(_) => continue,
            }
        }
        Err(Error::Internal(format!(
            "party '{}' actor unavailable",
            handle
        )))
    }

    /// Assembled snapshot of an existing party. Reads never create.
    pub async fn snapshot(&self, handle: &str) -> Result<PartyView> {
        self.require_valid(handle)?;
        for _ in 0..CALL_ATTEMPTS {
            let Some(client) = self.client(handle, false).await? else {
                return Err(Error::NotFound(format!("party '{}' not found", handle)));
            };
            match client.snapshot().await {
                Ok(view) => return Ok(view),
                Err(_) => continue,
            }
        }
        Err(Error::Internal(format!(
            "party '{}' actor unavailable",
            handle
        )))
    }

    /// Raw persisted state of an existing party, without assembly.
    pub async fn raw_state(&self, handle: &str) -> Result<RawPartyView> {
        self.require_valid(handle)?;
        for _ in 0..CALL_ATTEMPTS {
            let Some(client) = self.client(handle, false).await? else {
                return Err(Error::NotFound(format!("party '{}' not found", handle)));
            };
            match client.raw().await {
                Ok(view) => return Ok(view),
                Err(_) => continue,
            }
        }
        Err(Error::Internal(format!(
            "party '{}' actor unavailable",
            handle
        )))
    }

    /// Periodically wipe parties that expired with no live actor.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        let period = sweep_period(registry.inner.ttl);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately, clearing restart leftovers.
            loop {
                ticker.tick().await;
                if let Err(e) = registry.sweep().await {
                    tracing::error!(error = %e, "expiry sweep failed");
                }
            }
        })
    }

    async fn sweep(&self) -> Result<()> {
        let cutoff = expiry_cutoff(self.inner.ttl);
        let candidates = parties::expired_handles(&self.inner.pool, cutoff).await?;
        for handle in candidates {
            let has_live_actor = {
                let map = self.inner.parties.read().await;
                map.get(&handle).is_some_and(|c| !c.is_closed())
            };
            if has_live_actor {
                // Its own deadline owns expiry.
                continue;
            }
            if parties::wipe_if_idle(&self.inner.pool, &handle, cutoff).await? {
                tracing::info!(handle = %handle, "swept expired party");
            }
        }
        Ok(())
    }

    fn require_valid(&self, handle: &str) -> Result<()> {
        if is_valid_handle(handle) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "invalid party handle '{}'",
                handle
            )))
        }
    }

    /// Resolve the live client for a handle, spawning the actor if
    /// needed. `create` governs whether a missing party is initialized
    /// (writes and connects) or reported absent (plain reads).
    async fn client(&self, handle: &str, create: bool) -> Result<Option<PartyClient>> {
        {
            let map = self.inner.parties.read().await;
            if let Some(client) = map.get(handle) {
                if !client.is_closed() {
                    return Ok(Some(client.clone()));
                }
            }
        }

        let mut map = self.inner.parties.write().await;
        if let Some(client) = map.get(handle) {
            if !client.is_closed() {
                return Ok(Some(client.clone()));
            }
            map.remove(handle);
        }

        let mut party = parties::get(&self.inner.pool, handle).await?;

        // A party whose deadline passed while nothing was loaded gets
        // wiped here instead of spawning a doomed actor.
        if let Some(p) = &party {
            let idle = (Utc::now() - p.last_activity_at).to_std().unwrap_or_default();
            if idle >= self.inner.ttl {
                tracing::info!(handle = %handle, "party expired while unloaded, wiping");
                parties::wipe_if_idle(&self.inner.pool, handle, expiry_cutoff(self.inner.ttl))
                    .await?;
                party = None;
            }
        }

        let party = match party {
            Some(p) => p,
            None if create => {
                let p = Party::new(handle.to_string());
                parties::insert(&self.inner.pool, &p).await?;
                tracing::info!(handle = %handle, "party created");
                p
            }
            None => return Ok(None),
        };

        let stored_songs = songs::list(&self.inner.pool, handle).await?;
        let (actor, client) = PartyActor::new(
            self.inner.pool.clone(),
            self.inner.catalog.clone(),
            party,
            stored_songs,
            self.inner.ttl,
            self.inner.broadcast_capacity,
        );
        map.insert(handle.to_string(), client.clone());

        // The task scrubs its own map entry on exit, but only if the
        // entry still belongs to it; a respawn may have replaced it.
        let registry = Arc::downgrade(&self.inner);
        let cleanup_key = handle.to_string();
        let cleanup_client = client.clone();
        tokio::spawn(async move {
            actor.run().await;
            if let Some(inner) = registry.upgrade() {
                let mut map = inner.parties.write().await;
                let own_entry = map
                    .get(&cleanup_key)
                    .is_some_and(|c| c.same_channel(&cleanup_client));
                if own_entry {
                    map.remove(&cleanup_key);
                }
            }
        });

        Ok(Some(client))
    }
}

fn expiry_cutoff(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::max_value());
    Utc::now() - ttl
}

fn sweep_period(ttl: Duration) -> Duration {
    (ttl / 4).max(Duration::from_secs(60))
}
