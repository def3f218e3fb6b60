//! Fan-out of reload instructions to connected browser tabs.
//!
//! The [`Broadcaster`] owns the set of live [`ReloadChannel`]s. Each channel
//! is backed by its own bounded queue, so `notify` never waits on a slow
//! reader: a full queue already holds a pending reload and the new one is
//! coalesced into it, a closed queue gets its channel unregistered.
//!
//! `notify` calls are serialized by a dedicated lock, which is what keeps
//! per-channel delivery in call order. Registration and removal go through
//! the sharded channel map and never contend with that lock. Registration
//! and shutdown share a second lock so that no channel is added once the
//! shutdown sweep has run.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Queue depth of a single channel.
const CHANNEL_CAPACITY: usize = 16;

pub type ChannelId = u64;

/// Tells a browser tab to reload.
///
/// Serialized as `{"type":"reload","seq":1,"paths":["/docs/a.md"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "reload")]
pub struct ReloadInstruction {
    /// Position of the originating `notify` call, strictly increasing.
    pub seq: u64,
    pub paths: Vec<PathBuf>,
}

/// Outcome of a single [`Broadcaster::notify`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Instructions queued on a channel.
    pub delivered: usize,
    /// Channels that already had a reload pending.
    pub coalesced: usize,
    /// Channels found dead and unregistered.
    pub dropped: usize,
}

#[derive(Debug)]
struct Registration {
    tx: mpsc::Sender<ReloadInstruction>,
    alive: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Registry {
    channels: DashMap<ChannelId, Registration>,
    next_id: AtomicU64,
    next_seq: AtomicU64,
    notify_lock: Mutex<()>,
    lifecycle_lock: Mutex<()>,
    closed: AtomicBool,
}

impl Registry {
    fn unregister(&self, id: ChannelId) -> bool {
        match self.channels.remove(&id) {
            Some((_, registration)) => {
                registration.alive.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }
}

/// The registry of live reload channels.
///
/// Cloning hands out another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    inner: Arc<Registry>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a channel for a newly connected client.
    ///
    /// After [`Broadcaster::shutdown`] the returned channel is already closed.
    pub fn register(&self) -> ReloadChannel {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let alive = Arc::new(AtomicBool::new(true));

        let _guard = self.inner.lifecycle_lock.lock();
        if self.inner.closed.load(Ordering::Acquire) {
            alive.store(false, Ordering::Release);
        } else {
            self.inner.channels.insert(
                id,
                Registration {
                    tx,
                    alive: alive.clone(),
                },
            );
            tracing::debug!(channel = id, total = self.len(), "Registered reload channel");
        }

        ReloadChannel {
            id,
            created_at: Instant::now(),
            alive,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Removes a channel; it observes no instruction after this returns.
    pub fn unregister(&self, id: ChannelId) -> bool {
        let removed = self.inner.unregister(id);
        if removed {
            tracing::debug!(channel = id, total = self.len(), "Unregistered reload channel");
        }
        removed
    }

    /// Queues one reload instruction on every registered channel.
    pub fn notify(&self, paths: Vec<PathBuf>) -> NotifyReport {
        let _guard = self.inner.notify_lock.lock();

        let instruction = ReloadInstruction {
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed) + 1,
            paths,
        };

        let mut report = NotifyReport::default();
        let mut dead = Vec::new();

        for entry in self.inner.channels.iter() {
            match entry.value().tx.try_send(instruction.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => report.coalesced += 1,
                Err(TrySendError::Closed(_)) => dead.push(*entry.key()),
            }
        }

        // Removal needs the shard's write lock, the iteration above is done.
        for id in dead {
            if self.inner.unregister(id) {
                report.dropped += 1;
            }
        }

        tracing::debug!(
            seq = instruction.seq,
            paths = instruction.paths.len(),
            delivered = report.delivered,
            coalesced = report.coalesced,
            dropped = report.dropped,
            "Broadcast reload"
        );

        report
    }

    /// Closes every channel and refuses new ones.
    pub fn shutdown(&self) {
        let _guard = self.inner.lifecycle_lock.lock();
        self.inner.closed.store(true, Ordering::Release);
        let ids: Vec<_> = self.inner.channels.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.inner.unregister(id);
        }
        tracing::debug!("Closed all reload channels");
    }

    pub fn len(&self) -> usize {
        self.inner.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.channels.is_empty()
    }
}

/// The receiving end held by one connected client.
///
/// Dropping it unregisters it.
#[derive(Debug)]
pub struct ReloadChannel {
    id: ChannelId,
    created_at: Instant,
    alive: Arc<AtomicBool>,
    rx: mpsc::Receiver<ReloadInstruction>,
    registry: Weak<Registry>,
}

impl ReloadChannel {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Next instruction, `None` once the channel has been unregistered.
    ///
    /// Instructions still queued at unregistration time are discarded.
    pub async fn recv(&mut self) -> Option<ReloadInstruction> {
        if !self.is_alive() {
            return None;
        }
        let instruction = self.rx.recv().await?;
        self.is_alive().then_some(instruction)
    }
}

impl Drop for ReloadChannel {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}
