//! In-memory notification feed mirrored from the remote store.
//!
//! The feed owns the cache. Whole-collection operations (`load`, mark all
//! read) take the collection gate exclusively; operations on a single
//! notification take it shared plus a per-id lock, so a remote call and the
//! matching cache write never interleave with another write to the same
//! entry, and a reload never mixes stale and fresh data.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLockReadGuard, RwLockWriteGuard, broadcast};
use tracing::{debug, info, warn};

use super::notice::Notice;
use crate::Result;
use crate::domain::{Notification, NotificationDraft};
use crate::store::NotificationStore;

/// Broadcast channel capacity for notices.
const NOTICE_BROADCAST_CAPACITY: usize = 256;

/// Holds the per-id lock (and a shared hold on the collection gate) for the
/// duration of a single-entry mutation.
pub(crate) struct EntryGuard<'a> {
    feed: &'a NotificationFeed,
    id: String,
    lock: Option<OwnedMutexGuard<()>>,
    _shared: RwLockReadGuard<'a, ()>,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        drop(self.lock.take());
        // Only the map still references the lock: nobody is waiting on it.
        self.feed
            .entry_locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// The notification store client: cache plus remote synchronization.
pub struct NotificationFeed {
    store: Arc<dyn NotificationStore>,
    entries: RwLock<Vec<Notification>>,
    gate: tokio::sync::RwLock<()>,
    entry_locks: DashMap<String, Arc<Mutex<()>>>,
    notice_tx: broadcast::Sender<Notice>,
}

impl NotificationFeed {
    /// Create an empty feed backed by `store`. Call [`load`](Self::load) to fill it.
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        let (notice_tx, _) = broadcast::channel(NOTICE_BROADCAST_CAPACITY);
        Self {
            store,
            entries: RwLock::new(Vec::new()),
            gate: tokio::sync::RwLock::new(()),
            entry_locks: DashMap::new(),
            notice_tx,
        }
    }

    /// Subscribe to user-visible notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// Replace the cache with the store's current list, newest first.
    ///
    /// Waits for in-flight mutations to settle. On failure the previous cache
    /// is kept and an error notice is published.
    pub async fn load(&self) -> Result<Vec<Notification>> {
        let _exclusive = self.gate.write().await;

        match self.store.list().await {
            Ok(mut fresh) => {
                fresh.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                let mut seen = HashSet::new();
                fresh.retain(|n| seen.insert(n.id.clone()));

                *self.entries.write() = fresh.clone();
                info!(count = fresh.len(), "Loaded notifications");
                Ok(fresh)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    cached = self.len(),
                    "Failed to load notifications, keeping cached entries"
                );
                self.publish(Notice::error(
                    "Failed to fetch notifications. Please try again later.",
                ));
                Err(e)
            }
        }
    }

    /// Persist a new notification and put the stored record at the front.
    pub async fn create(&self, draft: NotificationDraft) -> Result<Notification> {
        let _shared = self.gate.read().await;

        match self.store.create(&draft).await {
            Ok(created) => {
                {
                    let mut entries = self.entries.write();
                    entries.retain(|n| n.id != created.id);
                    entries.insert(0, created.clone());
                }
                debug!(id = %created.id, job_id = ?created.job_id, "Notification added to feed");
                self.publish(Notice::info(created.title.clone(), created.message.clone()));
                Ok(created)
            }
            Err(e) => {
                warn!(error = %e, title = %draft.title, "Failed to add notification");
                self.publish(Notice::error(
                    "Failed to add notification. Please try again later.",
                ));
                Err(e)
            }
        }
    }

    /// Copy of the cached notifications, newest first.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.entries.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.entries.read().iter().find(|n| n.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.read().iter().filter(|n| !n.read).count()
    }

    pub(crate) fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub(crate) fn publish(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.notice_tx.send(notice);
    }

    /// Sender side of the notice broadcast, for components outside the feed.
    pub(crate) fn notice_sender(&self) -> broadcast::Sender<Notice> {
        self.notice_tx.clone()
    }

    /// Serialize a mutation of the entry `id` against other mutations.
    pub(crate) async fn lock_entry(&self, id: &str) -> EntryGuard<'_> {
        let shared = self.gate.read().await;
        let lock = self
            .entry_locks
            .entry(id.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;
        EntryGuard {
            feed: self,
            id: id.to_string(),
            lock: Some(guard),
            _shared: shared,
        }
    }

    /// Exclusive access for whole-collection mutations.
    pub(crate) async fn lock_all(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Apply a local change to the cache.
    pub(crate) fn apply<R>(&self, f: impl FnOnce(&mut Vec<Notification>) -> R) -> R {
        f(&mut self.entries.write())
    }
}
