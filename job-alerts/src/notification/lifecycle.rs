//! Read/delete transitions over the feed cache.
//!
//! Every transition calls the store first and touches the cache only after the
//! store accepted it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::feed::NotificationFeed;
use super::notice::Notice;
use crate::{Error, Result};

/// Result of an idempotent lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The store and the cache changed.
    Applied,
    /// Nothing to do: the notification was already in the target state.
    Unchanged,
}

/// Lifecycle manager for cached notifications.
#[derive(Clone)]
pub struct LifecycleManager {
    feed: Arc<NotificationFeed>,
}

impl LifecycleManager {
    pub fn new(feed: Arc<NotificationFeed>) -> Self {
        Self { feed }
    }

    pub fn feed(&self) -> &Arc<NotificationFeed> {
        &self.feed
    }

    /// Mark one notification as read.
    pub async fn mark_as_read(&self, id: &str) -> Result<Transition> {
        let _guard = self.feed.lock_entry(id).await;

        match self.feed.get(id) {
            None => {
                debug!(id, "mark_as_read: notification not in feed");
                return Err(Error::not_found("Notification", id));
            }
            Some(n) if n.read => return Ok(Transition::Unchanged),
            Some(_) => {}
        }

        match self.feed.store().mark_read(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(id, "Notification gone from store, evicting");
                self.feed.apply(|entries| entries.retain(|n| n.id != id));
                return Err(e);
            }
            Err(e) => {
                warn!(id, error = %e, "Failed to mark notification as read");
                self.feed
                    .publish(Notice::error("Failed to mark notification as read"));
                return Err(e);
            }
        }

        self.feed.apply(|entries| {
            if let Some(n) = entries.iter_mut().find(|n| n.id == id) {
                n.read = true;
            }
        });
        debug!(id, "Notification marked as read");
        Ok(Transition::Applied)
    }

    /// Mark every notification as read with one bulk store call.
    ///
    /// Returns how many cached notifications changed. The cache is updated
    /// only if the store call succeeded, and then for every entry at once.
    pub async fn mark_all_as_read(&self) -> Result<usize> {
        let _exclusive = self.feed.lock_all().await;

        if let Err(e) = self.feed.store().mark_all_read().await {
            warn!(error = %e, "Failed to mark all notifications as read");
            self.feed
                .publish(Notice::error("Failed to mark all notifications as read"));
            return Err(e);
        }

        let changed = self.feed.apply(|entries| {
            let mut changed = 0;
            for n in entries.iter_mut().filter(|n| !n.read) {
                n.read = true;
                changed += 1;
            }
            changed
        });
        info!(changed, "Marked all notifications as read");
        Ok(changed)
    }

    /// Delete one notification.
    ///
    /// If the store reports the notification as already gone, the cached
    /// entry is dropped as well and the call reports [`Transition::Unchanged`].
    pub async fn delete_notification(&self, id: &str) -> Result<Transition> {
        let _guard = self.feed.lock_entry(id).await;

        if self.feed.get(id).is_none() {
            debug!(id, "delete_notification: notification not in feed");
            return Err(Error::not_found("Notification", id));
        }

        let transition = match self.feed.store().delete(id).await {
            Ok(()) => Transition::Applied,
            Err(e) if e.is_not_found() => {
                debug!(id, "Notification already deleted in store, evicting");
                Transition::Unchanged
            }
            Err(e) => {
                warn!(id, error = %e, "Failed to delete notification");
                self.feed.publish(Notice::error("Failed to delete notification"));
                return Err(e);
            }
        };

        self.feed.apply(|entries| entries.retain(|n| n.id != id));
        debug!(id, ?transition, "Notification deleted");
        Ok(transition)
    }
}
