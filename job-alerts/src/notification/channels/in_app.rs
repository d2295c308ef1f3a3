//! In-app feed channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ChannelSender, Delivery};
use crate::Result;
use crate::domain::Channel;
use crate::notification::feed::NotificationFeed;
use crate::notification::payload::NotificationPayload;

/// Creates a notification in the store and the feed cache.
pub struct InAppSender {
    feed: Arc<NotificationFeed>,
}

impl InAppSender {
    pub fn new(feed: Arc<NotificationFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl ChannelSender for InAppSender {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<Delivery> {
        let created = self.feed.create(payload.to_draft()).await?;
        debug!(
            id = %created.id,
            job_id = %payload.job_id,
            user_id = %payload.recipient.user_id,
            "In-app notification created"
        );
        Ok(Delivery::Created(created))
    }

    /// Reload the feed and look for a notification of the same job and user.
    async fn reconcile(&self, payload: &NotificationPayload) -> Result<Option<Delivery>> {
        let entries = self.feed.load().await?;
        let found = entries.into_iter().find(|n| {
            n.job_id.as_deref() == Some(payload.job_id.as_str())
                && n.user_id.as_deref() == Some(payload.recipient.user_id.as_str())
        });
        if let Some(n) = &found {
            debug!(id = %n.id, job_id = %payload.job_id, "Unanswered send found in store");
        }
        Ok(found.map(Delivery::Created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobPosting, UserProfile};
    use crate::matching::MatchResult;
    use crate::notification::payload::Recipient;
    use crate::store::fake::FakeStore;

    fn payload(user_id: &str) -> NotificationPayload {
        let job = JobPosting::new("J1", "Engineer", "Acme");
        let result = MatchResult {
            user_id: user_id.to_string(),
            is_match: true,
            score: 82.0,
            reason: "skills overlap".to_string(),
        };
        let user = UserProfile::new(user_id);
        NotificationPayload::build(&job, &result, Recipient::from(&user), "")
    }

    #[tokio::test]
    async fn test_send_creates_feed_entry() {
        let store = Arc::new(FakeStore::new());
        let feed = Arc::new(NotificationFeed::new(store.clone()));
        let sender = InAppSender::new(feed.clone());
        let payload = payload("U1");

        let delivery = sender.send(&payload).await.unwrap();
        assert_eq!(delivery.notification_id(), Some("N1"));
        assert_eq!(feed.len(), 1);
        assert_eq!(store.records()[0].job_id.as_deref(), Some("J1"));
    }

    #[tokio::test]
    async fn test_reconcile_finds_record_saved_behind_the_cache() {
        let store = Arc::new(FakeStore::new());
        let feed = Arc::new(NotificationFeed::new(store.clone()));
        let sender = InAppSender::new(feed.clone());

        assert!(sender.reconcile(&payload("U1")).await.unwrap().is_none());

        store.push_record(payload("U1").to_draft().into_notification("N7"));
        let found = sender.reconcile(&payload("U1")).await.unwrap();
        assert_eq!(found.as_ref().and_then(Delivery::notification_id), Some("N7"));
        assert_eq!(feed.len(), 1);
        assert!(sender.reconcile(&payload("U2")).await.unwrap().is_none());
    }
}
