//! Notification channels.
//!
//! This module provides the channels a job-match notification is delivered
//! through:
//! - In-app feed (persisted through the notification store)
//! - Email (handed to the email transport)

mod email;
mod in_app;

pub use email::EmailSender;
pub use in_app::InAppSender;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::payload::NotificationPayload;
use crate::Result;
use crate::domain::{Channel, Notification};
use crate::store::EmailAck;

/// What a channel produced for a successful send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    /// The in-app notification as stored.
    Created(Notification),
    /// The email transport accepted the message.
    Acknowledged(EmailAck),
}

impl Delivery {
    pub fn notification_id(&self) -> Option<&str> {
        match self {
            Self::Created(n) => Some(n.id.as_str()),
            Self::Acknowledged(_) => None,
        }
    }
}

/// Trait for delivery channels.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// The channel this sender delivers through.
    fn channel(&self) -> Channel;

    /// Deliver one payload.
    async fn send(&self, payload: &NotificationPayload) -> Result<Delivery>;

    /// Look for a delivery of `payload` after a send gave no answer.
    ///
    /// `Ok(None)` means the outcome stays unknown.
    async fn reconcile(&self, _payload: &NotificationPayload) -> Result<Option<Delivery>> {
        Ok(None)
    }
}
