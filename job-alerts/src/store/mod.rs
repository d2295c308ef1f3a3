//! Remote collaborators: the notification store and the email transport.

mod http;
#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::domain::{Notification, NotificationDraft};

pub use http::HttpStoreClient;

/// CRUD access to the remote notification collection.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Fetch every stored notification.
    async fn list(&self) -> Result<Vec<Notification>>;

    /// Persist a draft. The store assigns the id.
    async fn create(&self, draft: &NotificationDraft) -> Result<Notification>;

    async fn mark_read(&self, id: &str) -> Result<()>;

    async fn mark_all_read(&self) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub message: String,
    /// HTML body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Acknowledgment returned by the email transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAck {
    pub accepted_at: DateTime<Utc>,
    /// Raw response of the transport, when it returned one.
    pub response: Option<serde_json::Value>,
}

/// Send-and-acknowledge email delivery.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<EmailAck>;
}
