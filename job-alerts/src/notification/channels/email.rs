//! Email channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ChannelSender, Delivery};
use crate::Result;
use crate::domain::{Channel, Notification};
use crate::notification::payload::{NotificationPayload, application_update_email};
use crate::store::{EmailAck, EmailTransport};

/// Hands job-match emails to the email transport.
pub struct EmailSender {
    transport: Arc<dyn EmailTransport>,
}

impl EmailSender {
    pub fn new(transport: Arc<dyn EmailTransport>) -> Self {
        Self { transport }
    }

    /// Email an existing notification to its recipient.
    pub async fn forward(&self, notification: &Notification) -> Result<EmailAck> {
        let email = application_update_email(notification)?;
        let ack = self.transport.send(&email).await?;
        debug!(id = %notification.id, to = %email.to, "Notification forwarded by email");
        Ok(ack)
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<Delivery> {
        let email = payload.to_email()?;
        let ack = self.transport.send(&email).await?;
        debug!(
            job_id = %payload.job_id,
            user_id = %payload.recipient.user_id,
            to = %email.to,
            "Job match email sent"
        );
        Ok(Delivery::Acknowledged(ack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationDraft;
    use crate::store::fake::RecordingTransport;

    #[tokio::test]
    async fn test_forward_uses_notification_address() {
        let transport = Arc::new(RecordingTransport::new());
        let sender = EmailSender::new(transport.clone());

        let notification = NotificationDraft::new("t", "Engineer at Acme")
            .with_recipient("U1", Some("u1@example.com".to_string()))
            .into_notification("N1");
        sender.forward(&notification).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "u1@example.com");
        assert_eq!(sent[0].message, "Engineer at Acme");
    }

    #[tokio::test]
    async fn test_forward_without_address_does_not_send() {
        let transport = Arc::new(RecordingTransport::new());
        let sender = EmailSender::new(transport.clone());

        let notification = NotificationDraft::new("t", "m").into_notification("N1");
        assert!(sender.forward(&notification).await.is_err());
        assert_eq!(transport.attempts(), 0);
    }
}
