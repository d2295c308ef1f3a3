//! HTTP/JSON client for the notification store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::{EmailAck, EmailMessage, EmailTransport, NotificationStore};
use crate::domain::{Notification, NotificationDraft};
use crate::{Error, Result};

/// Talks to the store under `{base}/notifications/...`.
///
/// The same service exposes the `send-email` route, so this client is also
/// the default [`EmailTransport`].
#[derive(Debug, Clone)]
pub struct HttpStoreClient {
    client: Client,
    base_url: Url,
}

impl HttpStoreClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid store URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "Store URL '{}' cannot be used as a base",
                base_url
            )));
        }

        let mut builder = Client::builder();
        if request_timeout > Duration::ZERO {
            builder = builder.timeout(request_timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/notifications/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("Store URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("notifications")
            .extend(segments);
        Ok(url)
    }
}

fn transport_error(op: &'static str, err: reqwest::Error) -> Error {
    warn!(op, error = %err, "Store request failed");
    Error::RemoteUnavailable(format!("{}: {}", op, err))
}

/// Map a non-success response onto the error taxonomy.
///
/// `id` names the notification an id-addressed route operated on; a 404 there
/// means the store does not know that notification.
async fn check_status(response: Response, id: Option<&str>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(Error::not_found("Notification", id));
        }
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Store rejected request");
    Err(Error::RemoteRejected {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(op: &'static str, response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(op, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl NotificationStore for HttpStoreClient {
    async fn list(&self) -> Result<Vec<Notification>> {
        let url = self.endpoint(&["all"])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("list notifications", e))?;
        let response = check_status(response, None).await?;
        let notifications: Vec<Notification> = read_json("list notifications", response).await?;
        debug!(count = notifications.len(), "Fetched notifications");
        Ok(notifications)
    }

    async fn create(&self, draft: &NotificationDraft) -> Result<Notification> {
        let url = self.endpoint(&["add"])?;
        let response = self
            .client
            .post(url)
            .json(draft)
            .send()
            .await
            .map_err(|e| transport_error("create notification", e))?;
        let response = check_status(response, None).await?;
        let created: Notification = read_json("create notification", response).await?;
        debug!(id = %created.id, "Created notification");
        Ok(created)
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&["read", id])?;
        let response = self
            .client
            .put(url)
            .send()
            .await
            .map_err(|e| transport_error("mark notification read", e))?;
        check_status(response, Some(id)).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<()> {
        let url = self.endpoint(&["mark-all-read"])?;
        let response = self
            .client
            .put(url)
            .send()
            .await
            .map_err(|e| transport_error("mark all notifications read", e))?;
        check_status(response, None).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&["delete", id])?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| transport_error("delete notification", e))?;
        check_status(response, Some(id)).await?;
        Ok(())
    }
}

#[async_trait]
impl EmailTransport for HttpStoreClient {
    async fn send(&self, message: &EmailMessage) -> Result<EmailAck> {
        let url = self.endpoint(&["send-email"])?;
        let response = self
            .client
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|e| transport_error("send email", e))?;
        let response = check_status(response, None).await?;

        // The endpoint may answer with JSON, plain text or nothing at all.
        let text = response
            .text()
            .await
            .map_err(|e| transport_error("send email", e))?;
        let body = text.trim();
        let ack_body = if body.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.to_string())),
            )
        };

        debug!(to = %message.to, "Email accepted by transport");
        Ok(EmailAck {
            accepted_at: Utc::now(),
            response: ack_body,
        })
    }
}
