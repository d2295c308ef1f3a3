//! Notification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notification as held by the store and mirrored in the feed cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Store-assigned identifier.
    #[serde(deserialize_with = "super::ids::id")]
    pub id: String,
    /// Job posting that triggered the notification, if any.
    #[serde(
        default,
        deserialize_with = "super::ids::optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub job_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "super::ids::optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    /// Set once at dispatch time, never modified afterwards.
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
}

/// A notification that has not been persisted yet (no `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
}

impl NotificationDraft {
    /// Create an unread draft stamped with the current time.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id: None,
            user_id: None,
            user_email: None,
            title: title.into(),
            message: message.into(),
            read: false,
            created_at: Utc::now(),
            match_score: None,
        }
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_recipient(mut self, user_id: impl Into<String>, email: Option<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.user_email = email;
        self
    }

    pub fn with_match_score(mut self, score: f64) -> Self {
        self.match_score = Some(score);
        self
    }

    /// Turn the draft into a stored record under the given id.
    pub fn into_notification(self, id: impl Into<String>) -> Notification {
        Notification {
            id: id.into(),
            job_id: self.job_id,
            user_id: self.user_id,
            user_email: self.user_email,
            title: self.title,
            message: self.message,
            read: self.read,
            created_at: self.created_at,
            match_score: self.match_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_store_record() {
        let json = r#"{
            "id": 42,
            "jobId": "J1",
            "userEmail": "u1@example.com",
            "title": "New Job Match!",
            "message": "Engineer at Acme matches your profile",
            "createdAt": "2024-05-01T10:00:00Z",
            "matchScore": 82
        }"#;

        let notification: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(notification.id, "42");
        assert_eq!(notification.job_id.as_deref(), Some("J1"));
        assert!(!notification.read);
        assert_eq!(notification.match_score, Some(82.0));
        assert!(notification.user_id.is_none());
    }

    #[test]
    fn test_draft_wire_format() {
        let draft = NotificationDraft::new("t", "m")
            .with_job("J1")
            .with_match_score(82.0);

        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["jobId"], "J1");
        assert_eq!(value["read"], false);
        assert!(value.get("id").is_none());
        assert!(value.get("userEmail").is_none());
        assert!(value.get("createdAt").is_some());
    }
}
