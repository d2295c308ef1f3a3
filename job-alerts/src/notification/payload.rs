//! Channel-agnostic notification payloads.
//!
//! All notification and email text is formatted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{JobPosting, Notification, NotificationDraft, UserProfile};
use crate::matching::MatchResult;
use crate::store::EmailMessage;
use crate::{Error, Result};

/// Subject used when forwarding an existing notification by email.
pub const APPLICATION_UPDATE_SUBJECT: &str = "New Job Application Update";

/// Who a payload is addressed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Recipient {
    /// A recipient known only by id (profile not supplied to the dispatch).
    pub fn anonymous(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            name: None,
        }
    }
}

impl From<&UserProfile> for Recipient {
    fn from(user: &UserProfile) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Everything a channel needs to deliver one job-match notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    pub recipient: Recipient,
    pub title: String,
    pub message: String,
    pub score: f64,
    pub reason: String,
    /// Link to the job details page.
    pub link: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationPayload {
    /// Build the canonical payload for a matched user.
    pub fn build(
        job: &JobPosting,
        result: &MatchResult,
        recipient: Recipient,
        link_base: &str,
    ) -> Self {
        let title = format!("New Job Match: {} at {}", job.title, job.company);
        let message = format!(
            "{} at {} matches your profile ({}). Match score: {}%",
            job.title, job.company, result.reason, result.score
        );
        let link = format!("{}/jobs/{}", link_base.trim_end_matches('/'), job.id);

        Self {
            job_id: job.id.clone(),
            job_title: job.title.clone(),
            company: job.company.clone(),
            recipient,
            title,
            message,
            score: result.score,
            reason: result.reason.clone(),
            link,
            created_at: Utc::now(),
        }
    }

    /// The in-app record for this payload.
    pub fn to_draft(&self) -> NotificationDraft {
        NotificationDraft {
            created_at: self.created_at,
            ..NotificationDraft::new(self.title.clone(), self.message.clone())
                .with_job(self.job_id.clone())
                .with_recipient(self.recipient.user_id.clone(), self.recipient.email.clone())
                .with_match_score(self.score)
        }
    }

    /// The email for this payload. Fails if the recipient has no address.
    pub fn to_email(&self) -> Result<EmailMessage> {
        let to = recipient_address(self.recipient.email.as_deref(), &self.recipient.user_id)?;
        Ok(EmailMessage {
            to,
            subject: self.title.clone(),
            message: self.text_body(),
            body: Some(self.html_body()),
        })
    }

    fn text_body(&self) -> String {
        format!(
            "We found a job that matches your profile!\n\n{} at {}\nMatch score: {}%\nWhy it matches: {}\n\nView the job: {}",
            self.job_title, self.company, self.score, self.reason, self.link
        )
    }

    fn html_body(&self) -> String {
        format!(
            "<h2>We found a job that matches your profile!</h2>\
             <p><strong>{}</strong> at {}</p>\
             <p>Match score: {}%</p>\
             <p>Why it matches: {}</p>\
             <p>Click <a href=\"{}\">here</a> to view the job details.</p>",
            escape_html(&self.job_title),
            escape_html(&self.company),
            self.score,
            escape_html(&self.reason),
            escape_html(&self.link)
        )
    }
}

/// Email forwarding an existing notification to its recipient.
pub fn application_update_email(notification: &Notification) -> Result<EmailMessage> {
    let to = recipient_address(notification.user_email.as_deref(), &notification.id)?;
    Ok(EmailMessage {
        to,
        subject: APPLICATION_UPDATE_SUBJECT.to_string(),
        message: notification.message.clone(),
        body: None,
    })
}

fn recipient_address(email: Option<&str>, owner: &str) -> Result<String> {
    match email.map(str::trim) {
        Some(address) if !address.is_empty() => Ok(address.to_string()),
        _ => Err(Error::validation(format!(
            "no email address for recipient {}",
            owner
        ))),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
