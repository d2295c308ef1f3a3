//! Dispatch engine.
//!
//! The engine is responsible for:
//! - Building one payload per matched user
//! - Fanning it out to the channels selected by the delivery mode
//! - Guaranteeing at most one delivery per (job, user, channel), including
//!   across runs once claims are seeded from the loaded feed
//! - Running sends concurrently under a concurrency cap
//! - Recording an outcome for every (user, channel) attempt

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::channels::{ChannelSender, Delivery};
use super::notice::Notice;
use super::payload::{NotificationPayload, Recipient};
use crate::domain::{
    Channel, DeliveryMode, DeliverySettings, JobPosting, Notification, UserProfile,
};
use crate::Error;
use crate::matching::MatchResult;

/// Configuration for the dispatch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of channel sends in flight at once.
    pub max_concurrent_sends: usize,
    /// Give up on a single channel send after this long.
    pub send_timeout: Option<Duration>,
    /// Prefix for job links in emails (empty for relative links).
    pub job_link_base: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sends: 8,
            send_timeout: None,
            job_link_base: String::new(),
        }
    }
}

/// What happened to one (user, channel) delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    Delivered { notification_id: Option<String> },
    /// Already claimed by an earlier send of the same (job, user, channel).
    Skipped { reason: String },
    Failed { error: String },
    /// The send timed out and no delivery could be found afterwards. The
    /// claim is kept since the channel may still have delivered it.
    Unconfirmed { error: String },
}

/// Audit record for one (user, channel) delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub job_id: String,
    pub user_id: String,
    pub channel: Channel,
    pub status: DispatchStatus,
    pub finished_at: DateTime<Utc>,
}

impl DispatchOutcome {
    fn new(job_id: &str, user_id: &str, channel: Channel, status: DispatchStatus) -> Self {
        Self {
            job_id: job_id.to_string(),
            user_id: user_id.to_string(),
            channel,
            status,
            finished_at: Utc::now(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DispatchStatus::Delivered { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, DispatchStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, DispatchStatus::Skipped { .. })
    }

    pub fn is_unconfirmed(&self) -> bool {
        matches!(self.status, DispatchStatus::Unconfirmed { .. })
    }
}

/// Dispatch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
    pub unconfirmed: u64,
    pub duplicates: u64,
    /// (job, user, channel) keys currently claimed.
    pub claimed: usize,
}

/// A send that has been spawned but not joined yet.
struct InFlight {
    key: String,
    user_id: String,
    channel: Channel,
}

/// Why a send produced no delivery.
#[derive(Debug)]
enum SendError {
    /// The channel reported a failure, nothing was delivered.
    Failed(Error),
    /// No answer in time and nothing found afterwards.
    TimedOut(Error),
}

type SendResult = std::result::Result<Delivery, SendError>;

/// The dispatch engine.
pub struct DispatchEngine {
    config: DispatchConfig,
    delivery: Arc<DeliverySettings>,
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
    claims: DashMap<String, DateTime<Utc>>,
    semaphore: Arc<Semaphore>,
    notices: Option<broadcast::Sender<Notice>>,
    delivered: AtomicU64,
    failed: AtomicU64,
    unconfirmed: AtomicU64,
    duplicates: AtomicU64,
}

fn dispatch_key(job_id: &str, user_id: &str, channel: Channel) -> String {
    format!("{}:{}:{}", job_id, user_id, channel)
}

impl DispatchEngine {
    pub fn new(
        config: DispatchConfig,
        delivery: Arc<DeliverySettings>,
        senders: Vec<Arc<dyn ChannelSender>>,
    ) -> Self {
        let permits = config.max_concurrent_sends.max(1);
        let mut by_channel = HashMap::new();
        for sender in senders {
            if by_channel.insert(sender.channel(), sender).is_some() {
                warn!("Duplicate channel sender registered, keeping the last one");
            }
        }

        info!(
            channels = by_channel.len(),
            max_concurrent_sends = permits,
            "Dispatch engine initialized"
        );

        Self {
            config,
            delivery,
            senders: by_channel,
            claims: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(permits)),
            notices: None,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            unconfirmed: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
        }
    }

    /// Publish an error notice for every send that fails or stays unconfirmed.
    ///
    /// In-app failures reported by the store are already published by the feed.
    pub fn with_notices(mut self, notices: broadcast::Sender<Notice>) -> Self {
        self.notices = Some(notices);
        self
    }

    pub fn delivery(&self) -> &Arc<DeliverySettings> {
        &self.delivery
    }

    /// Dispatch with the delivery mode currently configured.
    pub async fn dispatch(
        &self,
        job: &JobPosting,
        users: &[UserProfile],
        results: &[MatchResult],
    ) -> Vec<DispatchOutcome> {
        let mode = self.delivery.current();
        self.dispatch_with_mode(job, users, results, mode).await
    }

    /// Dispatch every matching result through the channels of `mode`.
    ///
    /// `users` resolves recipient details (email, name) for the user ids in
    /// `results`; a match for a user missing from it is still delivered in-app.
    /// Outcomes are returned in completion order.
    pub async fn dispatch_with_mode(
        &self,
        job: &JobPosting,
        users: &[UserProfile],
        results: &[MatchResult],
        mode: DeliveryMode,
    ) -> Vec<DispatchOutcome> {
        let profiles: HashMap<&str, &UserProfile> =
            users.iter().map(|u| (u.id.as_str(), u)).collect();

        let mut outcomes = Vec::new();
        let mut tasks = JoinSet::new();
        let mut in_flight = HashMap::new();

        for result in results.iter().filter(|r| r.is_match) {
            let recipient = profiles
                .get(result.user_id.as_str())
                .map(|u| Recipient::from(*u))
                .unwrap_or_else(|| Recipient::anonymous(result.user_id.clone()));
            let payload = Arc::new(NotificationPayload::build(
                job,
                result,
                recipient,
                &self.config.job_link_base,
            ));

            for channel in mode.channels() {
                let key = dispatch_key(&job.id, &result.user_id, channel);
                if !self.claim(&key) {
                    debug!(key = %key, "Skipping duplicate dispatch");
                    self.duplicates.fetch_add(1, Ordering::Relaxed);
                    outcomes.push(DispatchOutcome::new(
                        &job.id,
                        &result.user_id,
                        channel,
                        DispatchStatus::Skipped {
                            reason: "already dispatched".to_string(),
                        },
                    ));
                    continue;
                }

                let sender = self.senders.get(&channel).cloned();
                let payload = payload.clone();
                let semaphore = self.semaphore.clone();
                let timeout = self.config.send_timeout;

                let handle = tasks.spawn(async move {
                    // The semaphore is never closed.
                    let _permit = semaphore.acquire_owned().await.ok();
                    send_one(sender, channel, &payload, timeout).await
                });
                in_flight.insert(
                    handle.id(),
                    InFlight {
                        key,
                        user_id: result.user_id.clone(),
                        channel,
                    },
                );
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => {
                    let id = e.id();
                    error!(error = %e, "Dispatch task failed");
                    let err = Error::Other(format!("dispatch task failed: {}", e));
                    (id, Err(SendError::Failed(err)))
                }
            };
            let Some(send) = in_flight.remove(&task_id) else {
                continue;
            };
            outcomes.push(self.record(&job.id, send, result));
        }

        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let unconfirmed = outcomes.iter().filter(|o| o.is_unconfirmed()).count();
        info!(
            job_id = %job.id,
            mode = %mode,
            delivered,
            failed,
            unconfirmed,
            "Dispatch finished"
        );

        outcomes
    }

    /// Claim a (job, user, channel) key. False if already claimed.
    fn claim(&self, key: &str) -> bool {
        match self.claims.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                true
            }
        }
    }

    /// Claim the in-app key of every stored notification that names a job and
    /// a user, so a restarted process does not notify them again.
    ///
    /// Returns the number of keys newly claimed.
    pub fn seed_claims(&self, notifications: &[Notification]) -> usize {
        let seeded = notifications
            .iter()
            .filter_map(|n| Some((n.job_id.as_deref()?, n.user_id.as_deref()?)))
            .filter(|(job_id, user_id)| {
                self.claim(&dispatch_key(job_id, user_id, Channel::InApp))
            })
            .count();
        if seeded > 0 {
            debug!(seeded, "Seeded dispatch claims from stored notifications");
        }
        seeded
    }

    fn record(&self, job_id: &str, send: InFlight, result: SendResult) -> DispatchOutcome {
        let status = match result {
            Ok(delivery) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                DispatchStatus::Delivered {
                    notification_id: delivery.notification_id().map(str::to_string),
                }
            }
            Err(SendError::Failed(e)) => {
                // Release the claim so a later evaluation pass can retry.
                self.claims.remove(&send.key);
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    job_id,
                    user_id = %send.user_id,
                    channel = %send.channel,
                    error = %e,
                    "Channel send failed"
                );
                if send.channel != Channel::InApp {
                    self.notify(format!(
                        "Failed to send {} notification to user {}",
                        send.channel, send.user_id
                    ));
                }
                DispatchStatus::Failed {
                    error: e.to_string(),
                }
            }
            Err(SendError::TimedOut(e)) => {
                self.unconfirmed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    job_id,
                    user_id = %send.user_id,
                    channel = %send.channel,
                    error = %e,
                    "Channel send unconfirmed, keeping claim"
                );
                self.notify(format!(
                    "Could not confirm {} notification to user {}",
                    send.channel, send.user_id
                ));
                DispatchStatus::Unconfirmed {
                    error: e.to_string(),
                }
            }
        };
        DispatchOutcome::new(job_id, &send.user_id, send.channel, status)
    }

    fn notify(&self, description: String) {
        if let Some(tx) = &self.notices {
            // No subscribers is fine.
            let _ = tx.send(Notice::error(description));
        }
    }

    /// Whether a (job, user, channel) delivery has been made or is in flight.
    pub fn is_dispatched(&self, job_id: &str, user_id: &str, channel: Channel) -> bool {
        self.claims
            .contains_key(&dispatch_key(job_id, user_id, channel))
    }

    /// Get dispatch statistics.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unconfirmed: self.unconfirmed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            claimed: self.claims.len(),
        }
    }
}

/// Run one channel send, mapping every failure to [`Error::ChannelSend`].
///
/// A timed-out send is reconciled with the channel before it is reported.
async fn send_one(
    sender: Option<Arc<dyn ChannelSender>>,
    channel: Channel,
    payload: &NotificationPayload,
    timeout: Option<Duration>,
) -> SendResult {
    let sender = sender.ok_or_else(|| {
        SendError::Failed(Error::channel_send(channel.as_str(), "no sender registered"))
    })?;

    let sent = match timeout {
        Some(limit) => match tokio::time::timeout(limit, sender.send(payload)).await {
            Ok(result) => result,
            Err(_) => return reconcile(sender.as_ref(), channel, payload, limit).await,
        },
        None => sender.send(payload).await,
    };

    sent.map_err(|e| match e {
        Error::ChannelSend { .. } => SendError::Failed(e),
        other => SendError::Failed(Error::channel_send(channel.as_str(), other.to_string())),
    })
}

async fn reconcile(
    sender: &dyn ChannelSender,
    channel: Channel,
    payload: &NotificationPayload,
    limit: Duration,
) -> SendResult {
    let message = match sender.reconcile(payload).await {
        Ok(Some(delivery)) => {
            info!(channel = %channel, job_id = %payload.job_id, "Timed-out send was delivered");
            return Ok(delivery);
        }
        Ok(None) => format!("timed out after {:?}", limit),
        Err(e) => format!("timed out after {:?}, reconcile failed: {}", limit, e),
    };
    Err(SendError::TimedOut(Error::channel_send(channel.as_str(), message)))
}
