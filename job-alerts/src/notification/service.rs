//! Job alert service.
//!
//! Wires the match evaluator, the dispatch engine, the notification feed and
//! the lifecycle manager together, and optionally listens for posted jobs on a
//! broadcast channel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::channels::{ChannelSender, EmailSender, InAppSender};
use super::dispatch::{DispatchConfig, DispatchEngine, DispatchOutcome, DispatchStats};
use super::feed::NotificationFeed;
use super::lifecycle::LifecycleManager;
use super::notice::Notice;
use crate::config::AppConfig;
use crate::domain::{DeliverySettings, JobPosting, UserProfile};
use crate::matching::{KeywordScorer, MatchEvaluator, MatchScorer};
use crate::store::{EmailAck, EmailTransport, HttpStoreClient, NotificationStore};
use crate::{Error, Result};

/// A job posting together with the profiles it should be evaluated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosted {
    pub job: JobPosting,
    pub users: Vec<UserProfile>,
}

/// Summary of handling one job posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub evaluated: usize,
    pub matched: usize,
    pub outcomes: Vec<DispatchOutcome>,
}

pub struct JobAlertService {
    evaluator: MatchEvaluator,
    engine: DispatchEngine,
    feed: Arc<NotificationFeed>,
    lifecycle: LifecycleManager,
    email: Arc<EmailSender>,
    cancellation_token: CancellationToken,
}

impl JobAlertService {
    pub fn new(
        scorer: Arc<dyn MatchScorer>,
        store: Arc<dyn NotificationStore>,
        transport: Arc<dyn EmailTransport>,
        delivery: Arc<DeliverySettings>,
        config: DispatchConfig,
    ) -> Self {
        let feed = Arc::new(NotificationFeed::new(store));
        let email = Arc::new(EmailSender::new(transport));
        let senders: Vec<Arc<dyn ChannelSender>> = vec![
            Arc::new(InAppSender::new(feed.clone())),
            email.clone() as Arc<dyn ChannelSender>,
        ];

        Self {
            evaluator: MatchEvaluator::new(scorer),
            engine: DispatchEngine::new(config, delivery, senders)
                .with_notices(feed.notice_sender()),
            lifecycle: LifecycleManager::new(feed.clone()),
            feed,
            email,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Build the service against the HTTP store with the keyword scorer.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = Arc::new(HttpStoreClient::new(
            &config.store_url,
            config.request_timeout,
        )?);
        info!(store_url = %client.base_url(), "Using HTTP notification store");

        Ok(Self::new(
            Arc::new(KeywordScorer::new(config.match_threshold)),
            client.clone(),
            client,
            Arc::new(DeliverySettings::new(config.delivery_mode)),
            config.dispatch.clone(),
        ))
    }

    pub fn feed(&self) -> &Arc<NotificationFeed> {
        &self.feed
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn delivery(&self) -> &Arc<DeliverySettings> {
        self.engine.delivery()
    }

    pub fn stats(&self) -> DispatchStats {
        self.engine.stats()
    }

    /// Evaluate a new job posting and notify every matching user.
    ///
    /// Users who already have an in-app notification for the job in the
    /// loaded feed are not notified in-app again.
    pub async fn on_job_posted(&self, job: &JobPosting, users: &[UserProfile]) -> JobReport {
        let results = self.evaluator.evaluate(job, users);
        let matched = results.iter().filter(|r| r.is_match).count();
        info!(job_id = %job.id, users = users.len(), matched, "Job posted");

        let outcomes = if matched == 0 {
            Vec::new()
        } else {
            self.engine.seed_claims(&self.feed.snapshot());
            self.engine.dispatch(job, users, &results).await
        };

        JobReport {
            job_id: job.id.clone(),
            evaluated: results.len(),
            matched,
            outcomes,
        }
    }

    /// Email an existing notification to its recipient.
    pub async fn forward_by_email(&self, id: &str) -> Result<EmailAck> {
        let notification = self
            .feed
            .get(id)
            .ok_or_else(|| Error::not_found("Notification", id))?;
        self.email.forward(&notification).await.inspect_err(|e| {
            warn!(id, error = %e, "Failed to forward notification by email");
            self.feed.publish(Notice::error("Failed to forward notification by email"));
        })
    }

    /// Handle posted jobs from `rx` until the channel closes or the service shuts down.
    pub fn start_listener(
        self: &Arc<Self>,
        mut rx: broadcast::Receiver<JobPosted>,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let cancellation_token = service.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        debug!("Job listener shutting down");
                        break;
                    }
                    result = rx.recv() => {
                        match result {
                            Ok(event) => {
                                service.on_job_posted(&event.job, &event.users).await;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("Job listener lagged by {} events", n);
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("Job channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    /// Stop listeners started by [`start_listener`](Self::start_listener).
    pub fn shutdown(&self) {
        info!("Stopping job alert service");
        self.cancellation_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{Channel, DeliveryMode, NotificationDraft};
    use crate::store::fake::{FakeStore, RecordingTransport};

    fn service(mode: DeliveryMode) -> (Arc<FakeStore>, Arc<RecordingTransport>, JobAlertService) {
        let store = Arc::new(FakeStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let service = JobAlertService::new(
            Arc::new(KeywordScorer::default()),
            store.clone(),
            transport.clone(),
            Arc::new(DeliverySettings::new(mode)),
            DispatchConfig::default(),
        );
        (store, transport, service)
    }

    fn posting() -> (JobPosting, Vec<UserProfile>) {
        let job = JobPosting::new("J1", "Engineer", "Acme").with_skills(["rust", "sql"]);
        let users = vec![
            UserProfile::new("U1")
                .with_email("u1@example.com")
                .with_skills(["Rust", "SQL", "Go"]),
            UserProfile::new("U2")
                .with_email("u2@example.com")
                .with_skills(["python"]),
        ];
        (job, users)
    }

    #[tokio::test]
    async fn test_on_job_posted_notifies_matches_only() {
        let (store, transport, service) = service(DeliveryMode::Both);
        let (job, users) = posting();

        let report = service.on_job_posted(&job, &users).await;

        assert_eq!(report.evaluated, 2);
        assert_eq!(report.matched, 1);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| o.is_delivered()));

        assert_eq!(store.records().len(), 1);
        assert_eq!(service.feed().unread_count(), 1);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "u1@example.com");
    }

    #[tokio::test]
    async fn test_no_matches_dispatches_nothing() {
        let (store, transport, service) = service(DeliveryMode::Both);
        let job = JobPosting::new("J2", "Chef", "Bistro").with_skills(["cooking"]);
        let (_, users) = posting();

        let report = service.on_job_posted(&job, &users).await;

        assert_eq!(report.matched, 0);
        assert!(report.outcomes.is_empty());
        assert!(store.records().is_empty());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_forward_by_email() {
        let (_, transport, service) = service(DeliveryMode::InApp);
        let (job, users) = posting();
        let report = service.on_job_posted(&job, &users).await;
        assert_eq!(report.outcomes[0].channel, Channel::InApp);

        let created = service.feed().snapshot().remove(0);
        service.forward_by_email(&created.id).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New Job Application Update");
        assert_eq!(sent[0].message, created.message);

        assert!(service.forward_by_email("N42").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_forward_failure_publishes_notice() {
        let (_, transport, service) = service(DeliveryMode::InApp);
        let (job, users) = posting();
        service.on_job_posted(&job, &users).await;
        let id = service.feed().snapshot()[0].id.clone();

        let mut notices = service.feed().subscribe();
        transport.fail_next(Error::RemoteUnavailable("smtp relay down".into()));
        assert!(service.forward_by_email(&id).await.is_err());

        let notice = notices.try_recv().unwrap();
        assert!(notice.is_error());
        assert!(notice.description.contains("forward"));
    }

    #[tokio::test]
    async fn test_loaded_feed_prevents_renotifying() {
        let (store, transport, service) = service(DeliveryMode::Both);
        let (job, users) = posting();
        store.push_record(
            NotificationDraft::new("New job match", "earlier run")
                .with_job("J1")
                .with_recipient("U1", Some("u1@example.com".to_string()))
                .into_notification("N1"),
        );
        service.feed().load().await.unwrap();

        let report = service.on_job_posted(&job, &users).await;

        let in_app = report
            .outcomes
            .iter()
            .find(|o| o.channel == Channel::InApp)
            .unwrap();
        assert!(in_app.is_skipped());
        assert_eq!(store.records().len(), 1);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_listener_until_shutdown() {
        let (store, _, service) = service(DeliveryMode::InApp);
        let service = Arc::new(service);
        let (tx, rx) = broadcast::channel(16);
        let handle = service.start_listener(rx);

        let (job, users) = posting();
        tx.send(JobPosted { job, users }).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.records().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        service.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(service.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_listener_stops_when_channel_closes() {
        let (_, _, service) = service(DeliveryMode::InApp);
        let service = Arc::new(service);
        let (tx, rx) = broadcast::channel::<JobPosted>(4);
        let handle = service.start_listener(rx);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
