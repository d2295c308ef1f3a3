//! In-memory store and email transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;

use super::{EmailAck, EmailMessage, EmailTransport, NotificationStore};
use crate::domain::{Notification, NotificationDraft};
use crate::{Error, Result};

/// Which store operation a forced failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    List,
    Create,
    MarkRead,
    MarkAllRead,
    Delete,
}

pub(crate) struct FakeStore {
    records: Mutex<Vec<Notification>>,
    failures: Mutex<Vec<(Op, Error)>>,
    next_id: AtomicU64,
    calls: Mutex<Vec<Op>>,
    delay: Mutex<Option<std::time::Duration>>,
    ack_delay: Mutex<Option<std::time::Duration>>,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            ack_delay: Mutex::new(None),
        }
    }

    /// Store pre-populated with `count` unread notifications `N1..=Ncount`,
    /// `N1` being the oldest.
    pub(crate) fn with_records(count: usize) -> Self {
        let store = Self::new();
        let now = Utc::now();
        {
            let mut records = store.records.lock();
            for i in 1..=count {
                let draft = NotificationDraft {
                    created_at: now - Duration::minutes((count - i) as i64),
                    ..NotificationDraft::new(format!("title {}", i), format!("message {}", i))
                };
                records.push(draft.into_notification(format!("N{}", i)));
            }
        }
        store.next_id.store(count as u64 + 1, Ordering::SeqCst);
        store
    }

    /// Make the next call to `op` fail with `err`.
    pub(crate) fn fail_next(&self, op: Op, err: Error) {
        self.failures.lock().push((op, err));
    }

    pub(crate) fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Make `create` save the record and only then wait `delay` before answering.
    pub(crate) fn set_ack_delay(&self, delay: std::time::Duration) {
        *self.ack_delay.lock() = Some(delay);
    }

    pub(crate) fn push_record(&self, notification: Notification) {
        self.records.lock().push(notification);
    }

    pub(crate) fn records(&self) -> Vec<Notification> {
        self.records.lock().clone()
    }

    pub(crate) fn remove_record(&self, id: &str) {
        self.records.lock().retain(|n| n.id != id);
    }

    pub(crate) fn calls(&self, op: Op) -> usize {
        self.calls.lock().iter().filter(|c| **c == op).count()
    }

    async fn enter(&self, op: Op) -> Result<()> {
        self.calls.lock().push(op);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut failures = self.failures.lock();
        if let Some(pos) = failures.iter().position(|(o, _)| *o == op) {
            return Err(failures.remove(pos).1);
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for FakeStore {
    async fn list(&self) -> Result<Vec<Notification>> {
        self.enter(Op::List).await?;
        Ok(self.records.lock().clone())
    }

    async fn create(&self, draft: &NotificationDraft) -> Result<Notification> {
        self.enter(Op::Create).await?;
        let id = format!("N{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = draft.clone().into_notification(id);
        self.records.lock().push(created.clone());
        let ack_delay = *self.ack_delay.lock();
        if let Some(delay) = ack_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(created)
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.enter(Op::MarkRead).await?;
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::not_found("Notification", id))?;
        record.read = true;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.enter(Op::MarkAllRead).await?;
        for record in self.records.lock().iter_mut() {
            record.read = true;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.enter(Op::Delete).await?;
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|n| n.id != id);
        if records.len() == before {
            return Err(Error::not_found("Notification", id));
        }
        Ok(())
    }
}

/// Records sent emails; fails the next `n` sends when asked to.
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<EmailMessage>>,
    failures: Mutex<VecDeque<Error>>,
    attempts: AtomicUsize,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_next(&self, err: Error) {
        self.failures.lock().push_back(err);
    }

    pub(crate) fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, message: &EmailMessage) -> Result<EmailAck> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.sent.lock().push(message.clone());
        Ok(EmailAck {
            accepted_at: Utc::now(),
            response: None,
        })
    }
}
