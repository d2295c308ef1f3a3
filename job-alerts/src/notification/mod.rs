//! Job-match notification engine.
//!
//! Delivers job-match notifications to matched users and keeps the
//! read/unread/deleted state of every notification consistent with the
//! remote store.
//!
//! # Features
//!
//! - In-app and email channels, selected by a runtime delivery mode
//! - At most one delivery per (job, user, channel)
//! - Bounded concurrent sends with per-send timeouts
//! - Cached notification feed with user-visible notices on failure
//! - Remote-first read and delete transitions
//!
//! # Example
//!
//! ```ignore
//! use job_alerts::config::AppConfig;
//! use job_alerts::notification::JobAlertService;
//!
//! let config = AppConfig::from_env()?;
//! let service = JobAlertService::from_config(&config)?;
//! service.feed().load().await?;
//! let report = service.on_job_posted(&job, &users).await;
//! ```

pub mod channels;
pub mod dispatch;
pub mod feed;
pub mod lifecycle;
pub mod notice;
pub mod payload;
pub mod service;

pub use channels::{ChannelSender, Delivery, EmailSender, InAppSender};
pub use dispatch::{DispatchConfig, DispatchEngine, DispatchOutcome, DispatchStats, DispatchStatus};
pub use feed::NotificationFeed;
pub use lifecycle::{LifecycleManager, Transition};
pub use notice::{Notice, NoticeSeverity};
pub use payload::{NotificationPayload, Recipient};
pub use service::{JobAlertService, JobPosted, JobReport};
