//! Domain layer for job-alerts.
//!
//! Job postings, user profiles, notification records and the delivery mode.

mod ids;

pub mod delivery;
pub mod job;
pub mod notification;
pub mod user;

pub use delivery::{Channel, DeliveryMode, DeliverySettings};
pub use job::JobPosting;
pub use notification::{Notification, NotificationDraft};
pub use user::UserProfile;
