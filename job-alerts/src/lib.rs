//! job-alerts library crate.
//!
//! Matches job postings against user profiles, delivers job-match
//! notifications in-app and by email, and manages their read/delete lifecycle.

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod matching;
pub mod notification;
pub mod store;

pub use error::{Error, Result};
