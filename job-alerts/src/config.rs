//! Application configuration loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::DeliveryMode;
use crate::logging::DEFAULT_LOG_FILTER;
use crate::matching::DEFAULT_THRESHOLD;
use crate::notification::DispatchConfig;
use crate::{Error, Result};

pub const DEFAULT_STORE_URL: &str = "http://localhost:8084/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_STORE_URL: &str = "JOB_ALERTS_STORE_URL";
const ENV_REQUEST_TIMEOUT: &str = "JOB_ALERTS_REQUEST_TIMEOUT_SECS";
const ENV_DELIVERY_MODE: &str = "JOB_ALERTS_DELIVERY_MODE";
const ENV_MAX_CONCURRENT_SENDS: &str = "JOB_ALERTS_MAX_CONCURRENT_SENDS";
const ENV_SEND_TIMEOUT: &str = "JOB_ALERTS_SEND_TIMEOUT_SECS";
const ENV_JOB_LINK_BASE: &str = "JOB_ALERTS_JOB_LINK_BASE";
const ENV_MATCH_THRESHOLD: &str = "JOB_ALERTS_MATCH_THRESHOLD";
const ENV_LOG_FILTER: &str = "JOB_ALERTS_LOG_FILTER";
const ENV_LOG_DIR: &str = "JOB_ALERTS_LOG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the notification store API.
    pub store_url: String,
    pub request_timeout: Duration,
    /// Delivery mode at startup.
    pub delivery_mode: DeliveryMode,
    pub dispatch: DispatchConfig,
    /// Threshold of the default keyword scorer, in percent.
    pub match_threshold: f64,
    pub log_filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_url: DEFAULT_STORE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            delivery_mode: DeliveryMode::default(),
            dispatch: DispatchConfig::default(),
            match_threshold: DEFAULT_THRESHOLD,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset or blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get(ENV_STORE_URL) {
            config.store_url = url;
        }
        url::Url::parse(&config.store_url).map_err(|e| {
            Error::config(format!(
                "{} '{}' is not a valid URL: {}",
                ENV_STORE_URL, config.store_url, e
            ))
        })?;

        if let Some(v) = get(ENV_REQUEST_TIMEOUT) {
            config.request_timeout = Duration::from_secs(parse(ENV_REQUEST_TIMEOUT, &v)?);
        }

        if let Some(v) = get(ENV_DELIVERY_MODE) {
            config.delivery_mode = DeliveryMode::from_str(&v)
                .map_err(|e| Error::config(format!("{}: {}", ENV_DELIVERY_MODE, e)))?;
        }

        if let Some(v) = get(ENV_MAX_CONCURRENT_SENDS) {
            let max: usize = parse(ENV_MAX_CONCURRENT_SENDS, &v)?;
            if max == 0 {
                return Err(Error::config(format!(
                    "{} must be at least 1",
                    ENV_MAX_CONCURRENT_SENDS
                )));
            }
            config.dispatch.max_concurrent_sends = max;
        }

        if let Some(v) = get(ENV_SEND_TIMEOUT) {
            let secs: u64 = parse(ENV_SEND_TIMEOUT, &v)?;
            config.dispatch.send_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(v) = get(ENV_JOB_LINK_BASE) {
            config.dispatch.job_link_base = v;
        }

        if let Some(v) = get(ENV_MATCH_THRESHOLD) {
            let threshold: f64 = parse(ENV_MATCH_THRESHOLD, &v)?;
            if !(0.0..=100.0).contains(&threshold) {
                return Err(Error::config(format!(
                    "{} must be between 0 and 100, got {}",
                    ENV_MATCH_THRESHOLD, threshold
                )));
            }
            config.match_threshold = threshold;
        }

        if let Some(v) = get(ENV_LOG_FILTER) {
            config.log_filter = v;
        }

        config.log_dir = get(ENV_LOG_DIR).map(PathBuf::from);

        debug!(?config, "Configuration loaded");
        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::config(format!("{} has invalid value '{}': {}", key, value, e)))
}
