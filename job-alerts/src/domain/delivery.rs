//! Delivery channels and the process-wide delivery mode.

use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Error;

/// A delivery mechanism for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// The in-application notification feed.
    InApp,
    /// Outbound email.
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InApp => "in-app",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channel(s) a dispatch fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    InApp,
    Email,
    #[default]
    Both,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InApp => "in-app",
            Self::Email => "email",
            Self::Both => "both",
        }
    }

    /// Parse from a configuration string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-app" | "in_app" | "inapp" => Some(Self::InApp),
            "email" => Some(Self::Email),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// Whether this mode delivers through `channel`.
    pub fn includes(&self, channel: Channel) -> bool {
        match self {
            Self::Both => true,
            Self::InApp => channel == Channel::InApp,
            Self::Email => channel == Channel::Email,
        }
    }

    /// Channels selected by this mode, in-app first.
    pub fn channels(&self) -> Vec<Channel> {
        [Channel::InApp, Channel::Email]
            .into_iter()
            .filter(|c| self.includes(*c))
            .collect()
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            Error::validation(format!(
                "Unknown delivery mode '{}', expected one of: in-app, email, both",
                s
            ))
        })
    }
}

/// Shared delivery mode, read by the dispatch engine on every dispatch.
#[derive(Debug, Default)]
pub struct DeliverySettings {
    mode: RwLock<DeliveryMode>,
}

impl DeliverySettings {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            mode: RwLock::new(mode),
        }
    }

    pub fn current(&self) -> DeliveryMode {
        *self.mode.read()
    }

    /// Replace the delivery mode. Takes effect on the next dispatch.
    pub fn set(&self, mode: DeliveryMode) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            info!(from = %previous, to = %mode, "Delivery mode changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delivery_mode() {
        assert_eq!(DeliveryMode::parse("in-app"), Some(DeliveryMode::InApp));
        assert_eq!(DeliveryMode::parse(" IN_APP "), Some(DeliveryMode::InApp));
        assert_eq!(DeliveryMode::parse("Email"), Some(DeliveryMode::Email));
        assert_eq!(DeliveryMode::parse("both"), Some(DeliveryMode::Both));
        assert_eq!(DeliveryMode::parse("sms"), None);
        assert!("sms".parse::<DeliveryMode>().is_err());
    }

    #[test]
    fn test_mode_channels() {
        assert_eq!(DeliveryMode::InApp.channels(), vec![Channel::InApp]);
        assert_eq!(DeliveryMode::Email.channels(), vec![Channel::Email]);
        assert_eq!(
            DeliveryMode::Both.channels(),
            vec![Channel::InApp, Channel::Email]
        );
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&DeliveryMode::InApp).unwrap(),
            "\"in-app\""
        );
        let mode: DeliveryMode = serde_json::from_str("\"both\"").unwrap();
        assert_eq!(mode, DeliveryMode::Both);
    }

    #[test]
    fn test_settings_switch_between_dispatches() {
        let settings = DeliverySettings::default();
        assert_eq!(settings.current(), DeliveryMode::Both);
        settings.set(DeliveryMode::Email);
        assert_eq!(settings.current(), DeliveryMode::Email);
    }
}
