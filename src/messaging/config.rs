//! Messaging configuration.
//!
//! Controls whether refreshes leave the process and how they are batched.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::server::ServerAddress;

const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;

/// When queued refresh calls are sent to the farm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagingMode {
    /// Buffer per request and flush once when the request ends.
    #[default]
    PerRequest,
    /// Send each call as soon as it is raised; no request scope needed.
    Immediate,
}

impl FromStr for MessagingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_request" => Ok(Self::PerRequest),
            "immediate" => Ok(Self::Immediate),
            other => Err(format!("unknown messaging mode `{other}`")),
        }
    }
}

/// Basic-auth pair presented to peers.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub distributed_enabled: bool,
    pub mode: MessagingMode,
    pub servers: Vec<ServerAddress>,
    pub credentials: Option<Credentials>,
    /// Upper bound on one peer call, response included.
    pub call_timeout: Duration,
    pub application_id: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            distributed_enabled: false,
            mode: MessagingMode::PerRequest,
            servers: Vec::new(),
            credentials: None,
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            application_id: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl From<&crate::config::MessagingSettings> for MessagingConfig {
    fn from(settings: &crate::config::MessagingSettings) -> Self {
        Self {
            distributed_enabled: settings.distributed_enabled,
            mode: settings.mode,
            servers: settings.servers.clone(),
            credentials: settings.credentials.clone(),
            call_timeout: settings.call_timeout,
            application_id: settings.application_id.clone(),
        }
    }
}

impl MessagingConfig {
    /// Distributed calls go out only when enabled and someone is listening.
    pub fn requires_distributed_calls(&self) -> bool {
        self.distributed_enabled && !self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributed_calls_need_servers() {
        let mut config = MessagingConfig {
            distributed_enabled: true,
            ..MessagingConfig::default()
        };
        assert!(!config.requires_distributed_calls());

        config.servers.push("http://peer:3000".parse().expect("address"));
        assert!(config.requires_distributed_calls());

        config.distributed_enabled = false;
        assert!(!config.requires_distributed_calls());
    }

    #[test]
    fn mode_parses_both_spellings() {
        assert_eq!("per-request".parse(), Ok(MessagingMode::PerRequest));
        assert_eq!("Immediate".parse(), Ok(MessagingMode::Immediate));
        assert!("later".parse::<MessagingMode>().is_err());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "farm".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
