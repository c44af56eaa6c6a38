//! # Configuration
//!
//! Module parameters for the controller and host submodules, and the
//! environment-driven configuration that builds them.

use crate::domain::{IcaError, ALLOW_ALL_HOST_MSGS};
use serde::{Deserialize, Serialize};
use std::env;

/// Default address prefix of host-side interchain accounts.
pub const DEFAULT_ADDRESS_PREFIX: &str = "qc";

/// Controller submodule parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerParams {
    /// Whether the controller accepts registrations and channel callbacks.
    pub controller_enabled: bool,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            controller_enabled: true,
        }
    }
}

/// Host submodule parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostParams {
    /// Whether the host accepts channels and executes packets.
    pub host_enabled: bool,
    /// Message type URLs the host executes. `"*"` allows every type.
    pub allow_messages: Vec<String>,
}

impl Default for HostParams {
    fn default() -> Self {
        Self {
            host_enabled: true,
            allow_messages: vec![ALLOW_ALL_HOST_MSGS.to_string()],
        }
    }
}

impl HostParams {
    /// Host that executes only the listed message types.
    pub fn allowing<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            host_enabled: true,
            allow_messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// Reject blank entries and entries containing whitespace.
    pub fn validate(&self) -> Result<(), IcaError> {
        for entry in &self.allow_messages {
            if entry.trim().is_empty() {
                return Err(IcaError::InvalidConfig(
                    "allow list entry cannot be blank".to_string(),
                ));
            }
            if entry.chars().any(char::is_whitespace) {
                return Err(IcaError::InvalidConfig(format!(
                    "allow list entry {:?} contains whitespace",
                    entry
                )));
            }
        }
        Ok(())
    }

    /// Whether `type_url` may be executed.
    pub fn is_allowed(&self, type_url: &str) -> bool {
        self.allow_messages
            .iter()
            .any(|allowed| allowed == ALLOW_ALL_HOST_MSGS || allowed == type_url)
    }
}

/// Complete subsystem configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcaConfig {
    /// Controller parameters.
    pub controller: ControllerParams,
    /// Host parameters.
    pub host: HostParams,
    /// Prefix of derived interchain account addresses.
    pub address_prefix: String,
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
    /// Emit JSON formatted logs.
    pub json_logs: bool,
}

impl Default for IcaConfig {
    fn default() -> Self {
        Self {
            controller: ControllerParams::default(),
            host: HostParams::default(),
            address_prefix: DEFAULT_ADDRESS_PREFIX.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl IcaConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_ICA_CONTROLLER_ENABLED`: Enable the controller (default: true)
    /// - `QC_ICA_HOST_ENABLED`: Enable the host (default: true)
    /// - `QC_ICA_ALLOW_MESSAGES`: Comma-separated allowed type URLs (default: `*`)
    /// - `QC_ICA_ADDRESS_PREFIX`: Account address prefix (default: qc)
    /// - `QC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `QC_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            controller: ControllerParams {
                controller_enabled: env_flag("QC_ICA_CONTROLLER_ENABLED")
                    .unwrap_or(defaults.controller.controller_enabled),
            },
            host: HostParams {
                host_enabled: env_flag("QC_ICA_HOST_ENABLED").unwrap_or(defaults.host.host_enabled),
                allow_messages: env::var("QC_ICA_ALLOW_MESSAGES")
                    .map(|v| parse_allow_list(&v))
                    .unwrap_or(defaults.host.allow_messages),
            },
            address_prefix: env::var("QC_ICA_ADDRESS_PREFIX").unwrap_or(defaults.address_prefix),
            log_level: env::var("QC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: env_flag("QC_JSON_LOGS").unwrap_or(defaults.json_logs),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), IcaError> {
        self.host.validate()?;
        if self.address_prefix.is_empty()
            || !self
                .address_prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(IcaError::InvalidConfig(format!(
                "address prefix {:?} must be non-empty lowercase alphanumeric",
                self.address_prefix
            )));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn parse_allow_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
