//! Configuration management for the messaging service

use serde::{Deserialize, Serialize};
use crate::constants::{
    DEFAULT_ADDRESS_SUFFIX, DEFAULT_BUSINESS_NAME, DEFAULT_OPERATOR_ADDRESS,
    DEFAULT_SYNTHETIC_LENGTH, DEFAULT_SYNTHETIC_PREFIX, EVENT_LOG_CAPACITY, MIN_ADDRESS_DIGITS,
};
use crate::error::{MessengerError, Result};
use std::path::Path;

/// Raw configuration structure as stored on disk; every section is optional
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    pub business: BusinessConfig,

    #[serde(default, alias = "whatsapp")]
    pub transport: TransportConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default, alias = "http")]
    pub gateway: GatewayConfig,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessengerConfig {
    pub business: BusinessConfig,
    pub transport: TransportConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Signature used at the end of outgoing messages
    #[serde(default = "default_business_name")]
    pub name: String,

    /// Number that receives the aggregate reports
    #[serde(alias = "owner_number", default = "default_operator_address")]
    pub operator_address: String,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: default_business_name(),
            operator_address: default_operator_address(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(alias = "jid_suffix", default = "default_address_suffix")]
    pub address_suffix: String,

    #[serde(alias = "test_prefix", default = "default_synthetic_prefix")]
    pub synthetic_prefix: String,

    #[serde(alias = "test_length", default = "default_synthetic_length")]
    pub synthetic_length: usize,

    #[serde(default = "default_browser_label")]
    pub browser_label: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address_suffix: default_address_suffix(),
            synthetic_prefix: default_synthetic_prefix(),
            synthetic_length: default_synthetic_length(),
            browser_label: default_browser_label(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides the process data root when set
    #[serde(default)]
    pub data_dir: Option<String>,

    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            event_log_capacity: default_event_log_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

// Default functions
fn default_business_name() -> String {
    DEFAULT_BUSINESS_NAME.to_string()
}

fn default_operator_address() -> String {
    DEFAULT_OPERATOR_ADDRESS.to_string()
}

fn default_address_suffix() -> String {
    DEFAULT_ADDRESS_SUFFIX.to_string()
}

fn default_synthetic_prefix() -> String {
    DEFAULT_SYNTHETIC_PREFIX.to_string()
}

fn default_synthetic_length() -> usize {
    DEFAULT_SYNTHETIC_LENGTH
}

fn default_browser_label() -> String {
    "Barbearia Nativa/Chrome/1.0.0".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_event_log_capacity() -> usize {
    EVENT_LOG_CAPACITY
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8081
}

impl MessengerConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MessengerError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_json_str(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw_config: RawConfig = serde_json::from_str(json)
            .map_err(|e| MessengerError::Config(format!("Failed to parse config: {}", e)))?;

        let config = Self::from_raw_config(raw_config);
        config.validate()?;
        Ok(config)
    }

    fn from_raw_config(raw: RawConfig) -> Self {
        Self {
            business: raw.business,
            transport: raw.transport,
            storage: raw.storage,
            gateway: raw.gateway,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let operator_digits = self.business.operator_address
            .chars()
            .filter(|c| c.is_ascii_digit())
            .count();
        if operator_digits < MIN_ADDRESS_DIGITS {
            return Err(MessengerError::Config(format!(
                "Operator address is required and needs at least {} digits",
                MIN_ADDRESS_DIGITS
            )));
        }

        if !self.transport.address_suffix.starts_with('@') {
            return Err(MessengerError::Config(
                "Transport address suffix must start with '@'".to_string()
            ));
        }

        if self.transport.synthetic_length < MIN_ADDRESS_DIGITS {
            return Err(MessengerError::Config(format!(
                "Synthetic address length must be at least {}",
                MIN_ADDRESS_DIGITS
            )));
        }

        if self.storage.event_log_capacity == 0 || self.storage.event_log_capacity > EVENT_LOG_CAPACITY {
            return Err(MessengerError::Config(format!(
                "Event log capacity must be between 1 and {}",
                EVENT_LOG_CAPACITY
            )));
        }

        Ok(())
    }
}
