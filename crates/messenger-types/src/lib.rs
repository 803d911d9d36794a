//! Shared boundary types for the messaging service
//!
//! Everything in here is plain data that crosses the gateway boundary:
//! outcomes of lifecycle calls, bulk results, report summaries and audit entries.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Severity of an audit log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// One entry of the capped audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "type")]
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Result of connect / disconnect requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOutcome {
    pub success: bool,
    pub message: String,
}

impl ConnectOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Account the active session is authenticated as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedIdentity {
    pub id: String,
    pub name: Option<String>,
}

/// Read-only view of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub connected: bool,
    pub connecting: bool,
    pub has_pairing_artifact: bool,
    pub pairing_artifact: Option<String>,
}

/// Successful single send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub success: bool,
    /// Normalized digits of the recipient
    pub recipient: String,
}

/// Outcome of one booking inside a bulk flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    Sent {
        #[serde(rename = "bookingId")]
        booking_id: i64,
        recipient: String,
    },
    Failed {
        #[serde(rename = "bookingId")]
        booking_id: i64,
        reason: String,
    },
}

impl ItemResult {
    pub fn booking_id(&self) -> i64 {
        match self {
            Self::Sent { booking_id, .. } | Self::Failed { booking_id, .. } => *booking_id,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Result of the confirmation flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationOutcome {
    pub sent_count: usize,
    pub total: usize,
    pub results: Vec<ItemResult>,
    /// Set when messages went out but the updated bookings could not be written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

/// Result of the cancellation flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationOutcome {
    pub cancelled_count: usize,
    pub total: usize,
    pub results: Vec<ItemResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

/// Aggregation window of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportWindow {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ReportWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("Unknown report window: {}", other)),
        }
    }
}

/// Booking counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
}

/// Result of a report flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub window: ReportWindow,
    /// Human readable window, e.g. a date or a date range
    pub label: String,
    pub counts: StatusCounts,
}

/// JSON envelope returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn data(data: T) -> Self {
        Self { success: true, message: None, data: Some(data), error: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, message: None, data: None, error: Some(error.into()) }
    }
}
