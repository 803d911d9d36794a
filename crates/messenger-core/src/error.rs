//! Error types for the messaging service

use thiserror::Error;

/// Main error type for all messaging operations
#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("Messaging session is not connected")]
    NotConnected,

    #[error("Invalid phone address: {0}")]
    InvalidAddress(String),

    #[error("Number {0} is not registered on the messaging platform")]
    UnregisteredRecipient(String),

    #[error("A cancellation reason is required")]
    MissingReason,

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl MessengerError {
    /// True for failures caused by the caller's request or the session state,
    /// as opposed to a lower layer breaking
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::InvalidAddress(_)
                | Self::UnregisteredRecipient(_)
                | Self::MissingReason
        )
    }
}

/// Result type for messaging operations
pub type Result<T> = std::result::Result<T, MessengerError>;
