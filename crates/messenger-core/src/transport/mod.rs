//! Messaging platform transport capability
//!
//! The wire protocol, cryptographic pairing and socket I/O live in a transport
//! library. This module fixes the seam the rest of the service talks to: open a
//! session, send, look up registration, log out, and a single typed event stream.

pub mod loopback;

use crate::error::{MessengerError, Result};
use crate::store::CredentialMaterial;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use loopback::LoopbackTransport;
pub use messenger_types::ConnectedIdentity;

/// Why the platform closed the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The account ended this device's session; credentials are void
    LoggedOut,
    /// The server asked for a reconnect; credentials stay valid
    RestartRequired,
    /// Network loss, timeout, or anything unclassified
    Other(String),
}

/// Connection state changes reported by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionUpdate {
    /// Raw challenge the user must scan or type to link the device
    PairingChallenge(String),
    Open(ConnectedIdentity),
    Closed(CloseReason),
}

/// Message received on the active session
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub from: String,
    pub text: Option<String>,
    /// Sent by the connected account itself
    pub from_me: bool,
    /// Live notification, as opposed to history sync
    pub is_notify: bool,
}

/// Everything a transport reports back, on one ordered stream
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    CredentialsUpdated(CredentialMaterial),
    MessageReceived(InboundMessage),
    ConnectionUpdate(ConnectionUpdate),
}

/// Sending half of the event stream handed to [`Transport::open`]
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Factory for sessions
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a handshake with the given credentials.
    ///
    /// Returns once the handshake is initiated; its outcome arrives on `events`.
    async fn open(&self, credentials: CredentialMaterial, events: EventSink) -> Result<Arc<dyn TransportSession>>;
}

/// Handle to one live session
#[async_trait]
pub trait TransportSession: Send + Sync {
    async fn send_text(&self, address: &str, body: &str) -> Result<()>;

    /// Resolve a protocol address to its registered form, `None` when not registered
    async fn lookup(&self, address: &str) -> Result<Option<String>>;

    /// Protocol-level logout; voids the credentials on the platform side
    async fn logout(&self) -> Result<()>;
}

/// Transport used when no platform library is linked in; every open fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlinkedTransport;

#[async_trait]
impl Transport for UnlinkedTransport {
    async fn open(&self, _credentials: CredentialMaterial, _events: EventSink) -> Result<Arc<dyn TransportSession>> {
        Err(MessengerError::Transport(
            "no messaging platform transport is available in this build".to_string(),
        ))
    }
}
