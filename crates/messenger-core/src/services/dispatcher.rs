//! Single-message send with address validation and registration check

use crate::config::TransportConfig;
use crate::constants::MIN_ADDRESS_DIGITS;
use crate::error::{MessengerError, Result};
use crate::store::EventLog;
use crate::workflow::{ConnectionManager, MessageSender};
use async_trait::async_trait;
use messenger_types::SendReceipt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("Failed to compile digit filter regex"));

/// Strip everything but digits; fails when too few remain to be a phone number
pub fn normalize_digits(address: &str) -> Result<String> {
    let digits = NON_DIGITS.replace_all(address, "").into_owned();
    if digits.len() < MIN_ADDRESS_DIGITS {
        return Err(MessengerError::InvalidAddress(address.to_string()));
    }
    Ok(digits)
}

/// Sends one message at a time over the active session.
///
/// No queueing and no retries; every failure is recorded in the event log
/// and returned to the caller.
pub struct MessageDispatcher {
    connection: ConnectionManager,
    events: Arc<EventLog>,
    address_suffix: String,
    synthetic_prefix: String,
    synthetic_length: usize,
}

impl MessageDispatcher {
    pub fn new(connection: ConnectionManager, config: &TransportConfig) -> Self {
        let events = Arc::clone(connection.event_log());
        Self {
            connection,
            events,
            address_suffix: config.address_suffix.clone(),
            synthetic_prefix: config.synthetic_prefix.clone(),
            synthetic_length: config.synthetic_length,
        }
    }

    /// Protocol address for `raw`; addresses that already carry a domain pass through
    pub fn protocol_address(&self, raw: &str, digits: &str) -> String {
        if raw.contains('@') {
            raw.to_string()
        } else {
            format!("{}{}", digits, self.address_suffix)
        }
    }

    /// Test numbers are sent without asking the platform whether they exist
    pub fn is_synthetic(&self, digits: &str) -> bool {
        digits.starts_with(&self.synthetic_prefix) && digits.len() == self.synthetic_length
    }

    pub async fn send(&self, address: &str, body: &str) -> Result<SendReceipt> {
        match self.deliver(address, body).await {
            Ok(receipt) => {
                self.events.success(format!("Message sent to {}", receipt.recipient));
                Ok(receipt)
            }
            Err(e) => {
                self.events.error(format!("Failed to send message: {}", e));
                Err(e)
            }
        }
    }

    async fn deliver(&self, address: &str, body: &str) -> Result<SendReceipt> {
        let session = self.connection.active_session().await.ok_or(MessengerError::NotConnected)?;

        let digits = normalize_digits(address)?;
        let target = self.protocol_address(address, &digits);

        let destination = if self.is_synthetic(&digits) {
            target
        } else {
            session
                .lookup(&target)
                .await?
                .ok_or_else(|| MessengerError::UnregisteredRecipient(digits.clone()))?
        };

        session.send_text(&destination, body).await?;

        Ok(SendReceipt {
            success: true,
            recipient: digits,
        })
    }
}

#[async_trait]
impl MessageSender for MessageDispatcher {
    async fn is_connected(&self) -> bool {
        self.connection.active_session().await.is_some()
    }

    async fn send(&self, address: &str, body: &str) -> Result<SendReceipt> {
        MessageDispatcher::send(self, address, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileCredentialStore;
    use crate::transport::{ConnectedIdentity, ConnectionUpdate, LoopbackTransport, TransportEvent};
    use crate::workflow::SessionState;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn connected(transport: &LoopbackTransport, dir: &TempDir) -> MessageDispatcher {
        let manager = ConnectionManager::new(
            Arc::new(transport.clone()),
            Arc::new(FileCredentialStore::new(dir.path()).unwrap()),
            Arc::new(EventLog::in_memory(100)),
            &TransportConfig::default(),
        );
        manager.connect().await;
        transport.emit(TransportEvent::ConnectionUpdate(ConnectionUpdate::Open(ConnectedIdentity {
            id: "me@s.whatsapp.net".to_string(),
            name: None,
        })));
        for _ in 0..100 {
            if manager.state().await == SessionState::Connected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        MessageDispatcher::new(manager, &TransportConfig::default())
    }

    #[test]
    fn test_normalize_digits() {
        assert_eq!(normalize_digits("+55 (11) 98765-4321").unwrap(), "5511987654321");
        assert!(matches!(normalize_digits("12-34-56"), Err(MessengerError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_not_connected_checked_before_address() {
        let temp_dir = TempDir::new().unwrap();
        let transport = LoopbackTransport::new();
        let manager = ConnectionManager::new(
            Arc::new(transport.clone()),
            Arc::new(FileCredentialStore::new(temp_dir.path()).unwrap()),
            Arc::new(EventLog::in_memory(100)),
            &TransportConfig::default(),
        );
        let dispatcher = MessageDispatcher::new(manager.clone(), &TransportConfig::default());

        let result = dispatcher.send("123", "oi").await;
        assert!(matches!(result, Err(MessengerError::NotConnected)));
        assert!(manager.event_log().entries().iter().any(|e| e.message.contains("not connected")));
    }

    #[tokio::test]
    async fn test_synthetic_number_skips_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let transport = LoopbackTransport::new();
        let dispatcher = connected(&transport, &temp_dir).await;

        let receipt = dispatcher.send("5511987654321", "oi").await.unwrap();
        assert_eq!(receipt.recipient, "5511987654321");
        assert_eq!(transport.sent()[0].address, "5511987654321@s.whatsapp.net");
    }

    #[tokio::test]
    async fn test_unregistered_number_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let transport = LoopbackTransport::new();
        let dispatcher = connected(&transport, &temp_dir).await;

        let result = dispatcher.send("+1 415 555 0100", "hi").await;
        assert!(matches!(result, Err(MessengerError::UnregisteredRecipient(ref n)) if n == "14155550100"));
        assert!(transport.sent().is_empty());

        transport.register("14155550100@s.whatsapp.net");
        dispatcher.send("+1 415 555 0100", "hi").await.unwrap();
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_domain_address_passes_through() {
        let temp_dir = TempDir::new().unwrap();
        let transport = LoopbackTransport::new();
        transport.register("5521987654321@c.us");
        let dispatcher = connected(&transport, &temp_dir).await;

        dispatcher.send("5521987654321@c.us", "oi").await.unwrap();
        assert_eq!(transport.sent()[0].address, "5521987654321@c.us");
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let transport = LoopbackTransport::new();
        let dispatcher = connected(&transport, &temp_dir).await;
        transport.fail_sends(true);

        let result = dispatcher.send("5511987654321", "oi").await;
        assert!(matches!(result, Err(MessengerError::Transport(_))));
    }
}
