//! In-process transport that never touches the network
//!
//! Messages are recorded instead of delivered. Events can be injected through
//! [`LoopbackTransport::emit`], which is how the lifecycle is driven in tests.

use super::{
    ConnectedIdentity, ConnectionUpdate, EventSink, Transport, TransportEvent, TransportSession,
};
use crate::error::{MessengerError, Result};
use crate::store::CredentialMaterial;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Message captured by the loopback transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub address: String,
    pub body: String,
}

#[derive(Default)]
struct LoopbackState {
    sink: Option<EventSink>,
    sent: Vec<SentMessage>,
    registered: HashSet<String>,
    last_credentials: Option<CredentialMaterial>,
    fail_sends: bool,
    fail_open: bool,
    fail_logout: bool,
    open_delay: Option<Duration>,
}

/// Loopback transport; clones share state
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
    open_calls: Arc<AtomicUsize>,
    logout_calls: Arc<AtomicUsize>,
    auto_open: Option<ConnectedIdentity>,
    register_all: Arc<AtomicBool>,
}

impl LoopbackTransport {
    /// Transport that stays silent after `open` until events are emitted
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that reports an open connection as soon as a session starts.
    /// Every number counts as registered.
    pub fn auto_open(identity: ConnectedIdentity) -> Self {
        let transport = Self {
            auto_open: Some(identity),
            ..Self::default()
        };
        transport.register_all.store(true, Ordering::SeqCst);
        transport
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark a protocol address as registered on the platform
    pub fn register(&self, address: &str) {
        self.lock().registered.insert(address.to_string());
    }

    /// Push an event onto the stream of the most recent session.
    /// Returns false when no session was ever opened or its receiver is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        match &self.lock().sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    /// Credentials passed to the last `open`
    pub fn last_credentials(&self) -> Option<CredentialMaterial> {
        self.lock().last_credentials.clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    pub fn fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn fail_logout(&self, fail: bool) {
        self.lock().fail_logout = fail;
    }

    /// Make `open` take this long before the handshake counts as started
    pub fn delay_open(&self, delay: Duration) {
        self.lock().open_delay = Some(delay);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn open(&self, credentials: CredentialMaterial, events: EventSink) -> Result<Arc<dyn TransportSession>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.lock().open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.lock();
            if state.fail_open {
                return Err(MessengerError::Transport("loopback open refused".to_string()));
            }
            state.last_credentials = Some(credentials);
            state.sink = Some(events.clone());
        }

        if let Some(identity) = &self.auto_open {
            let _ = events.send(TransportEvent::ConnectionUpdate(ConnectionUpdate::Open(identity.clone())));
        }

        Ok(Arc::new(LoopbackSession {
            transport: self.clone(),
        }))
    }
}

struct LoopbackSession {
    transport: LoopbackTransport,
}

#[async_trait]
impl TransportSession for LoopbackSession {
    async fn send_text(&self, address: &str, body: &str) -> Result<()> {
        let mut state = self.transport.lock();
        if state.fail_sends {
            return Err(MessengerError::Transport(format!("loopback send to {} failed", address)));
        }
        state.sent.push(SentMessage {
            address: address.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn lookup(&self, address: &str) -> Result<Option<String>> {
        if self.transport.register_all.load(Ordering::SeqCst)
            || self.transport.lock().registered.contains(address)
        {
            Ok(Some(address.to_string()))
        } else {
            Ok(None)
        }
    }

    async fn logout(&self) -> Result<()> {
        self.transport.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.transport.lock().fail_logout {
            return Err(MessengerError::Transport("loopback logout failed".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_auto_open_reports_identity() {
        let identity = ConnectedIdentity {
            id: "5511900000000@s.whatsapp.net".to_string(),
            name: Some("Loja".to_string()),
        };
        let transport = LoopbackTransport::auto_open(identity.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = transport.open(CredentialMaterial::fresh(), tx).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::ConnectionUpdate(ConnectionUpdate::Open(identity)))
        );
        assert_eq!(session.lookup("anything").await.unwrap(), Some("anything".to_string()));
    }

    #[tokio::test]
    async fn test_records_sends_and_lookups() {
        let transport = LoopbackTransport::new();
        transport.register("5511987654321@s.whatsapp.net");
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = transport.open(CredentialMaterial::default(), tx).await.unwrap();

        session.send_text("a@x", "hello").await.unwrap();
        assert_eq!(transport.sent(), vec![SentMessage { address: "a@x".to_string(), body: "hello".to_string() }]);
        assert!(session.lookup("5511987654321@s.whatsapp.net").await.unwrap().is_some());
        assert!(session.lookup("5511000000000@s.whatsapp.net").await.unwrap().is_none());

        transport.fail_sends(true);
        assert!(session.send_text("a@x", "again").await.is_err());
        assert_eq!(transport.sent().len(), 1);
    }
}
