//! Connection lifecycle state machine
//!
//! One [`ConnectionManager`] owns the process-wide session. Callers drive it
//! through named operations; transport events arrive on a channel consumed by
//! a single pump task per connection attempt.

use crate::config::TransportConfig;
use crate::error::MessengerError;
use crate::services::PairingCodeProvider;
use crate::store::{CredentialMaterial, CredentialStore, EventLog};
use crate::transport::{
    CloseReason, ConnectionUpdate, InboundMessage, Transport, TransportEvent, TransportSession,
};
use messenger_types::{ConnectOutcome, ConnectedIdentity, LogLevel, StatusSnapshot};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Lifecycle states of the single session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    AwaitingPairing,
    Connected,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingPairing => "awaiting_pairing",
            Self::Connected => "connected",
        }
    }
}

struct Session {
    state: SessionState,
    handle: Option<Arc<dyn TransportSession>>,
    identity: Option<ConnectedIdentity>,
    /// Bumped whenever a session ends; events tagged with an older value are dropped
    generation: u64,
    /// Attempts disconnected while `open` was still pending; their late handles get logged out
    abandoned: HashSet<u64>,
}

impl Session {
    fn reset(&mut self) -> Option<Arc<dyn TransportSession>> {
        self.state = SessionState::Idle;
        self.identity = None;
        self.generation += 1;
        self.handle.take()
    }
}

struct Inner {
    session: Mutex<Session>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    pairing: PairingCodeProvider,
    events: Arc<EventLog>,
    connect_timeout: Duration,
    client_label: String,
}

/// Sole owner and mutator of the session; clones share the same session
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        events: Arc<EventLog>,
        config: &TransportConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(Session {
                    state: SessionState::Idle,
                    handle: None,
                    identity: None,
                    generation: 0,
                    abandoned: HashSet::new(),
                }),
                transport,
                credentials,
                pairing: PairingCodeProvider::new(),
                events,
                connect_timeout: Duration::from_secs(config.connect_timeout_secs),
                client_label: config.browser_label.clone(),
            }),
        }
    }

    /// Start a connection attempt.
    ///
    /// Returns once the handshake is initiated. Pairing and the final outcome
    /// are reported through [`status`](Self::status).
    pub async fn connect(&self) -> ConnectOutcome {
        let inner = &self.inner;

        // The lock is only held for the transition; `open` may take up to the connect timeout
        let generation = {
            let mut session = inner.session.lock().await;
            match session.state {
                SessionState::Connected => return ConnectOutcome::ok("Already connected"),
                SessionState::Connecting | SessionState::AwaitingPairing => {
                    return ConnectOutcome::rejected("Connection already in progress")
                }
                SessionState::Idle => {}
            }
            session.state = SessionState::Connecting;
            session.generation += 1;
            session.generation
        };
        inner.events.info(format!("Starting connection to the messaging platform as {}", inner.client_label));

        let credentials = match inner.credentials.load() {
            Ok(Some(material)) => material,
            Ok(None) => {
                log::info!("No stored credentials, starting a fresh pairing");
                CredentialMaterial::fresh()
            }
            Err(e) => {
                inner.events.warning(format!("Stored credentials unreadable, starting fresh: {}", e));
                CredentialMaterial::fresh()
            }
        };

        // The pump exists before the transport can emit anything
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_events(Arc::downgrade(&self.inner), generation, rx));

        let opened = match tokio::time::timeout(inner.connect_timeout, inner.transport.open(credentials, tx)).await {
            Ok(result) => result,
            Err(_) => Err(MessengerError::Transport(format!(
                "handshake not started within {}s",
                inner.connect_timeout.as_secs()
            ))),
        };

        let mut session = inner.session.lock().await;
        if session.generation != generation {
            let abandoned = session.abandoned.remove(&generation);
            drop(session);
            inner.events.warning("Connection attempt ended before the handshake started");
            if let (true, Ok(handle)) = (abandoned, opened) {
                if let Err(e) = handle.logout().await {
                    inner.events.error(format!("Failed to log out abandoned session: {}", e));
                }
            }
            return ConnectOutcome::rejected("Connection attempt was superseded");
        }

        match opened {
            Ok(handle) => {
                session.handle = Some(handle);
                ConnectOutcome::ok("Connection started, scan the pairing code")
            }
            Err(e) => {
                session.reset();
                drop(session);
                inner.pairing.clear();
                inner.events.error(format!("Failed to connect: {}", e));
                ConnectOutcome::rejected(e.to_string())
            }
        }
    }

    /// Log out of the platform and return to idle.
    ///
    /// The handle is discarded even when logout fails.
    pub async fn disconnect(&self) -> ConnectOutcome {
        let handle = {
            let mut session = self.inner.session.lock().await;
            let opening = matches!(session.state, SessionState::Connecting | SessionState::AwaitingPairing);
            if opening && session.handle.is_none() {
                let generation = session.generation;
                session.abandoned.insert(generation);
            }
            let handle = session.reset();
            self.inner.pairing.clear();
            handle
        };

        let Some(handle) = handle else {
            return ConnectOutcome::ok("Disconnected");
        };

        self.inner.events.info("Disconnecting from the messaging platform");
        match handle.logout().await {
            Ok(()) => {
                self.inner.events.success("Disconnected");
                ConnectOutcome::ok("Disconnected")
            }
            Err(e) => {
                self.inner.events.error(format!("Failed to disconnect: {}", e));
                ConnectOutcome::rejected(e.to_string())
            }
        }
    }

    /// Disconnect, then delete all persisted credential material
    pub async fn clear_session(&self) {
        self.disconnect().await;

        match self.inner.credentials.clear() {
            Ok(removed) => self.inner.events.info(format!("Session cleared, {} credential files removed", removed)),
            Err(e) => self.inner.events.error(format!("Failed to clear session: {}", e)),
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        let session = self.inner.session.lock().await;
        let pairing_artifact = self.inner.pairing.current();
        StatusSnapshot {
            connected: session.state == SessionState::Connected,
            connecting: matches!(session.state, SessionState::Connecting | SessionState::AwaitingPairing),
            has_pairing_artifact: pairing_artifact.is_some(),
            pairing_artifact,
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.session.lock().await.state
    }

    pub fn pairing_artifact(&self) -> Option<String> {
        self.inner.pairing.current()
    }

    /// Identity of the linked account while connected
    pub async fn connected_identity(&self) -> Option<ConnectedIdentity> {
        let session = self.inner.session.lock().await;
        match session.state {
            SessionState::Connected => session.identity.clone(),
            _ => None,
        }
    }

    /// Live handle, only while connected
    pub async fn active_session(&self) -> Option<Arc<dyn TransportSession>> {
        let session = self.inner.session.lock().await;
        match session.state {
            SessionState::Connected => session.handle.clone(),
            _ => None,
        }
    }

    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.inner.events
    }
}

async fn pump_events(inner: Weak<Inner>, generation: u64, mut rx: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.handle_event(generation, event).await {
            break;
        }
    }
    log::debug!("Event pump for connection attempt {} stopped", generation);
}

/// Audit entry produced while the session lock is held, recorded after it is released
type Note = (LogLevel, String);

impl Inner {
    /// Apply one event; returns false once the attempt it belongs to is over
    async fn handle_event(&self, generation: u64, event: TransportEvent) -> bool {
        let (notes, live) = {
            let mut session = self.session.lock().await;
            if session.generation != generation {
                log::debug!("Dropping event from ended connection attempt {}", generation);
                return false;
            }
            self.apply(&mut session, event)
        };

        for (level, message) in notes {
            self.events.record(level, message);
        }
        live
    }

    fn apply(&self, session: &mut Session, event: TransportEvent) -> (Vec<Note>, bool) {
        let mut notes = Vec::new();

        match event {
            TransportEvent::CredentialsUpdated(material) => {
                if let Err(e) = self.credentials.save(&material) {
                    notes.push((LogLevel::Error, format!("Failed to save credentials: {}", e)));
                }
            }
            TransportEvent::MessageReceived(message) => notes.extend(Self::on_message(&message)),
            TransportEvent::ConnectionUpdate(ConnectionUpdate::PairingChallenge(challenge)) => {
                if let Err(e) = self.pairing.accept(&challenge) {
                    notes.push((LogLevel::Error, format!("Failed to render pairing code: {}", e)));
                }
                session.state = SessionState::AwaitingPairing;
                notes.push((LogLevel::Info, "Pairing code received, waiting for scan".to_string()));
            }
            TransportEvent::ConnectionUpdate(ConnectionUpdate::Open(identity)) => {
                session.state = SessionState::Connected;
                self.pairing.clear();
                notes.push((
                    LogLevel::Success,
                    format!("Connected as {}", identity.name.as_deref().unwrap_or(&identity.id)),
                ));
                session.identity = Some(identity);
            }
            TransportEvent::ConnectionUpdate(ConnectionUpdate::Closed(reason)) => {
                session.reset();
                self.pairing.clear();
                notes.push(self.on_closed(&reason));
                return (notes, false);
            }
        }
        (notes, true)
    }

    fn on_message(message: &InboundMessage) -> Option<Note> {
        if message.from_me || !message.is_notify {
            return None;
        }
        let preview = message.text.as_deref().unwrap_or("media");
        Some((LogLevel::Info, format!("Message received from {}: {}", message.from, preview)))
    }

    fn on_closed(&self, reason: &CloseReason) -> Note {
        match reason {
            CloseReason::LoggedOut => match self.credentials.clear() {
                Ok(_) => (LogLevel::Warning, "Logged out by the platform, session removed".to_string()),
                Err(e) => (LogLevel::Error, format!("Logged out, but removing credentials failed: {}", e)),
            },
            CloseReason::RestartRequired => {
                (LogLevel::Warning, "Restart required, session kept for reconnection".to_string())
            }
            CloseReason::Other(detail) => (
                LogLevel::Warning,
                format!("Connection lost ({}), session kept for reconnection", detail),
            ),
        }
    }
}
