//! Messenger Core Library
//!
//! Session lifecycle, message dispatch and the bulk booking workflows of the
//! appointment messaging service.

pub mod config;
pub mod constants;
pub mod error;
pub mod paths;
pub mod services;
pub mod store;
pub mod transport;
pub mod types;
pub mod workflow;

// Re-export main types for easy access
pub use config::MessengerConfig;
pub use error::{MessengerError, Result};

pub use services::{MessageDispatcher, PairingCodeProvider};

pub use store::{
    CredentialMaterial,
    CredentialStore,
    EventLog,
    FileCredentialStore,
    JsonRecordStore,
    MessageTemplates,
    RecordStore,
};

pub use transport::{LoopbackTransport, Transport, TransportEvent, TransportSession, UnlinkedTransport};

pub use types::{Booking, BookingStatus, Client, Clock, FixedClock, Service, SystemClock};

pub use workflow::{BookingOrchestrator, ConnectionManager, MessageSender, SessionState};
