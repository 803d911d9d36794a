//! File-backed stores: booking records, credential material, audit log, templates

pub mod json_file;
pub mod records;
pub mod credentials;
pub mod event_log;
pub mod templates;

pub use records::{Collection, JsonRecordStore, RecordStore};
pub use credentials::{CredentialMaterial, CredentialStore, FileCredentialStore};
pub use event_log::EventLog;
pub use templates::{MessageTemplates, TemplateValues};
