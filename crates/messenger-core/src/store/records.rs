//! Booking, client and service collections kept as JSON arrays

use super::json_file::{read_json, write_json_atomic};
use crate::error::{MessengerError, Result};
use crate::paths;
use crate::types::{Booking, Client, Service};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Record collections this service reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Bookings,
    Clients,
    Services,
}

impl Collection {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Bookings => paths::BOOKINGS_FILE_NAME,
            Self::Clients => paths::CLIENTS_FILE_NAME,
            Self::Services => paths::SERVICES_FILE_NAME,
        }
    }
}

/// Read/write access to the record collections.
///
/// Writes replace the whole collection in one step.
pub trait RecordStore: Send + Sync {
    /// Fails with `NotFound` when the bookings collection does not exist
    fn read_bookings(&self) -> Result<Vec<Booking>>;

    fn write_bookings(&self, bookings: &[Booking]) -> Result<()>;

    /// Missing collection reads as empty
    fn read_clients(&self) -> Result<Vec<Client>>;

    /// Missing collection reads as empty
    fn read_services(&self) -> Result<Vec<Service>>;
}

/// Record store backed by one JSON file per collection
pub struct JsonRecordStore {
    root_path: PathBuf,
}

impl JsonRecordStore {
    pub fn new<P: AsRef<Path>>(root_path: P) -> Self {
        Self {
            root_path: root_path.as_ref().to_path_buf(),
        }
    }

    fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root_path.join(collection.file_name())
    }

    fn read_all(&self, collection: Collection) -> Result<Option<Vec<Value>>> {
        read_json(&self.collection_path(collection))
    }

    /// Parse every record on its own; `on_error` decides what a bad record becomes
    fn parse_each<T: DeserializeOwned>(
        collection: Collection,
        values: Vec<Value>,
        on_error: impl Fn(Value) -> Option<T>,
    ) -> Vec<T> {
        values
            .into_iter()
            .enumerate()
            .filter_map(|(position, value)| match serde_json::from_value::<T>(value.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("Unreadable record #{} in {}: {}", position, collection.file_name(), e);
                    on_error(value)
                }
            })
            .collect()
    }
}

impl RecordStore for JsonRecordStore {
    fn read_bookings(&self) -> Result<Vec<Booking>> {
        let values = self.read_all(Collection::Bookings)?.ok_or_else(|| {
            MessengerError::NotFound(format!(
                "Bookings collection not found at {}",
                self.collection_path(Collection::Bookings).display()
            ))
        })?;
        // Unreadable bookings stay in the collection so a rewrite keeps them
        Ok(Self::parse_each(Collection::Bookings, values, |raw| Some(Booking::unreadable(raw))))
    }

    fn write_bookings(&self, bookings: &[Booking]) -> Result<()> {
        let path = self.collection_path(Collection::Bookings);
        write_json_atomic(&path, bookings)
            .map_err(|e| MessengerError::Persistence(format!("Failed to write {}: {}", path.display(), e)))?;

        log::debug!("Wrote {} bookings to {}", bookings.len(), path.display());
        Ok(())
    }

    fn read_clients(&self) -> Result<Vec<Client>> {
        let values = self.read_all(Collection::Clients)?.unwrap_or_default();
        Ok(Self::parse_each(Collection::Clients, values, |_| None))
    }

    fn read_services(&self) -> Result<Vec<Service>> {
        let values = self.read_all(Collection::Services)?.unwrap_or_default();
        Ok(Self::parse_each(Collection::Services, values, |_| None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookingStatus;
    use tempfile::TempDir;

    #[test]
    fn test_missing_bookings_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonRecordStore::new(temp_dir.path());

        let result = store.read_bookings();
        assert!(matches!(result, Err(MessengerError::NotFound(_))));
    }

    #[test]
    fn test_missing_clients_and_services_are_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonRecordStore::new(temp_dir.path());

        assert!(store.read_clients().unwrap().is_empty());
        assert!(store.read_services().unwrap().is_empty());
    }

    #[test]
    fn test_write_replaces_whole_collection() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(paths::BOOKINGS_FILE_NAME),
            r#"[{"id":1,"cliente_id":1,"servico_id":1,"data_agendamento":"2026-10-14","horario":"10:00","status":"pendente"},
                {"id":2,"cliente_id":2,"servico_id":1,"data_agendamento":"2026-10-15","horario":"11:00","status":"pendente"}]"#,
        ).unwrap();
        let store = JsonRecordStore::new(temp_dir.path());

        let mut bookings = store.read_bookings().unwrap();
        bookings[0].status = BookingStatus::Confirmed;
        store.write_bookings(&bookings).unwrap();

        let reread = store.read_bookings().unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread[0].status, BookingStatus::Confirmed);
        assert_eq!(reread[1].status, BookingStatus::Pending);
        assert_eq!(reread[1].time_slot, "11:00");

        let raw = std::fs::read_to_string(temp_dir.path().join(paths::BOOKINGS_FILE_NAME)).unwrap();
        assert!(raw.contains(r#""status": "confirmado""#));
        assert!(raw.contains(r#""data_agendamento": "2026-10-15""#));
        assert!(!raw.contains("client_id"));
    }

    #[test]
    fn test_malformed_records_do_not_poison_the_collection() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(paths::BOOKINGS_FILE_NAME),
            r#"[{"id":1,"cliente_id":1,"servico_id":1,"data_agendamento":"2026-10-14","horario":"10:00","status":"pendente"},
                {"id":2,"cliente_id":"dois","servico_id":1,"data_agendamento":"2026-10-14","status":"pendente"}]"#,
        ).unwrap();
        std::fs::write(
            temp_dir.path().join(paths::CLIENTS_FILE_NAME),
            r#"[{"id":1,"nome":"Ana","telefone":"11987654321"},{"id":2,"telefone":"11912345678"}]"#,
        ).unwrap();
        let store = JsonRecordStore::new(temp_dir.path());

        let mut bookings = store.read_bookings().unwrap();
        assert_eq!(bookings.len(), 2);
        assert!(!bookings[0].is_unreadable());
        assert!(bookings[1].is_unreadable());

        let clients = store.read_clients().unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].name, "Ana");

        bookings[0].status = BookingStatus::Confirmed;
        store.write_bookings(&bookings).unwrap();

        let raw: Vec<Value> = serde_json::from_str(
            &std::fs::read_to_string(temp_dir.path().join(paths::BOOKINGS_FILE_NAME)).unwrap(),
        ).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0]["status"], "confirmado");
        assert_eq!(raw[1]["cliente_id"], "dois");
    }
}
