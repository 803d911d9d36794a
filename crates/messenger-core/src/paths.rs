/// Path constants and utilities for the messaging service
use std::path::PathBuf;
use once_cell::sync::OnceCell;

// Static storage for configurable data root
static DATA_ROOT: OnceCell<String> = OnceCell::new();

const DEFAULT_DATA_ROOT: &str = "/data/messenger";

/// Initialize the data root directory. Can only be called once.
/// If not called, the default `/data/messenger` will be used.
pub fn init_data_root(path: String) -> Result<(), String> {
    DATA_ROOT.set(path).map_err(|_| "Data root already initialized".to_string())
}

fn get_data_root() -> &'static str {
    DATA_ROOT.get().map(|s| s.as_str()).unwrap_or(DEFAULT_DATA_ROOT)
}

// Directory names (relative to the data root)
pub const AUTH_DIR_NAME: &str = "auth";
pub const DATABASE_DIR_NAME: &str = "database";

// File names inside the database directory
pub const BOOKINGS_FILE_NAME: &str = "bookings.json";
pub const CLIENTS_FILE_NAME: &str = "clients.json";
pub const SERVICES_FILE_NAME: &str = "services.json";
pub const EVENT_LOG_FILE_NAME: &str = "messaging_log.json";
pub const TEMPLATES_FILE_NAME: &str = "message_templates.json";

pub fn data_root() -> PathBuf {
    PathBuf::from(get_data_root())
}

/// Directory holding persisted credential material
pub fn auth_dir() -> PathBuf {
    data_root().join(AUTH_DIR_NAME)
}

pub fn database_dir() -> PathBuf {
    data_root().join(DATABASE_DIR_NAME)
}

pub fn event_log_path() -> PathBuf {
    database_dir().join(EVENT_LOG_FILE_NAME)
}

pub fn templates_path() -> PathBuf {
    database_dir().join(TEMPLATES_FILE_NAME)
}

/// Get all directories that must exist before the service starts
pub fn all_service_directories() -> Vec<PathBuf> {
    vec![data_root(), auth_dir(), database_dir()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_root() {
        assert_eq!(get_data_root(), DEFAULT_DATA_ROOT);
        assert_eq!(auth_dir().to_str().unwrap(), "/data/messenger/auth");
        assert_eq!(database_dir().to_str().unwrap(), "/data/messenger/database");
    }

    #[test]
    fn test_files_live_in_database_dir() {
        assert!(event_log_path().starts_with(database_dir()));
        assert!(templates_path().starts_with(database_dir()));
        assert!(event_log_path().ends_with(EVENT_LOG_FILE_NAME));
    }

    #[test]
    fn test_all_directories_unique() {
        let all_dirs = all_service_directories();
        let unique_dirs: HashSet<_> = all_dirs.iter().collect();
        assert_eq!(all_dirs.len(), unique_dirs.len());
        for dir in &all_dirs {
            assert!(dir.starts_with(data_root()));
        }
    }
}
