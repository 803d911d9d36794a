//! Persistence of session credential material across restarts

use super::json_file::{read_json, write_json_atomic};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key under which the primary credential document is stored
pub const PRIMARY_ENTRY: &str = "creds";

/// Opaque key material needed to resume a session without pairing again.
///
/// The transport decides what goes inside; this service only stores it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CredentialMaterial {
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl CredentialMaterial {
    /// Initial material for a device that has never paired
    pub fn fresh() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            PRIMARY_ENTRY.to_string(),
            serde_json::json!({
                "registrationId": uuid::Uuid::new_v4().to_string(),
                "createdAt": chrono::Utc::now().to_rfc3339(),
            }),
        );
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }
}

/// Load/save/clear of credential material
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<CredentialMaterial>>;

    fn save(&self, material: &CredentialMaterial) -> Result<()>;

    /// Delete everything persisted; returns the number of files removed
    fn clear(&self) -> Result<usize>;

    fn has_material(&self) -> bool {
        matches!(self.load(), Ok(Some(_)))
    }
}

/// On-disk shape of one entry; the key is kept verbatim next to its value
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    value: serde_json::Value,
}

/// One JSON file per credential entry inside the auth directory
pub struct FileCredentialStore {
    auth_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: AsRef<Path>>(auth_dir: P) -> Result<Self> {
        let auth_dir = auth_dir.as_ref().to_path_buf();
        fs::create_dir_all(&auth_dir)?;
        Ok(Self { auth_dir })
    }

    /// Entry keys may contain characters that are not valid in file names;
    /// those are written as `%XX` so distinct keys never share a file
    fn file_name_for(key: &str) -> String {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => name.push(byte as char),
                _ => name.push_str(&format!("%{:02X}", byte)),
            }
        }
        name.push_str(".json");
        name
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        if !self.auth_dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.auth_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<CredentialMaterial>> {
        let mut material = CredentialMaterial::default();

        for path in self.entry_files()? {
            if let Some(entry) = read_json::<StoredEntry>(&path)? {
                material.entries.insert(entry.key, entry.value);
            }
        }

        if material.is_empty() {
            return Ok(None);
        }

        log::debug!("Loaded {} credential entries from {}", material.entries.len(), self.auth_dir.display());
        Ok(Some(material))
    }

    fn save(&self, material: &CredentialMaterial) -> Result<()> {
        fs::create_dir_all(&self.auth_dir)?;

        for (key, value) in &material.entries {
            let path = self.auth_dir.join(Self::file_name_for(key));
            let entry = StoredEntry {
                key: key.clone(),
                value: value.clone(),
            };
            write_json_atomic(&path, &entry)?;
        }

        log::debug!("Saved {} credential entries", material.entries.len());
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        if !self.auth_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.auth_dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        log::info!("Removed {} credential files from {}", removed, self.auth_dir.display());
        Ok(removed)
    }
}
