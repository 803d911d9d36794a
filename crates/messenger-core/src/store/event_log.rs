//! Capped audit trail of lifecycle and send events

use super::json_file::{read_json, write_json_atomic};
use crate::constants::EVENT_LOG_CAPACITY;
use crate::error::Result;
use messenger_types::{LogEntry, LogLevel};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Append-only log holding at most `capacity` of the most recent entries.
///
/// Every record is mirrored to the `log` facade. When backed by a file the
/// whole log is rewritten after each append; write failures only produce a
/// process log warning.
pub struct EventLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    path: Option<PathBuf>,
    /// Held across file writes so a stale snapshot never lands last
    writer: Mutex<()>,
}

impl EventLog {
    /// Log that lives only in memory
    pub fn in_memory(capacity: usize) -> Self {
        let capacity = Self::clamp_capacity(capacity);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            path: None,
            writer: Mutex::new(()),
        }
    }

    /// Log persisted at `path`, seeded with whatever the file already holds
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let capacity = Self::clamp_capacity(capacity);

        let stored: Vec<LogEntry> = read_json(&path)?.unwrap_or_default();
        let skip = stored.len().saturating_sub(capacity);
        let entries: VecDeque<LogEntry> = stored.into_iter().skip(skip).collect();

        if !path.exists() {
            write_json_atomic(&path, &entries)?;
        }

        Ok(Self {
            entries: Mutex::new(entries),
            capacity,
            path: Some(path),
            writer: Mutex::new(()),
        })
    }

    fn clamp_capacity(capacity: usize) -> usize {
        capacity.clamp(1, EVENT_LOG_CAPACITY)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an entry, evicting the oldest ones beyond capacity
    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);

        match level {
            LogLevel::Info | LogLevel::Success => log::info!("{}", entry.message),
            LogLevel::Warning => log::warn!("{}", entry.message),
            LogLevel::Error => log::error!("{}", entry.message),
        }

        let Some(path) = &self.path else {
            self.push(entry);
            return;
        };

        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = self.push(entry);
        if let Err(e) = write_json_atomic(path, &snapshot) {
            log::warn!("Failed to persist event log to {}: {}", path.display(), e);
        }
    }

    /// Append under the entries lock and return what should be on disk
    fn push(&self, entry: LogEntry) -> Vec<LogEntry> {
        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        if self.path.is_some() {
            entries.iter().cloned().collect()
        } else {
            Vec::new()
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.record(LogLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.record(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message);
    }

    /// Snapshot, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry, including the persisted copy
    pub fn clear(&self) -> Result<()> {
        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.lock().clear();
        if let Some(path) = &self.path {
            write_json_atomic(path, &Vec::<LogEntry>::new())?;
        }
        Ok(())
    }
}
