//! # Event Stores
//!
//! Where a repository's events live between sessions. A store only ever
//! appends; it never rewrites or reorders what it holds.
//!
//! [`JsonlStore`] keeps one `{type, payload}` record per line:
//!
//! ```text
//! {"type":"init","payload":{"value":{...}}}
//! {"type":"typedCommand","payload":{"projectId":"p1","command":{...}}}
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::StoreError;
use crate::event::RepositoryEvent;

/// Append-only persistence for repository events
pub trait EventStore {
    /// Every stored event, oldest first
    fn load(&self) -> Result<Vec<RepositoryEvent>, StoreError>;

    fn append(&mut self, event: &RepositoryEvent) -> Result<(), StoreError>;
}

/// Events held in memory only
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    events: Vec<RepositoryEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<RepositoryEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[RepositoryEvent] {
        &self.events
    }
}

impl EventStore for MemoryStore {
    fn load(&self) -> Result<Vec<RepositoryEvent>, StoreError> {
        Ok(self.events.clone())
    }

    fn append(&mut self, event: &RepositoryEvent) -> Result<(), StoreError> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Events in a JSON Lines file
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    /// Store backed by `path`; the file is created on first append
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventStore for JsonlStore {
    fn load(&self) -> Result<Vec<RepositoryEvent>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
                line: index + 1,
                message: e.to_string(),
            })?;
            events.push(event);
        }
        debug!(path = %self.path.display(), events = events.len(), "event log loaded");
        Ok(events)
    }

    fn append(&mut self, event: &RepositoryEvent) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(event).map_err(|e| StoreError::Encode(e.to_string()))?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
