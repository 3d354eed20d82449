//! Repository configuration

use serde::{Deserialize, Serialize};
use tessera_journal::{JournalConfig, DEFAULT_SNAPSHOT_INTERVAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryConfig {
    /// Checkpoint every N events during replay; 0 disables checkpoints
    pub snapshot_interval: usize,

    /// Run the storage round-trip check after every projected command
    pub verify_round_trip: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            verify_round_trip: true,
        }
    }
}

impl RepositoryConfig {
    pub fn journal(&self) -> JournalConfig {
        JournalConfig {
            snapshot_interval: self.snapshot_interval,
        }
    }
}
