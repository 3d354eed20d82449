use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tessera_editor::{JsonlStore, ProjectRepository, RepositoryConfig};
use tracing::debug;

pub const DEFAULT_CONFIG_NAME: &str = "tessera.config.json";

/// Tessera configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Project the event log belongs to
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Event log, relative to the config file
    #[serde(default = "default_log")]
    pub log: String,

    /// Replay and projection options
    #[serde(default)]
    pub repository: RepositoryConfig,
}

fn default_project_id() -> String {
    "default-project".to_string()
}

fn default_log() -> String {
    ".tessera/events.jsonl".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    /// Get absolute path to the event log
    pub fn get_log_path(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.log)
    }

    /// Replay the configured event log
    pub fn open_repository(&self, cwd: &str) -> anyhow::Result<ProjectRepository<JsonlStore>> {
        let path = self.get_log_path(cwd);
        debug!(project_id = %self.project_id, log = %path.display(), "opening event log");
        let store = JsonlStore::open(path);
        let repository = ProjectRepository::open(&self.project_id, store, self.repository)?;
        Ok(repository)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            log: default_log(),
            repository: RepositoryConfig::default(),
        }
    }
}
