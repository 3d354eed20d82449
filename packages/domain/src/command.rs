//! # Command Envelope
//!
//! A typed command as it is submitted, journaled and replayed:
//!
//! ```json
//! {
//!   "id": "6f1c…", "projectId": "p1",
//!   "partition": "project:p1:story",
//!   "partitions": ["project:p1:story"],
//!   "type": "scene.create",
//!   "payload": {"sceneId": "s1", "name": "Intro"},
//!   "actor": {"userId": "u1", "clientId": "c1"},
//!   "clientTs": 1700000000000,
//!   "commandVersion": 1
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::{command_types, partitions, COMMAND_VERSION};
use crate::model::Timestamp;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub client_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            client_id: client_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub partition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<Vec<String>>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub actor: Actor,
    pub client_ts: Timestamp,
    pub command_version: u64,
}

impl Command {
    /// New command with a fresh id, the current time, and the partition
    /// its type belongs to
    pub fn new(project_id: &str, kind: &str, payload: Value, actor: Actor) -> Self {
        let partition = partition_for(project_id, scope_for(kind));
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            partitions: Some(vec![partition.clone()]),
            partition,
            kind: kind.to_string(),
            payload,
            actor,
            client_ts: chrono::Utc::now().timestamp_millis(),
            command_version: COMMAND_VERSION,
        }
    }

    pub fn with_client_ts(mut self, client_ts: Timestamp) -> Self {
        self.client_ts = client_ts;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attribute the command to extra partitions as well
    pub fn with_partitions<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec![self.partition.clone()];
        all.extend(self.partitions.take().unwrap_or_default());
        all.extend(extra.into_iter().map(Into::into));
        self.partitions = Some(unique_partitions(all));
        self
    }

    /// Every partition the command is attributed to, base partition first
    pub fn all_partitions(&self) -> Vec<String> {
        let mut all = vec![self.partition.clone()];
        all.extend(self.partitions.clone().unwrap_or_default());
        unique_partitions(all)
    }

    pub fn payload_object(&self) -> Option<&Map<String, Value>> {
        self.payload.as_object()
    }

    /// True if the command's type is handled by the domain projection
    pub fn is_directly_projectable(&self) -> bool {
        is_directly_projectable(&self.kind)
    }
}

/// `project:<projectId>:<scope>`
pub fn partition_for(project_id: &str, scope: &str) -> String {
    format!("project:{}:{}", project_id, scope)
}

/// Partition scope a command type is synchronized under
pub fn scope_for(kind: &str) -> &'static str {
    match kind.split('.').next().unwrap_or_default() {
        "scene" | "section" | "line" => partitions::STORY,
        "resource" => partitions::RESOURCES,
        "layout" => partitions::LAYOUTS,
        _ => partitions::SETTINGS,
    }
}

/// Drop empty and repeated partitions, keeping first occurrences
pub fn unique_partitions<I, S>(partitions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for partition in partitions {
        let partition = partition.into();
        if partition.is_empty() || out.contains(&partition) {
            continue;
        }
        out.push(partition);
    }
    out
}

const PROJECTABLE_PREFIXES: [&str; 6] = ["resource.", "scene.", "section.", "line.", "layout.", "variable."];

pub fn is_directly_projectable(kind: &str) -> bool {
    kind == command_types::PROJECT_UPDATE
        || PROJECTABLE_PREFIXES.iter().any(|prefix| kind.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_command_envelope() {
        let command = Command::new("p1", "scene.create", json!({"sceneId": "s1"}), Actor::new("u", "c"));
        assert_eq!(command.partition, "project:p1:story");
        assert_eq!(command.command_version, COMMAND_VERSION);
        assert!(!command.id.is_empty());

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["type"], json!("scene.create"));
        assert_eq!(value["actor"], json!({"userId": "u", "clientId": "c"}));
        let back: Command = serde_json::from_value(value).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn test_partitions_base_first_and_unique() {
        let command = Command::new("p1", "resource.create", json!({}), Actor::default())
            .with_partitions(["project:p1:story", "project:p1:resources", ""]);
        assert_eq!(
            command.partitions.as_deref().unwrap(),
            ["project:p1:resources", "project:p1:story"]
        );
        assert_eq!(command.all_partitions()[0], "project:p1:resources");
    }

    #[test]
    fn test_projectable_prefixes() {
        assert!(is_directly_projectable("project.update"));
        assert!(is_directly_projectable("layout.element.move"));
        assert!(!is_directly_projectable("project.create"));
        assert!(!is_directly_projectable("settings.update"));
        assert!(!is_directly_projectable("scenes"));
    }

    #[test]
    fn test_scope_for_types() {
        assert_eq!(scope_for("line.move"), "story");
        assert_eq!(scope_for("resource.delete"), "resources");
        assert_eq!(scope_for("layout.element.create"), "layouts");
        assert_eq!(scope_for("variable.update"), "settings");
        assert_eq!(scope_for("project.update"), "settings");
    }
}
