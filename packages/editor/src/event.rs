//! # Repository Events
//!
//! What a project repository journals. Plain journal [`Action`]s edit the
//! stored document directly; typed events go through the domain layer.
//!
//! ```json
//! {"type": "typedCommand", "payload": {"projectId": "p1", "command": {...}}}
//! {"type": "typedSnapshot", "payload": {"projectId": "p1", "state": {...}}}
//! {"type": "set", "payload": {"target": "project.name", "value": "Demo"}}
//! ```

use serde::{Deserialize, Serialize};
use tessera_domain::{Command, DomainState};
use tessera_journal::Action;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub state: DomainState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum TypedEvent {
    TypedCommand(TypedCommand),
    TypedSnapshot(TypedSnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepositoryEvent {
    Typed(TypedEvent),
    Action(Action),
}

impl RepositoryEvent {
    pub fn command(project_id: &str, command: Command) -> Self {
        RepositoryEvent::Typed(TypedEvent::TypedCommand(TypedCommand {
            project_id: Some(project_id.to_string()),
            command,
        }))
    }

    pub fn snapshot(project_id: &str, state: DomainState) -> Self {
        RepositoryEvent::Typed(TypedEvent::TypedSnapshot(TypedSnapshot {
            project_id: Some(project_id.to_string()),
            state,
        }))
    }

    /// The `type` this event is persisted under
    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryEvent::Typed(TypedEvent::TypedCommand(_)) => "typedCommand",
            RepositoryEvent::Typed(TypedEvent::TypedSnapshot(_)) => "typedSnapshot",
            RepositoryEvent::Action(action) => action.kind(),
        }
    }

    /// Partitions a typed command declares; empty for everything else
    pub fn partitions(&self) -> Vec<String> {
        match self {
            RepositoryEvent::Typed(TypedEvent::TypedCommand(typed)) => typed.command.all_partitions(),
            _ => Vec::new(),
        }
    }
}

impl From<Action> for RepositoryEvent {
    fn from(action: Action) -> Self {
        RepositoryEvent::Action(action)
    }
}
