//! # Edit Session Management
//!
//! One actor's optimistic view of a project.
//!
//! Commands apply to the local document immediately and wait as pending
//! until the authority confirms or rejects them. When authoritative events
//! arrive the session rebases: it replays them from scratch and puts the
//! pending commands back on top, dropping any that no longer apply.

use std::collections::BTreeMap;

use serde_json::Value;
use tessera_domain::{Actor, Command};
use tessera_journal::{materialize, Reducer, ReplayIndex};
use tracing::{debug, warn};

use crate::config::RepositoryConfig;
use crate::errors::EditorError;
use crate::event::{RepositoryEvent, TypedEvent};
use crate::pipeline::CommandPipeline;
use crate::repository::RepositoryReducer;

/// Command waiting for the authority
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub command: Command,

    /// Partitions the command is attributed to, base partition first
    pub partitions: Vec<String>,
}

impl PendingCommand {
    pub fn id(&self) -> &str {
        &self.command.id
    }
}

/// Single actor's edit session
pub struct EditSession {
    pub actor: Actor,
    project_id: String,
    reducer: RepositoryReducer,
    pipeline: CommandPipeline,
    /// Document as the authority last described it
    authoritative: Value,
    /// `authoritative` plus every pending command
    local: Value,
    pending: Vec<PendingCommand>,
}

impl EditSession {
    pub fn new(project_id: &str, actor: Actor, config: &RepositoryConfig) -> Self {
        let reducer = RepositoryReducer::new(project_id, config);
        let initial = reducer.initial();
        Self {
            actor,
            project_id: project_id.to_string(),
            reducer,
            pipeline: CommandPipeline::default().verify_round_trip(config.verify_round_trip),
            authoritative: initial.clone(),
            local: initial,
            pending: Vec::new(),
        }
    }

    /// Local document, pending commands included
    pub fn state(&self) -> &Value {
        &self.local
    }

    pub fn authoritative(&self) -> &Value {
        &self.authoritative
    }

    pub fn pending(&self) -> &[PendingCommand] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Apply `command` locally and hold it as pending, returning its id
    pub fn apply_optimistic(&mut self, command: Command) -> Result<String, EditorError> {
        let result = self.pipeline.run(&self.local, &command, &self.project_id)?;
        self.local = result.storage;

        let id = command.id.clone();
        let partitions = command.all_partitions();
        self.pending.push(PendingCommand { command, partitions });
        debug!(command_id = %id, pending = self.pending.len(), "command applied optimistically");
        Ok(id)
    }

    /// The authority accepted `command_id`
    pub fn confirm(&mut self, command_id: &str) {
        self.pending.retain(|pending| pending.id() != command_id);
    }

    /// The authority refused `command_id`; the local document is rebuilt
    /// without it
    pub fn reject(&mut self, command_id: &str) -> Result<(), EditorError> {
        self.pending.retain(|pending| pending.id() != command_id);
        self.replay_pending()
    }

    /// Pending commands per partition; a command in several partitions
    /// appears under each
    pub fn pending_by_partition(&self) -> BTreeMap<String, Vec<&PendingCommand>> {
        let mut groups: BTreeMap<String, Vec<&PendingCommand>> = BTreeMap::new();
        for pending in &self.pending {
            for partition in &pending.partitions {
                groups.entry(partition.clone()).or_default().push(pending);
            }
        }
        groups
    }

    /// Replace the authoritative document with the replay of `events` and
    /// reapply pending commands on top. Returns how many were dropped.
    pub fn rebase(&mut self, events: &[RepositoryEvent]) -> Result<usize, EditorError> {
        self.authoritative = materialize(&self.reducer, events, ReplayIndex::Current)?;

        // Commands the authority already journaled are confirmed
        let journaled: Vec<&str> = events
            .iter()
            .filter_map(|event| match event {
                RepositoryEvent::Typed(TypedEvent::TypedCommand(typed)) => Some(typed.command.id.as_str()),
                _ => None,
            })
            .collect();
        self.pending.retain(|pending| !journaled.contains(&pending.id()));

        let before = self.pending.len();
        self.replay_pending()?;
        Ok(before - self.pending.len())
    }

    fn replay_pending(&mut self) -> Result<(), EditorError> {
        let mut local = self.authoritative.clone();
        let mut kept = Vec::with_capacity(self.pending.len());
        for pending in std::mem::take(&mut self.pending) {
            match self.pipeline.run(&local, &pending.command, &self.project_id) {
                Ok(result) => {
                    local = result.storage;
                    kept.push(pending);
                }
                Err(e) => {
                    warn!(command_id = %pending.id(), error = %e, "pending command dropped on rebase");
                }
            }
        }
        self.pending = kept;
        self.local = local;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> EditSession {
        EditSession::new("p1", Actor::new("u1", "client-1"), &RepositoryConfig::default())
    }

    fn command(kind: &str, payload: Value, id: &str) -> Command {
        Command::new("p1", kind, payload, Actor::new("u1", "client-1"))
            .with_id(id)
            .with_client_ts(10)
    }

    #[test]
    fn test_session_creation() {
        let session = session();
        assert_eq!(session.actor.client_id, "client-1");
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.state(), session.authoritative());
    }

    #[test]
    fn test_optimistic_commands_and_confirmation() {
        let mut session = session();
        let id = session
            .apply_optimistic(command("scene.create", json!({"sceneId": "s1", "name": "A"}), "c1"))
            .unwrap();
        assert_eq!(id, "c1");
        assert_eq!(session.pending_count(), 1);
        assert_eq!(session.state()["scenes"]["items"]["s1"]["name"], json!("A"));
        assert!(session.authoritative()["scenes"]["items"].get("s1").is_none());

        session.confirm("c1");
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_failed_command_is_not_pending() {
        let mut session = session();
        let result = session.apply_optimistic(command("scene.delete", json!({"sceneId": "ghost"}), "c1"));
        assert!(result.is_err());
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_reject_rebuilds_local_state() {
        let mut session = session();
        session
            .apply_optimistic(command("scene.create", json!({"sceneId": "s1", "name": "A"}), "c1"))
            .unwrap();
        session
            .apply_optimistic(command("scene.create", json!({"sceneId": "s2", "name": "B"}), "c2"))
            .unwrap();

        session.reject("c1").unwrap();
        assert_eq!(session.pending_count(), 1);
        assert!(session.state()["scenes"]["items"].get("s1").is_none());
        assert_eq!(session.state()["scenes"]["items"]["s2"]["name"], json!("B"));
    }

    #[test]
    fn test_rebase_drops_commands_that_no_longer_apply() {
        let mut session = session();
        session
            .apply_optimistic(command("scene.create", json!({"sceneId": "s1", "name": "Mine"}), "c1"))
            .unwrap();
        session
            .apply_optimistic(command("scene.rename", json!({"sceneId": "s1", "name": "Mine 2"}), "c2"))
            .unwrap();

        // Another client created s1 first; our create now conflicts and
        // the rename lands on their scene
        let theirs = command("scene.create", json!({"sceneId": "s1", "name": "Theirs"}), "other");
        let dropped = session.rebase(&[RepositoryEvent::command("p1", theirs)]).unwrap();

        assert_eq!(dropped, 1);
        assert_eq!(session.pending().len(), 1);
        assert_eq!(session.pending()[0].id(), "c2");
        assert_eq!(session.state()["scenes"]["items"]["s1"]["name"], json!("Mine 2"));
        assert_eq!(session.authoritative()["scenes"]["items"]["s1"]["name"], json!("Theirs"));
    }

    #[test]
    fn test_rebase_confirms_journaled_commands() {
        let mut session = session();
        let mine = command("scene.create", json!({"sceneId": "s1", "name": "A"}), "c1");
        session.apply_optimistic(mine.clone()).unwrap();
        let dropped = session.rebase(&[RepositoryEvent::command("p1", mine)]).unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.state(), session.authoritative());
    }

    #[test]
    fn test_pending_grouped_by_partition() {
        let mut session = session();
        session
            .apply_optimistic(command("scene.create", json!({"sceneId": "s1", "name": "A"}), "c1"))
            .unwrap();
        session
            .apply_optimistic(
                command("resource.create", json!({"resourceType": "images", "resourceId": "i", "data": {}}), "c2")
                    .with_partitions(["project:p1:story"]),
            )
            .unwrap();

        let groups = session.pending_by_partition();
        let ids = |partition: &str| groups[partition].iter().map(|p| p.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids("project:p1:story"), vec!["c1", "c2"]);
        assert_eq!(ids("project:p1:resources"), vec!["c2"]);
    }
}
