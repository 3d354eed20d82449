//! # Project Repository
//!
//! A project's event log, its store, and the stored document they
//! materialize to.
//!
//! ```text
//! add_event ──preview──▶ store.append ──▶ journal.commit ──▶ state()
//!     ▲                                                        │
//! apply_command (typedCommand)                     assert model_version
//! apply_snapshot (typedSnapshot)
//! ```
//!
//! An event is reduced before it is persisted, so an event the reducer
//! rejects is never stored and never journaled.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_domain::{
    assert_supported_version, initial_storage_state, to_domain, to_storage, Command, DomainState,
    ProjectionContext,
};
use tessera_journal::{apply_action, Journal, Reducer, ReplayIndex};
use tracing::{debug, info};

use crate::collection::{Collection, CollectionTarget};
use crate::config::RepositoryConfig;
use crate::errors::EditorError;
use crate::event::{RepositoryEvent, TypedEvent};
use crate::pipeline::{CommandPipeline, Stage};
use crate::store::EventStore;

pub const TYPED_COMMAND_MODE: &str = "typed_command_event";
pub const TYPED_SNAPSHOT_MODE: &str = "typed_snapshot_event";

/// What applying a typed command or snapshot journaled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub event_count: usize,
    pub mode: String,
}

/// Folds repository events into the stored document
#[derive(Debug, Clone)]
pub struct RepositoryReducer {
    project_id: String,
    pipeline: CommandPipeline,
}

impl RepositoryReducer {
    pub fn new(project_id: &str, config: &RepositoryConfig) -> Self {
        Self {
            project_id: project_id.to_string(),
            pipeline: CommandPipeline::default().verify_round_trip(config.verify_round_trip),
        }
    }

    fn project_id_for(&self, requested: Option<&str>, state: &Value) -> String {
        requested
            .filter(|id| !id.is_empty())
            .or_else(|| Some(self.project_id.as_str()).filter(|id| !id.is_empty()))
            .or_else(|| state["project"]["id"].as_str())
            .unwrap_or("unknown-project")
            .to_string()
    }
}

impl Reducer for RepositoryReducer {
    type Event = RepositoryEvent;
    type State = Value;
    type Error = EditorError;

    fn initial(&self) -> Value {
        initial_storage_state(&self.project_id)
    }

    fn reduce(&self, state: &Value, event: &RepositoryEvent) -> Result<Value, EditorError> {
        let next = match event {
            RepositoryEvent::Action(action) => apply_action(state, action)?,
            RepositoryEvent::Typed(TypedEvent::TypedCommand(typed)) => {
                let project_id = self.project_id_for(typed.project_id.as_deref(), state);
                self.pipeline.run(state, &typed.command, &project_id)?.storage
            }
            RepositoryEvent::Typed(TypedEvent::TypedSnapshot(snapshot)) => to_storage(&snapshot.state, state)?,
        };
        assert_supported_version(&next)?;
        Ok(next)
    }
}

/// Event log + store + materialized stored document for one project
pub struct ProjectRepository<S: EventStore> {
    project_id: String,
    store: S,
    journal: Journal<RepositoryReducer>,
}

impl<S: EventStore> ProjectRepository<S> {
    /// Replay everything `store` holds
    pub fn open(project_id: &str, store: S, config: RepositoryConfig) -> Result<Self, EditorError> {
        let events = store.load()?;
        let reducer = RepositoryReducer::new(project_id, &config);
        let journal = Journal::from_events(reducer, events, config.journal())?;
        debug!(project_id, events = journal.len(), "repository opened");
        Ok(Self {
            project_id: project_id.to_string(),
            store,
            journal,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current stored document
    pub fn state(&self) -> &Value {
        self.journal.state()
    }

    /// Stored document after the first `index` events
    pub fn state_at(&self, index: impl Into<ReplayIndex>) -> Result<Value, EditorError> {
        let state = self.journal.state_at(index)?;
        assert_supported_version(&state)?;
        Ok(state)
    }

    pub fn events(&self) -> &[RepositoryEvent] {
        self.journal.events()
    }

    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    /// Journal `event`, returning its index in the log
    pub fn add_event(&mut self, event: RepositoryEvent) -> Result<usize, EditorError> {
        let prepared = self.journal.preview(&event)?;
        self.store.append(&event)?;
        let index = self.journal.commit(event, prepared)?;
        Ok(index)
    }

    /// Journal a typed command and project it into the stored document
    pub fn apply_command(&mut self, command: Command) -> Result<ApplyOutcome, EditorError> {
        if !command.is_directly_projectable() {
            return Err(EditorError::NoProjectionHandler(command.kind.clone()));
        }
        let command_id = command.id.clone();
        let command_type = command.kind.clone();
        let partitions = command.all_partitions();

        let index = self.add_event(RepositoryEvent::command(&self.project_id, command))?;
        info!(
            command_id = %command_id,
            command_type = %command_type,
            index,
            partitions = ?partitions,
            stage = %Stage::Journaled,
            "command journaled"
        );
        debug!(command_id = %command_id, stage = %Stage::Visible);

        Ok(ApplyOutcome {
            event_count: 1,
            mode: TYPED_COMMAND_MODE.to_string(),
        })
    }

    /// Journal a whole domain state, written over the current document
    pub fn apply_snapshot(&mut self, state: DomainState) -> Result<ApplyOutcome, EditorError> {
        self.add_event(RepositoryEvent::snapshot(&self.project_id, state))?;
        Ok(ApplyOutcome {
            event_count: 1,
            mode: TYPED_SNAPSHOT_MODE.to_string(),
        })
    }

    /// Current document in domain form
    pub fn domain_state(&self, now: i64) -> DomainState {
        to_domain(self.state(), &ProjectionContext::new(&self.project_id, now))
    }

    /// Collection-scoped edits on the collection `target` names
    pub fn collection(&mut self, target: &CollectionTarget) -> Result<Collection<'_, S>, EditorError> {
        let path = target.resolve(self.state())?;
        Ok(Collection::new(self, path))
    }

    /// True if every cached state equals a cold replay of the log
    pub fn verify(&self) -> Result<bool, EditorError> {
        self.journal.verify_cache()
    }
}
