//! # Command Pipeline
//!
//! Carries one typed command from the stored document to the next stored
//! document:
//!
//! ```text
//! Received → ProjectedToDomain → Reduced → ProjectedToStorage → Journaled → Visible
//! ```
//!
//! The pipeline itself is pure and runs the first four stages. The
//! repository journals the result and makes it visible; a command that
//! fails any stage never reaches the log.

use std::fmt;

use serde_json::Value;
use tessera_domain::{
    check_round_trip, to_domain, to_storage, Command, DomainEngine, DomainEvent, DomainState,
    ProjectionContext, StandardEngine,
};
use tracing::{debug, info_span};

use crate::errors::EditorError;

/// Where a command is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    ProjectedToDomain,
    Reduced,
    ProjectedToStorage,
    Journaled,
    Visible,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::ProjectedToDomain => "projected-to-domain",
            Stage::Reduced => "reduced",
            Stage::ProjectedToStorage => "projected-to-storage",
            Stage::Journaled => "journaled",
            Stage::Visible => "visible",
        };
        f.write_str(name)
    }
}

/// Result of running a command through the pure stages
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Stored document after the command
    pub storage: Value,

    /// Domain state after the command
    pub domain: DomainState,

    /// Event the domain engine recorded
    pub event: DomainEvent,

    /// Last stage reached
    pub stage: Stage,
}

/// Runs typed commands against stored documents
#[derive(Debug, Clone)]
pub struct CommandPipeline<E = StandardEngine> {
    engine: E,
    verify_round_trip: bool,
}

impl Default for CommandPipeline<StandardEngine> {
    fn default() -> Self {
        Self::new(StandardEngine)
    }
}

impl<E: DomainEngine> CommandPipeline<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            verify_round_trip: true,
        }
    }

    pub fn verify_round_trip(mut self, verify: bool) -> Self {
        self.verify_round_trip = verify;
        self
    }

    /// Run `command` on `storage` for the project `project_id`
    pub fn run(&self, storage: &Value, command: &Command, project_id: &str) -> Result<PipelineResult, EditorError> {
        let span = info_span!("command", command_id = %command.id, command_type = %command.kind);
        let _enter = span.enter();
        debug!(stage = %Stage::Received);

        if !command.is_directly_projectable() {
            return Err(EditorError::NoProjectionHandler(command.kind.clone()));
        }

        let ctx = ProjectionContext::new(project_id, command.client_ts);
        let before = to_domain(storage, &ctx);
        debug!(stage = %Stage::ProjectedToDomain);

        let processed = self.engine.process(&before, command)?;
        debug!(stage = %Stage::Reduced, event_type = %processed.event.kind);

        let next = to_storage(&processed.state, storage)?;
        if self.verify_round_trip {
            check_round_trip(&next, &ctx)?;
        }
        debug!(stage = %Stage::ProjectedToStorage);

        Ok(PipelineResult {
            storage: next,
            domain: processed.state,
            event: processed.event,
            stage: Stage::ProjectedToStorage,
        })
    }
}
