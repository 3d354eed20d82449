//! # Domain Engine
//!
//! Turns a command into the next domain state plus the event that records
//! it. Every stage can reject the command; a rejected command leaves the
//! input state untouched.
//!
//! ```text
//! Command
//!    │ validate          envelope + payload shape
//!    │ preconditions     against the current state
//!    ▼
//! DomainEvent            past-tense type, meta from the envelope
//!    │ reduce            on a clone of the state
//!    │ invariants        whole-state consistency
//!    ▼
//! Processed { state, event }
//! ```

mod event;
mod invariants;
mod preconditions;
mod reducer;
mod validate;

pub use event::{command_to_event, event_type, is_known_event, DomainEvent, EventBody, EventMeta};
pub use invariants::assert_domain_invariants;
pub use preconditions::check_preconditions;
pub use reducer::apply_event;
pub use validate::validate_command;

use tracing::debug;

use crate::command::Command;
use crate::error::DomainError;
use crate::model::DomainState;

/// Result of processing one command
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub state: DomainState,
    pub event: DomainEvent,
}

/// A pure command reducer over the domain model
pub trait DomainEngine {
    fn process(&self, state: &DomainState, command: &Command) -> Result<Processed, DomainError>;
}

/// The reference engine for the full command set
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEngine;

impl DomainEngine for StandardEngine {
    fn process(&self, state: &DomainState, command: &Command) -> Result<Processed, DomainError> {
        validate_command(command)?;
        check_preconditions(state, command)?;

        let event = command_to_event(command);
        let mut next = state.clone();
        apply_event(&mut next, &event)?;
        assert_domain_invariants(&next)?;

        debug!(command_id = %command.id, event_type = %event.kind, "command reduced");
        Ok(Processed { state: next, event })
    }
}

/// Process `command` with the [`StandardEngine`]
pub fn process_command(state: &DomainState, command: &Command) -> Result<Processed, DomainError> {
    StandardEngine.process(state, command)
}
