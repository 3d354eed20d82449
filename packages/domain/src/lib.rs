//! # Tessera Domain
//!
//! The normalized project model, its two-way projection to the stored
//! document, and the reference command engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   to_domain    ┌──────────────────────┐
//! │ storage document             │ ─────────────▶ │ DomainState          │
//! │  project, story, scenes,     │                │  flat maps + ordered │
//! │  layouts, variables,         │ ◀───────────── │  id lists            │
//! │  10 resource collections     │   to_storage   └──────────┬───────────┘
//! └──────────────────────────────┘                           │
//!                                                  Command ──▶ engine
//!                                                            │
//!                                               Processed { state, event }
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//! use tessera_domain::{
//!     initial_storage_state, process_command, to_domain, to_storage, Actor, Command,
//!     ProjectionContext,
//! };
//!
//! let storage = initial_storage_state("p1");
//! let state = to_domain(&storage, &ProjectionContext::new("p1", 0));
//!
//! let command = Command::new(
//!     "p1",
//!     "scene.create",
//!     json!({"sceneId": "s1", "name": "Intro"}),
//!     Actor::new("u1", "c1"),
//! );
//! let processed = process_command(&state, &command)?;
//! assert_eq!(processed.event.kind, "scene.created");
//!
//! let written = to_storage(&processed.state, &storage)?;
//! assert_eq!(written["scenes"]["items"]["s1"]["name"], json!("Intro"));
//! # Ok::<(), tessera_domain::DomainError>(())
//! ```

pub mod command;
pub mod constants;
pub mod engine;
mod error;
pub mod model;
pub mod projection;

pub use command::{Actor, Command};
pub use constants::{COMMAND_VERSION, MODEL_VERSION, RESOURCE_TYPES};
pub use engine::{process_command, DomainEngine, DomainEvent, EventMeta, Processed, StandardEngine};
pub use error::DomainError;
pub use model::{DomainState, Id, Item, ItemCollection, Layout, LayoutElement, Timestamp};
pub use projection::{
    assert_supported_version, check_round_trip, initial_storage_state, to_domain, to_storage,
    ProjectionContext,
};
