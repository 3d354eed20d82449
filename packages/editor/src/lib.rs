//! # Tessera Editor
//!
//! Project repositories: event logs, their stores, and the stored documents
//! they materialize to.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ domain: typed commands, domain state,       │
//! │         storage ↔ domain projection         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: ProjectRepository                   │
//! │  - Typed command / snapshot events          │
//! │  - Collection-scoped tree edits             │
//! │  - Durable event stores (memory, JSONL)     │
//! │  - Optimistic edit sessions                 │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ journal: event log → materialized state     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The log is the source of truth**: the stored document is a replay
//! 2. **Reduce before persist**: a rejected event never reaches the store
//! 3. **Optimistic clients**: local state can be discarded and rebuilt
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//! use tessera_domain::{Actor, Command};
//! use tessera_editor::{MemoryStore, ProjectRepository, RepositoryConfig};
//!
//! let mut repo = ProjectRepository::open("p1", MemoryStore::new(), RepositoryConfig::default())?;
//! let command = Command::new("p1", "scene.create", json!({"sceneId": "s1", "name": "Intro"}), Actor::new("u1", "c1"));
//! repo.apply_command(command)?;
//!
//! assert_eq!(repo.state()["scenes"]["items"]["s1"]["name"], json!("Intro"));
//! # Ok::<(), tessera_editor::EditorError>(())
//! ```

mod collection;
mod config;
mod errors;
mod event;
mod pipeline;
mod repository;
mod session;
mod store;

pub use collection::{Collection, CollectionTarget};
pub use config::RepositoryConfig;
pub use errors::{EditorError, StoreError};
pub use event::{RepositoryEvent, TypedCommand, TypedEvent, TypedSnapshot};
pub use pipeline::{CommandPipeline, PipelineResult, Stage};
pub use repository::{ApplyOutcome, ProjectRepository, RepositoryReducer, TYPED_COMMAND_MODE, TYPED_SNAPSHOT_MODE};
pub use session::{EditSession, PendingCommand};
pub use store::{EventStore, JsonlStore, MemoryStore};
