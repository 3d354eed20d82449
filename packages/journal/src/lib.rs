//! # Tessera Journal
//!
//! Append-only event log and deterministic replay.
//!
//! ```text
//! Action ──append──▶ EventLog ──fold(Reducer)──▶ state
//!                        │
//!                        └── MaterializedCache (current + checkpoints)
//! ```
//!
//! Replay is a pure function of the events and a history index. The cache
//! is an optimization owned by the [`Journal`]; it is replaced on every
//! append and can be checked against a cold replay at any time.

mod action;
mod apply;
mod error;
mod log;
mod path;
mod replay;

pub use action::{Action, SetOptions, TreeOptions, TreePayload};
pub use apply::apply_action;
pub use error::{JournalError, PathError};
pub use log::EventLog;
pub use path::StatePath;
pub use replay::{
    materialize, ActionReducer, Journal, JournalConfig, MaterializedCache, Prepared, Reducer,
    ReplayIndex, DEFAULT_SNAPSHOT_INTERVAL,
};
