pub mod apply;
pub mod check;
pub mod events;
pub mod init;
pub mod state;

pub use apply::{apply, ApplyArgs};
pub use check::{check, CheckArgs};
pub use events::{events, EventsArgs};
pub use init::{init, InitArgs};
pub use state::{state, StateArgs};
