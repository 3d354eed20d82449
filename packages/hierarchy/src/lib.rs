//! # Tessera Hierarchy
//!
//! Ordered tree collections and the pure primitives that edit them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Hierarchy { items, order }                  │
//! │  - items: id → data (never stores its id)   │
//! │  - order: forest of {id, children}          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ mutations: insert / delete / update /       │
//! │            move / duplicate                 │
//! │  - every call returns a new collection      │
//! │  - races with deletion resolve to no-ops    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ views: flat listing, folder groups, tree    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use tessera_hierarchy::{Hierarchy, ItemData, ParentRef, Position};
//!
//! let scenes = Hierarchy::new()
//!     .insert("a", ItemData::new(), &ParentRef::Root, &Position::Last)?
//!     .insert("b", ItemData::new(), &ParentRef::from("a"), &Position::Last)?;
//!
//! let moved = scenes.move_node("b", &ParentRef::Root, &Position::First);
//! assert_eq!(moved.ids(), vec!["b", "a"]);
//! # Ok::<(), tessera_hierarchy::HierarchyError>(())
//! ```

mod collection;
mod error;
pub mod forest;
mod ids;
mod mutations;
mod position;
mod views;

pub use collection::{Hierarchy, ItemData, Violation};
pub use error::HierarchyError;
pub use forest::{Forest, OrderNode};
pub use ids::{IdGenerator, SeededIdGenerator, SequenceIdGenerator, ID_LENGTH};
pub use mutations::{Duplicated, MutationResult, TreeMutation, COPY_SUFFIX};
pub use position::{position_for_index, resolve_index, ParentRef, Position, ROOT_ID};
pub use views::{FlatGroup, FlatItem, TreeItem};
