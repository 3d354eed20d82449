//! Parent references and sibling positions

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::forest::OrderNode;

/// Reserved parent identifier for the top level of the forest
pub const ROOT_ID: &str = "_root";

/// Where a node hangs: the forest top level or under an existing item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ParentRef {
    #[default]
    Root,
    Node(String),
}

impl ParentRef {
    /// `None`, an empty string, and `_root` all mean the top level
    pub fn from_option(id: Option<&str>) -> Self {
        match id {
            None | Some("") | Some(ROOT_ID) => ParentRef::Root,
            Some(id) => ParentRef::Node(id.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ParentRef::Root => ROOT_ID,
            ParentRef::Node(id) => id,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            ParentRef::Root => None,
            ParentRef::Node(id) => Some(id),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, ParentRef::Root)
    }
}

impl From<&str> for ParentRef {
    fn from(id: &str) -> Self {
        ParentRef::from_option(Some(id))
    }
}

impl From<String> for ParentRef {
    fn from(id: String) -> Self {
        ParentRef::from_option(Some(&id))
    }
}

impl std::fmt::Display for ParentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ParentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ParentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = Option::<String>::deserialize(deserializer)?;
        Ok(ParentRef::from_option(id.as_deref()))
    }
}

/// Position of a node among its siblings.
///
/// Serialized as `"first"`, `"last"`, `{"before": id}` or `{"after": id}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    First,
    Last,
    Before(String),
    After(String),
}

impl Position {
    /// Index in `siblings` this position resolves to.
    ///
    /// A `before` reference that is not among the siblings resolves to the
    /// start, an `after` reference to the end.
    pub fn index_in(&self, siblings: &[OrderNode]) -> usize {
        let lookup = |id: &str| siblings.iter().position(|node| node.id == id);
        match self {
            Position::First => 0,
            Position::Last => siblings.len(),
            Position::Before(id) => lookup(id).unwrap_or(0),
            Position::After(id) => lookup(id).map(|i| i + 1).unwrap_or(siblings.len()),
        }
    }
}

/// Translate a position into an index among `siblings`, ignoring the node
/// that is being moved so callers get the index it will occupy afterwards.
pub fn resolve_index(siblings: &[&str], position: &Position, moving_id: Option<&str>) -> usize {
    let filtered: Vec<&str> = siblings
        .iter()
        .copied()
        .filter(|id| Some(*id) != moving_id)
        .collect();
    let lookup = |target: &str| filtered.iter().position(|id| *id == target);
    match position {
        Position::First => 0,
        Position::Last => filtered.len(),
        Position::Before(target) => lookup(target).unwrap_or(0),
        Position::After(target) => lookup(target).map(|i| i + 1).unwrap_or(filtered.len()),
    }
}

/// Inverse of [`resolve_index`]: describe an index as an anchored position.
pub fn position_for_index(siblings: &[&str], index: usize) -> Position {
    if index == 0 || siblings.is_empty() {
        return Position::First;
    }
    match siblings.get(index - 1) {
        Some(prev) if index < siblings.len() => Position::After((*prev).to_string()),
        _ => Position::Last,
    }
}
