//! # Journal Actions
//!
//! The records an event log stores, persisted as `{type, payload}`:
//!
//! ```json
//! {"type": "insert", "payload": {
//!     "target": "resources.images",
//!     "value": {"id": "img1", "name": "Logo"},
//!     "options": {"parent": "_root", "position": "last"}
//! }}
//! ```
//!
//! `init`, `set` and `unset` work on arbitrary fields. The tree kinds
//! (`insert`, `delete`, `update`, `move`, `duplicate`) address a hierarchy
//! collection at `target` and delegate to [`tessera_hierarchy`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_hierarchy::{ItemData, ParentRef, Position, TreeMutation};

use crate::error::JournalError;
use crate::path::StatePath;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Action {
    /// Replace the whole state
    Init { value: Value },

    Set {
        target: StatePath,
        value: Value,
        #[serde(default)]
        options: SetOptions,
    },

    Unset { target: StatePath },

    #[serde(alias = "nodeInsert", alias = "treePush")]
    Insert(TreePayload),

    #[serde(alias = "nodeDelete", alias = "treeDelete")]
    Delete(TreePayload),

    #[serde(alias = "nodeUpdate", alias = "treeUpdate")]
    Update(TreePayload),

    #[serde(alias = "nodeMove", alias = "treeMove")]
    Move(TreePayload),

    #[serde(alias = "nodeDuplicate")]
    Duplicate(TreePayload),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetOptions {
    #[serde(default)]
    pub replace: bool,
}

/// Payload shared by the tree-scoped kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreePayload {
    pub target: StatePath,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default)]
    pub options: TreeOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "ParentRef::is_root")]
    pub parent: ParentRef,

    #[serde(default)]
    pub position: Position,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replace: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Init { .. } => "init",
            Action::Set { .. } => "set",
            Action::Unset { .. } => "unset",
            Action::Insert(_) => "insert",
            Action::Delete(_) => "delete",
            Action::Update(_) => "update",
            Action::Move(_) => "move",
            Action::Duplicate(_) => "duplicate",
        }
    }

    pub fn target(&self) -> Option<&StatePath> {
        match self {
            Action::Init { .. } => None,
            Action::Set { target, .. } | Action::Unset { target } => Some(target),
            Action::Insert(p)
            | Action::Delete(p)
            | Action::Update(p)
            | Action::Move(p)
            | Action::Duplicate(p) => Some(&p.target),
        }
    }

    /// The tree edit carried by a tree-scoped action
    pub fn tree_mutation(&self) -> Result<Option<TreeMutation>, JournalError> {
        let mutation = match self {
            Action::Init { .. } | Action::Set { .. } | Action::Unset { .. } => return Ok(None),

            Action::Insert(payload) => {
                let data = payload.item_data()?;
                let id = payload
                    .options
                    .id
                    .clone()
                    .or_else(|| data.get("id").and_then(Value::as_str).map(str::to_string))
                    .ok_or(JournalError::MissingField("value.id"))?;
                TreeMutation::Insert {
                    id,
                    data,
                    parent: payload.options.parent.clone(),
                    position: payload.options.position.clone(),
                }
            }

            Action::Delete(payload) => TreeMutation::Delete {
                id: payload.required_id()?,
            },

            Action::Update(payload) => TreeMutation::Update {
                id: payload.required_id()?,
                data: payload.item_data()?,
                replace: payload.options.replace,
            },

            Action::Move(payload) => TreeMutation::Move {
                id: payload.required_id()?,
                parent: payload.options.parent.clone(),
                position: payload.options.position.clone(),
            },

            Action::Duplicate(payload) => TreeMutation::Duplicate {
                id: payload.required_id()?,
                seed: payload.options.seed.clone(),
            },
        };
        Ok(Some(mutation))
    }

    pub fn init(value: Value) -> Self {
        Action::Init { value }
    }

    pub fn set(target: StatePath, value: Value, replace: bool) -> Self {
        Action::Set {
            target,
            value,
            options: SetOptions { replace },
        }
    }

    pub fn unset(target: StatePath) -> Self {
        Action::Unset { target }
    }

    pub fn insert(
        target: StatePath,
        id: &str,
        data: ItemData,
        parent: ParentRef,
        position: Position,
    ) -> Self {
        Action::Insert(TreePayload {
            target,
            value: Some(Value::Object(data)),
            options: TreeOptions {
                id: Some(id.to_string()),
                parent,
                position,
                ..Default::default()
            },
        })
    }

    pub fn delete(target: StatePath, id: &str) -> Self {
        Action::Delete(TreePayload::for_id(target, id))
    }

    pub fn update(target: StatePath, id: &str, data: ItemData, replace: bool) -> Self {
        let mut payload = TreePayload::for_id(target, id);
        payload.value = Some(Value::Object(data));
        payload.options.replace = replace;
        Action::Update(payload)
    }

    pub fn move_node(target: StatePath, id: &str, parent: ParentRef, position: Position) -> Self {
        let mut payload = TreePayload::for_id(target, id);
        payload.options.parent = parent;
        payload.options.position = position;
        Action::Move(payload)
    }

    pub fn duplicate(target: StatePath, id: &str, seed: &str) -> Self {
        let mut payload = TreePayload::for_id(target, id);
        payload.options.seed = Some(seed.to_string());
        Action::Duplicate(payload)
    }
}

impl TreePayload {
    fn for_id(target: StatePath, id: &str) -> Self {
        Self {
            target,
            value: None,
            options: TreeOptions {
                id: Some(id.to_string()),
                ..Default::default()
            },
        }
    }

    fn required_id(&self) -> Result<String, JournalError> {
        self.options
            .id
            .clone()
            .ok_or(JournalError::MissingField("options.id"))
    }

    fn item_data(&self) -> Result<ItemData, JournalError> {
        match &self.value {
            None | Some(Value::Null) => Ok(ItemData::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(JournalError::MissingField("value (object)")),
        }
    }
}
