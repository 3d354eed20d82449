//! # Domain Model
//!
//! The normalized representation: one flat map per entity kind, with
//! ordering held by explicit id lists and nesting by `parentId`.
//!
//! ```text
//! story.sceneOrder ─▶ scenes[id].sectionIds ─▶ sections[id].lineIds ─▶ lines[id]
//! resources[type] { items[id].parentId, order }
//! layouts[id] { elements[id].{parentId, children}, rootElementOrder }
//! variables { items[id].parentId, order }
//! ```
//!
//! Fields the domain does not model travel in each entity's flattened
//! `extra`/`fields` map so nothing is lost on the way through.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tessera_hierarchy::Forest;

use crate::constants::{MODEL_VERSION, RESOURCE_TYPES};
use crate::error::DomainError;

pub type Id = String;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainState {
    #[serde(rename = "model_version")]
    pub model_version: u64,
    pub project: Project,
    pub story: Story,
    pub scenes: IndexMap<Id, Scene>,
    pub sections: IndexMap<Id, Section>,
    pub lines: IndexMap<Id, Line>,
    pub resources: IndexMap<String, ItemCollection>,
    pub layouts: IndexMap<Id, Layout>,
    #[serde(default)]
    pub layout_tree: Forest,
    pub variables: ItemCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(default)]
    pub initial_scene_id: Option<Id>,
    #[serde(default)]
    pub scene_order: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub section_ids: Vec<Id>,
    #[serde(default)]
    pub initial_section_id: Option<Id>,
    #[serde(default = "default_scene_position")]
    pub position: Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub extra: Fields,
}

pub fn default_scene_position() -> Value {
    json!({"x": 200, "y": 200})
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Id,
    pub scene_id: Id,
    pub name: String,
    #[serde(default)]
    pub line_ids: Vec<Id>,
    #[serde(default)]
    pub initial_line_id: Option<Id>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub id: Id,
    pub section_id: Id,
    #[serde(default)]
    pub actions: Fields,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub extra: Fields,
}

/// A resource or a variable (or a folder of either)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Id,
    #[serde(default)]
    pub parent_id: Option<Id>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Item {
    pub fn is_folder(&self) -> bool {
        self.fields.get("type").and_then(Value::as_str) == Some("folder")
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }
}

/// Items plus their flat pre-order; sibling order is the relative order
/// of ids sharing a `parentId`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemCollection {
    #[serde(default)]
    pub items: IndexMap<Id, Item>,
    #[serde(default)]
    pub order: Vec<Id>,
}

impl ItemCollection {
    /// Ids whose parent is `parent`, in collection order
    pub fn siblings(&self, parent: Option<&str>) -> Vec<Id> {
        self.order
            .iter()
            .filter(|id| {
                self.items
                    .get(id.as_str())
                    .map_or(false, |item| item.parent_id.as_deref() == parent)
            })
            .cloned()
            .collect()
    }

    /// `id` and every item below it, breadth first
    pub fn subtree(&self, id: &str) -> Vec<Id> {
        let mut out = vec![id.to_string()];
        let mut cursor = 0;
        while cursor < out.len() {
            let current = out[cursor].clone();
            for (child_id, item) in &self.items {
                if item.parent_id.as_deref() == Some(current.as_str()) && !out.contains(child_id) {
                    out.push(child_id.clone());
                }
            }
            cursor += 1;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub id: Id,
    #[serde(rename = "type", default = "default_layout_kind")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_type: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub elements: IndexMap<Id, LayoutElement>,
    #[serde(default)]
    pub root_element_order: Vec<Id>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub extra: Fields,
}

fn default_layout_kind() -> String {
    "layout".to_string()
}

impl Layout {
    pub fn is_folder(&self) -> bool {
        self.kind == "folder"
    }

    /// Children list an element with parent `parent` lives in
    pub(crate) fn children_mut(&mut self, parent: Option<&str>) -> Result<&mut Vec<Id>, DomainError> {
        match parent {
            None => Ok(&mut self.root_element_order),
            Some(parent_id) => self
                .elements
                .get_mut(parent_id)
                .map(|element| &mut element.children)
                .ok_or_else(|| DomainError::missing("layout element", parent_id)),
        }
    }

    /// True if `candidate` is `ancestor` or sits below it
    pub fn element_within(&self, ancestor: &str, candidate: &str) -> bool {
        let mut cursor = Some(candidate.to_string());
        let mut steps = 0;
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.elements.len() {
                return false;
            }
            cursor = self.elements.get(&id).and_then(|element| element.parent_id.clone());
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutElement {
    pub id: Id,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub children: Vec<Id>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl DomainState {
    /// Empty project with every resource collection present
    pub fn empty(project_id: &str, now: Timestamp) -> Self {
        Self {
            model_version: MODEL_VERSION,
            project: Project {
                id: project_id.to_string(),
                name: String::new(),
                description: String::new(),
                created_at: now,
                updated_at: now,
                extra: Fields::new(),
            },
            story: Story::default(),
            scenes: IndexMap::new(),
            sections: IndexMap::new(),
            lines: IndexMap::new(),
            resources: RESOURCE_TYPES
                .iter()
                .map(|kind| (kind.to_string(), ItemCollection::default()))
                .collect(),
            layouts: IndexMap::new(),
            layout_tree: Forest::new(),
            variables: ItemCollection::default(),
        }
    }

    /// Raise `project.updatedAt` to `now` if it is behind
    pub fn touch(&mut self, now: Timestamp) {
        self.project.updated_at = self.project.updated_at.max(now);
    }

    pub fn resource_collection(&self, resource_type: &str) -> Option<&ItemCollection> {
        self.resources.get(resource_type)
    }

    pub(crate) fn resource_collection_mut(
        &mut self,
        resource_type: &str,
    ) -> Result<&mut ItemCollection, DomainError> {
        self.resources
            .get_mut(resource_type)
            .ok_or_else(|| DomainError::missing("resource collection", resource_type))
    }
}

/// Shallow-merge `patch` into `entity` through its JSON form, skipping the
/// `protected` keys
pub(crate) fn merge_patch<T>(entity: &T, patch: &Fields, protected: &[&str]) -> Result<T, DomainError>
where
    T: Serialize + DeserializeOwned,
{
    let malformed = |e: serde_json::Error| DomainError::MalformedPayload {
        kind: "patch".into(),
        message: e.to_string(),
    };
    let mut value = serde_json::to_value(entity).map_err(malformed)?;
    if let Value::Object(object) = &mut value {
        for (key, field) in patch {
            if protected.contains(&key.as_str()) {
                continue;
            }
            object.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value).map_err(malformed)
}
