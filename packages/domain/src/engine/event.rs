//! Domain events and the command → event mapping.
//!
//! An event is the command's payload under a past-tense type, stamped with
//! where it came from. The payload stays raw JSON on the wire; the reducer
//! reads it through [`EventBody`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::command::{Actor, Command};
use crate::constants::command_types;
use crate::error::DomainError;
use crate::model::{Fields, Id, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    pub command_id: String,
    pub project_id: String,
    pub actor: Actor,
    /// The command's client timestamp; every time the reducer stamps
    pub ts: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub meta: EventMeta,
}

/// Past-tense event type for a command type
pub fn event_type(command_type: &str) -> String {
    const SUFFIXES: [(&str, &str); 6] = [
        (".create", ".created"),
        (".rename", ".renamed"),
        (".delete", ".deleted"),
        (".reorder", ".reordered"),
        (".move", ".moved"),
        (".update", ".updated"),
    ];
    for (suffix, past) in SUFFIXES {
        if let Some(stem) = command_type.strip_suffix(suffix) {
            return format!("{}{}", stem, past);
        }
    }
    match command_type {
        command_types::SCENE_SET_INITIAL => "scene.initial_set".into(),
        command_types::LINE_INSERT_AFTER => "line.inserted".into(),
        command_types::LINE_UPDATE_ACTIONS => "line.actions_updated".into(),
        command_types::RESOURCE_DUPLICATE => "resource.duplicated".into(),
        other => other.into(),
    }
}

/// True if some supported command maps onto `kind`
pub fn is_known_event(kind: &str) -> bool {
    command_types::ALL.iter().any(|command| event_type(command) == kind)
}

pub fn command_to_event(command: &Command) -> DomainEvent {
    DomainEvent {
        kind: event_type(&command.kind),
        payload: command.payload.clone(),
        meta: EventMeta {
            command_id: command.id.clone(),
            project_id: command.project_id.clone(),
            actor: command.actor.clone(),
            ts: command.client_ts,
        },
    }
}

impl DomainEvent {
    /// Typed view of the payload
    pub fn body(&self) -> Result<EventBody, DomainError> {
        if !is_known_event(&self.kind) {
            return Err(DomainError::UnknownEvent(self.kind.clone()));
        }
        serde_json::from_value(json!({"type": self.kind, "payload": self.payload})).map_err(|e| {
            DomainError::MalformedPayload {
                kind: self.kind.clone(),
                message: e.to_string(),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventBody {
    #[serde(rename = "project.updated")]
    ProjectUpdated(Patch),

    #[serde(rename = "scene.created")]
    SceneCreated(SceneCreated),
    #[serde(rename = "scene.updated")]
    SceneUpdated(ScenePatch),
    #[serde(rename = "scene.renamed")]
    SceneRenamed(SceneRenamed),
    #[serde(rename = "scene.deleted")]
    SceneDeleted(SceneRef),
    #[serde(rename = "scene.initial_set")]
    SceneInitialSet(SceneRef),
    #[serde(rename = "scene.reordered")]
    SceneReordered(SceneReordered),

    #[serde(rename = "section.created")]
    SectionCreated(SectionCreated),
    #[serde(rename = "section.renamed")]
    SectionRenamed(SectionRenamed),
    #[serde(rename = "section.deleted")]
    SectionDeleted(SectionRef),
    #[serde(rename = "section.reordered")]
    SectionReordered(SectionReordered),

    #[serde(rename = "line.inserted")]
    LineInserted(LineInserted),
    #[serde(rename = "line.actions_updated")]
    LineActionsUpdated(LineActionsUpdated),
    #[serde(rename = "line.deleted")]
    LineDeleted(LineRef),
    #[serde(rename = "line.moved")]
    LineMoved(LineMoved),

    #[serde(rename = "resource.created")]
    ResourceCreated(ResourceCreated),
    #[serde(rename = "resource.updated")]
    ResourceUpdated(ResourcePatch),
    #[serde(rename = "resource.renamed")]
    ResourceRenamed(ResourceRenamed),
    #[serde(rename = "resource.moved")]
    ResourceMoved(ResourceMoved),
    #[serde(rename = "resource.deleted")]
    ResourceDeleted(ResourceRef),
    #[serde(rename = "resource.duplicated")]
    ResourceDuplicated(ResourceDuplicated),

    #[serde(rename = "layout.created")]
    LayoutCreated(LayoutCreated),
    #[serde(rename = "layout.renamed")]
    LayoutRenamed(LayoutRenamed),
    #[serde(rename = "layout.deleted")]
    LayoutDeleted(LayoutRef),
    #[serde(rename = "layout.reordered")]
    LayoutReordered(LayoutReordered),
    #[serde(rename = "layout.element.created")]
    ElementCreated(ElementCreated),
    #[serde(rename = "layout.element.updated")]
    ElementUpdated(ElementPatch),
    #[serde(rename = "layout.element.moved")]
    ElementMoved(ElementMoved),
    #[serde(rename = "layout.element.deleted")]
    ElementDeleted(ElementRef),

    #[serde(rename = "variable.created")]
    VariableCreated(VariableCreated),
    #[serde(rename = "variable.updated")]
    VariableUpdated(VariablePatch),
    #[serde(rename = "variable.deleted")]
    VariableDeleted(VariableRef),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Patch {
    #[serde(default)]
    pub patch: Fields,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRef {
    pub scene_id: Id,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneCreated {
    pub scene_id: Id,
    pub name: String,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePatch {
    pub scene_id: Id,
    #[serde(default)]
    pub patch: Fields,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRenamed {
    pub scene_id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneReordered {
    pub scene_id: Id,
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
    pub section_id: Id,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCreated {
    pub section_id: Id,
    pub scene_id: Id,
    pub name: String,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRenamed {
    pub section_id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionReordered {
    pub section_id: Id,
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRef {
    pub line_id: Id,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineInserted {
    pub line_id: Id,
    pub section_id: Id,
    pub line: Value,
    #[serde(default)]
    pub after_line_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineActionsUpdated {
    pub line_id: Id,
    pub patch: Fields,
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMoved {
    pub line_id: Id,
    pub to_section_id: Id,
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_type: String,
    pub resource_id: Id,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCreated {
    pub resource_type: String,
    pub resource_id: Id,
    pub data: Fields,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePatch {
    pub resource_type: String,
    pub resource_id: Id,
    #[serde(default)]
    pub patch: Fields,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRenamed {
    pub resource_type: String,
    pub resource_id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMoved {
    pub resource_type: String,
    pub resource_id: Id,
    #[serde(default)]
    pub parent_id: Option<Id>,
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDuplicated {
    pub resource_type: String,
    pub source_id: Id,
    pub new_id: Id,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRef {
    pub layout_id: Id,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutCreated {
    pub layout_id: Id,
    pub name: String,
    pub layout_type: String,
    #[serde(default)]
    pub data: Fields,
    /// Initial elements as a stored `{items, order}` collection
    #[serde(default)]
    pub elements: Option<Value>,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRenamed {
    pub layout_id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutReordered {
    pub layout_id: Id,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRef {
    pub layout_id: Id,
    pub element_id: Id,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementCreated {
    pub layout_id: Id,
    pub element_id: Id,
    pub element: Fields,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPatch {
    pub layout_id: Id,
    pub element_id: Id,
    pub patch: Fields,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMoved {
    pub layout_id: Id,
    pub element_id: Id,
    #[serde(default)]
    pub parent_id: Option<Id>,
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableRef {
    pub variable_id: Id,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableCreated {
    pub variable_id: Id,
    pub name: String,
    pub variable_type: String,
    pub initial_value: Value,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub data: Fields,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablePatch {
    pub variable_id: Id,
    #[serde(default)]
    pub patch: Fields,
}
