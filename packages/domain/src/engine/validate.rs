//! Envelope and payload shape checks.
//!
//! Every problem is collected so a client sees all of them at once.

use serde_json::{Map, Value};

use crate::command::Command;
use crate::constants::{command_types as t, is_resource_type, COMMAND_VERSION};
use crate::error::DomainError;

fn non_empty(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Payload fields each command type requires
fn required_fields(kind: &str) -> &'static [&'static str] {
    match kind {
        t::PROJECT_UPDATE => &["patch"],

        t::SCENE_CREATE | t::SCENE_RENAME => &["sceneId", "name"],
        t::SCENE_UPDATE => &["sceneId", "patch"],
        t::SCENE_DELETE | t::SCENE_SET_INITIAL => &["sceneId"],
        t::SCENE_REORDER => &["sceneId", "index"],

        t::SECTION_CREATE => &["sectionId", "sceneId", "name"],
        t::SECTION_RENAME => &["sectionId", "name"],
        t::SECTION_DELETE => &["sectionId"],
        t::SECTION_REORDER => &["sectionId", "index"],

        t::LINE_INSERT_AFTER => &["lineId", "sectionId", "line"],
        t::LINE_UPDATE_ACTIONS => &["lineId", "patch"],
        t::LINE_DELETE => &["lineId"],
        t::LINE_MOVE => &["lineId", "toSectionId", "index"],

        t::RESOURCE_CREATE => &["resourceType", "resourceId", "data"],
        t::RESOURCE_UPDATE => &["resourceType", "resourceId", "patch"],
        t::RESOURCE_RENAME => &["resourceType", "resourceId", "name"],
        t::RESOURCE_MOVE => &["resourceType", "resourceId", "index"],
        t::RESOURCE_DELETE => &["resourceType", "resourceId"],
        t::RESOURCE_DUPLICATE => &["resourceType", "sourceId", "newId"],

        t::LAYOUT_CREATE => &["layoutId", "name", "layoutType"],
        t::LAYOUT_RENAME => &["layoutId", "name"],
        t::LAYOUT_DELETE | t::LAYOUT_REORDER => &["layoutId"],
        t::LAYOUT_ELEMENT_CREATE => &["layoutId", "elementId", "element"],
        t::LAYOUT_ELEMENT_UPDATE => &["layoutId", "elementId", "patch"],
        t::LAYOUT_ELEMENT_MOVE => &["layoutId", "elementId", "index"],
        t::LAYOUT_ELEMENT_DELETE => &["layoutId", "elementId"],

        t::VARIABLE_CREATE => &["variableId", "name", "variableType", "initialValue"],
        t::VARIABLE_UPDATE => &["variableId", "patch"],
        t::VARIABLE_DELETE => &["variableId"],

        _ => &[],
    }
}

fn validate_envelope(command: &Command, errors: &mut Vec<String>) {
    if !non_empty(&command.id) {
        errors.push("id is required".into());
    }
    if !non_empty(&command.project_id) {
        errors.push("projectId is required".into());
    }
    if !non_empty(&command.partition) {
        errors.push("partition is required".into());
    }
    if let Some(partitions) = &command.partitions {
        if partitions.is_empty() {
            errors.push("partitions must be a non-empty array when provided".into());
        } else if partitions.iter().any(|partition| !non_empty(partition)) {
            errors.push("partitions entries must be non-empty strings".into());
        }
    }
    if !non_empty(&command.kind) {
        errors.push("type is required".into());
    }
    if command.command_version != COMMAND_VERSION {
        errors.push(format!("commandVersion must be {}", COMMAND_VERSION));
    }
    if !non_empty(&command.actor.user_id) {
        errors.push("actor.userId is required".into());
    }
    if !non_empty(&command.actor.client_id) {
        errors.push("actor.clientId is required".into());
    }
    if !t::ALL.contains(&command.kind.as_str()) {
        errors.push(format!("Unsupported command type: {}", command.kind));
    }
}

fn validate_payload(kind: &str, payload: &Map<String, Value>, errors: &mut Vec<String>) {
    for field in required_fields(kind) {
        if !payload.contains_key(*field) {
            errors.push(format!("payload.{} is required", field));
        }
    }

    if kind == t::LINE_INSERT_AFTER {
        match payload.get("afterLineId") {
            None | Some(Value::Null) => {}
            Some(Value::String(id)) if non_empty(id) => {}
            Some(_) => errors.push("payload.afterLineId must be non-empty string when provided".into()),
        }
    }

    match payload.get("resourceType") {
        None | Some(Value::Null) => {}
        Some(Value::String(kind)) if kind.is_empty() || is_resource_type(kind) => {}
        Some(Value::String(kind)) => errors.push(format!("Unsupported resourceType: {}", kind)),
        Some(other) => errors.push(format!("Unsupported resourceType: {}", other)),
    }

    if let Some(index) = payload.get("index") {
        if !(index.is_i64() || index.is_u64()) {
            errors.push("payload.index must be integer when provided".into());
        }
    }
}

/// Check the envelope and payload shape of `command`
pub fn validate_command(command: &Command) -> Result<(), DomainError> {
    let mut errors = Vec::new();
    validate_envelope(command, &mut errors);
    match command.payload_object() {
        Some(payload) => validate_payload(&command.kind, payload, &mut errors),
        None => errors.push("payload is required".into()),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors))
    }
}
