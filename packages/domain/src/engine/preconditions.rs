//! Checks a command against the state it is about to change.

use serde_json::{Map, Value};

use crate::command::Command;
use crate::constants::command_types as t;
use crate::error::DomainError;
use crate::model::{DomainState, ItemCollection};

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), DomainError> {
    if condition {
        Ok(())
    } else {
        Err(DomainError::Precondition(message()))
    }
}

fn text<'a>(payload: &'a Map<String, Value>, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// A non-empty string parent id, if the payload names one
fn parent_of<'a>(object: &'a Map<String, Value>) -> Option<&'a str> {
    object.get("parentId").and_then(Value::as_str).filter(|id| !id.is_empty())
}

fn check_item_parent(
    collection: &ItemCollection,
    kind: &str,
    id: &str,
    parent: Option<&str>,
) -> Result<(), DomainError> {
    let Some(parent) = parent else {
        return Ok(());
    };
    ensure(parent != id, || format!("{} cannot parent itself: {}", kind, id))?;
    ensure(collection.items.contains_key(parent), || {
        format!("{} parent not found: {}", kind, parent)
    })?;
    ensure(!collection.subtree(id).iter().any(|below| below == parent), || {
        format!("{} cannot move into its own subtree: {} -> {}", kind, id, parent)
    })
}

/// Reject `command` if `state` does not allow it
pub fn check_preconditions(state: &DomainState, command: &Command) -> Result<(), DomainError> {
    if !state.project.id.is_empty() {
        ensure(state.project.id == command.project_id, || {
            format!(
                "projectId mismatch: expected {}, got {}",
                state.project.id, command.project_id
            )
        })?;
    }

    let empty = Map::new();
    let p = command.payload_object().unwrap_or(&empty);

    match command.kind.as_str() {
        t::SCENE_CREATE => {
            let id = text(p, "sceneId");
            ensure(!state.scenes.contains_key(id), || format!("scene already exists: {}", id))
        }
        t::SCENE_UPDATE | t::SCENE_RENAME | t::SCENE_DELETE | t::SCENE_SET_INITIAL | t::SCENE_REORDER => {
            let id = text(p, "sceneId");
            ensure(state.scenes.contains_key(id), || format!("scene not found: {}", id))
        }

        t::SECTION_CREATE => {
            let scene_id = text(p, "sceneId");
            let id = text(p, "sectionId");
            ensure(state.scenes.contains_key(scene_id), || {
                format!("parent scene not found: {}", scene_id)
            })?;
            ensure(!state.sections.contains_key(id), || format!("section already exists: {}", id))
        }
        t::SECTION_RENAME | t::SECTION_DELETE | t::SECTION_REORDER => {
            let id = text(p, "sectionId");
            ensure(state.sections.contains_key(id), || format!("section not found: {}", id))
        }

        t::LINE_INSERT_AFTER => {
            let section_id = text(p, "sectionId");
            let id = text(p, "lineId");
            ensure(state.sections.contains_key(section_id), || {
                format!("section not found: {}", section_id)
            })?;
            ensure(!state.lines.contains_key(id), || format!("line already exists: {}", id))?;
            let Some(after) = p.get("afterLineId").and_then(Value::as_str) else {
                return Ok(());
            };
            let Some(after_line) = state.lines.get(after) else {
                return Err(DomainError::Precondition(format!("afterLineId not found: {}", after)));
            };
            ensure(after_line.section_id == section_id, || {
                format!(
                    "afterLineId must belong to target section: {} is in {}, not {}",
                    after, after_line.section_id, section_id
                )
            })
        }
        t::LINE_UPDATE_ACTIONS | t::LINE_DELETE => {
            let id = text(p, "lineId");
            ensure(state.lines.contains_key(id), || format!("line not found: {}", id))
        }
        t::LINE_MOVE => {
            let id = text(p, "lineId");
            let to = text(p, "toSectionId");
            ensure(state.lines.contains_key(id), || format!("line not found: {}", id))?;
            ensure(state.sections.contains_key(to), || format!("target section not found: {}", to))
        }

        t::RESOURCE_CREATE
        | t::RESOURCE_UPDATE
        | t::RESOURCE_RENAME
        | t::RESOURCE_MOVE
        | t::RESOURCE_DELETE
        | t::RESOURCE_DUPLICATE => check_resource(state, &command.kind, p),

        t::LAYOUT_CREATE => {
            let id = text(p, "layoutId");
            ensure(!state.layouts.contains_key(id), || format!("layout already exists: {}", id))?;
            check_layout_parent(state, id, parent_of(p))
        }
        t::LAYOUT_RENAME | t::LAYOUT_DELETE => {
            let id = text(p, "layoutId");
            ensure(state.layouts.contains_key(id), || format!("layout not found: {}", id))
        }
        t::LAYOUT_REORDER => {
            let id = text(p, "layoutId");
            ensure(state.layouts.contains_key(id), || format!("layout not found: {}", id))?;
            check_layout_parent(state, id, parent_of(p))
        }
        t::LAYOUT_ELEMENT_CREATE
        | t::LAYOUT_ELEMENT_UPDATE
        | t::LAYOUT_ELEMENT_MOVE
        | t::LAYOUT_ELEMENT_DELETE => check_element(state, &command.kind, p),

        t::VARIABLE_CREATE => {
            let id = text(p, "variableId");
            ensure(!state.variables.items.contains_key(id), || {
                format!("variable already exists: {}", id)
            })?;
            check_item_parent(&state.variables, "variable", id, parent_of(p))
        }
        t::VARIABLE_UPDATE | t::VARIABLE_DELETE => {
            let id = text(p, "variableId");
            let Some(variable) = state.variables.items.get(id) else {
                return Err(DomainError::Precondition(format!("variable not found: {}", id)));
            };
            let Some(patch) = p.get("patch").and_then(Value::as_object) else {
                return Ok(());
            };
            if command.kind != t::VARIABLE_UPDATE {
                return Ok(());
            }

            let current = variable
                .fields
                .get("type")
                .or_else(|| variable.fields.get("variableType"))
                .cloned()
                .unwrap_or(Value::Null);
            for key in ["type", "variableType"] {
                if let Some(next) = patch.get(key) {
                    ensure(*next == current, || {
                        format!("variable type is immutable: {} is {}, not {}", id, current, next)
                    })?;
                }
            }
            check_item_parent(&state.variables, "variable", id, parent_of(patch))
        }

        _ => Ok(()),
    }
}

fn check_resource(state: &DomainState, kind: &str, p: &Map<String, Value>) -> Result<(), DomainError> {
    let resource_type = text(p, "resourceType");
    let Some(collection) = state.resource_collection(resource_type) else {
        return Err(DomainError::Precondition(format!(
            "resource collection not found: {}",
            resource_type
        )));
    };
    let exists = |id: &str| collection.items.contains_key(id);

    match kind {
        t::RESOURCE_CREATE => {
            let id = text(p, "resourceId");
            ensure(!exists(id), || format!("resource already exists: {}/{}", resource_type, id))?;
            match parent_of(p) {
                Some(parent) => ensure(exists(parent) && parent != id, || {
                    format!("resource parent not found: {}/{}", resource_type, parent)
                }),
                None => Ok(()),
            }
        }
        t::RESOURCE_DUPLICATE => {
            let source = text(p, "sourceId");
            let new_id = text(p, "newId");
            ensure(exists(source), || {
                format!("source resource not found: {}/{}", resource_type, source)
            })?;
            ensure(!exists(new_id), || {
                format!("duplicate target id exists: {}/{}", resource_type, new_id)
            })
        }
        _ => {
            let id = text(p, "resourceId");
            ensure(exists(id), || format!("resource not found: {}/{}", resource_type, id))?;
            if kind == t::RESOURCE_MOVE {
                check_item_parent(collection, "resource", id, parent_of(p))?;
            }
            Ok(())
        }
    }
}

fn check_layout_parent(state: &DomainState, id: &str, parent: Option<&str>) -> Result<(), DomainError> {
    let Some(parent_id) = parent else {
        return Ok(());
    };
    ensure(parent_id != id, || format!("layout cannot parent itself: {}", id))?;
    let Some(parent) = state.layouts.get(parent_id) else {
        return Err(DomainError::Precondition(format!("layout parent not found: {}", parent_id)));
    };
    ensure(parent.is_folder(), || {
        format!("layout parent must be folder: {} is {}", parent_id, parent.kind)
    })?;

    // Walk up from the new parent; reaching `id` would close a loop
    let mut cursor = parent.parent_id.as_deref();
    let mut steps = 0;
    while let Some(ancestor) = cursor {
        ensure(ancestor != id, || {
            format!("layout cannot move into its own subtree: {} -> {}", id, parent_id)
        })?;
        steps += 1;
        if steps > state.layouts.len() {
            break;
        }
        cursor = state.layouts.get(ancestor).and_then(|layout| layout.parent_id.as_deref());
    }
    Ok(())
}

fn check_element(state: &DomainState, kind: &str, p: &Map<String, Value>) -> Result<(), DomainError> {
    let layout_id = text(p, "layoutId");
    let id = text(p, "elementId");
    let Some(layout) = state.layouts.get(layout_id) else {
        return Err(DomainError::Precondition(format!("layout not found: {}", layout_id)));
    };

    if kind == t::LAYOUT_ELEMENT_CREATE {
        ensure(!layout.elements.contains_key(id), || {
            format!("layout element already exists: {}/{}", layout_id, id)
        })?;
    } else {
        ensure(layout.elements.contains_key(id), || {
            format!("layout element not found: {}/{}", layout_id, id)
        })?;
    }

    if kind != t::LAYOUT_ELEMENT_CREATE && kind != t::LAYOUT_ELEMENT_MOVE {
        return Ok(());
    }
    let Some(parent) = parent_of(p) else {
        return Ok(());
    };
    ensure(layout.elements.contains_key(parent), || {
        format!("layout element parent not found: {}/{}", layout_id, parent)
    })?;
    ensure(parent != id, || format!("layout element cannot parent itself: {}", id))?;
    ensure(!layout.element_within(id, parent), || {
        format!("layout element cannot move into its own subtree: {} -> {}", id, parent)
    })
}
