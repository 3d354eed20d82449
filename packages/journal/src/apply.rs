//! Folding a single action into a JSON state.

use serde_json::{Map, Value};
use tessera_hierarchy::Hierarchy;
use tracing::debug;

use crate::action::Action;
use crate::error::JournalError;
use crate::path::StatePath;

/// Apply `action` to `state`, returning the next state.
///
/// The input is never modified. Tree actions whose target collection does
/// not exist leave the state unchanged.
pub fn apply_action(state: &Value, action: &Action) -> Result<Value, JournalError> {
    match action {
        Action::Init { value } => Ok(value.clone()),

        Action::Set {
            target,
            value,
            options,
        } => set_value(state, target, value, options.replace),

        Action::Unset { target } => Ok(unset_value(state, target)),

        Action::Insert(payload)
        | Action::Delete(payload)
        | Action::Update(payload)
        | Action::Move(payload)
        | Action::Duplicate(payload) => {
            let Some(mutation) = action.tree_mutation()? else {
                return Ok(state.clone());
            };
            let target = &payload.target;

            let collection = match target.get_opt(state) {
                None | Some(Value::Null) => {
                    debug!(target = %target, kind = action.kind(), "tree action skipped, no collection at target");
                    return Ok(state.clone());
                }
                Some(value) => Hierarchy::from_value(value)?,
            };

            let result = mutation.apply(&collection)?;
            if result.collection == collection && result.id_map.is_empty() {
                return Ok(state.clone());
            }

            let mut next = state.clone();
            write_collection(&mut next, target, &result.collection)?;
            Ok(next)
        }
    }
}

fn set_value(
    state: &Value,
    target: &StatePath,
    value: &Value,
    replace: bool,
) -> Result<Value, JournalError> {
    if !replace && value.is_array() {
        return Err(JournalError::InvalidSetValue(target.to_string()));
    }
    if !state.is_object() {
        return Err(JournalError::StateNotAnObject);
    }

    let mut next = state.clone();
    let (key, _) = target.split_last();
    let parent = target.parent_object_mut(&mut next)?;

    let merge = !replace && value.is_object() && parent.get(key).map_or(false, Value::is_object);
    match (parent.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) if merge => {
            for (field, field_value) in incoming {
                existing.insert(field.clone(), field_value.clone());
            }
            return Ok(next);
        }
        _ => {}
    }
    parent.insert(key.to_string(), value.clone());
    Ok(next)
}

fn unset_value(state: &Value, target: &StatePath) -> Value {
    let mut next = state.clone();
    let (key, parents) = target.split_last();

    let mut current = &mut next;
    for segment in parents {
        match current.get_mut(segment.as_str()) {
            Some(child) if child.is_object() => current = child,
            _ => return state.clone(),
        }
    }
    match current.as_object_mut() {
        Some(object) if object.contains_key(key) => {
            object.remove(key);
            next
        }
        _ => state.clone(),
    }
}

/// Store a collection back at `target`, keeping any other fields the
/// collection object carries
fn write_collection(
    state: &mut Value,
    target: &StatePath,
    collection: &Hierarchy,
) -> Result<(), JournalError> {
    let slot = target.get_mut(state)?;
    let Value::Object(written) = collection.to_value() else {
        return Ok(());
    };
    match slot {
        Value::Object(existing) => {
            existing.remove("tree");
            for (key, value) in written {
                existing.insert(key, value);
            }
        }
        other => {
            let mut object = Map::new();
            object.extend(written);
            *other = Value::Object(object);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_hierarchy::{ParentRef, Position};

    fn path(p: &str) -> StatePath {
        StatePath::parse(p).unwrap()
    }

    #[test]
    fn test_set_merges_objects() {
        let state = json!({"user": {"profile": {"name": "John", "age": 25}}});
        let next = apply_action(&state, &Action::set(path("user.profile"), json!({"height": 180}), false)).unwrap();
        assert_eq!(next, json!({"user": {"profile": {"name": "John", "age": 25, "height": 180}}}));
        assert_eq!(state["user"]["profile"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_set_replace_and_scalars() {
        let state = json!({"a": {"b": {"x": 1}}});
        let next = apply_action(&state, &Action::set(path("a.b"), json!({"y": 2}), true)).unwrap();
        assert_eq!(next, json!({"a": {"b": {"y": 2}}}));
        let next = apply_action(&state, &Action::set(path("a.b"), json!(7), false)).unwrap();
        assert_eq!(next, json!({"a": {"b": 7}}));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let next = apply_action(&json!({}), &Action::set(path("a.b.c"), json!(1), false)).unwrap();
        assert_eq!(next, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_set_array_without_replace_fails() {
        let err = apply_action(&json!({}), &Action::set(path("list"), json!([1]), false)).unwrap_err();
        assert_eq!(err, JournalError::InvalidSetValue("list".into()));
        let ok = apply_action(&json!({}), &Action::set(path("list"), json!([1]), true)).unwrap();
        assert_eq!(ok, json!({"list": [1]}));
    }

    #[test]
    fn test_unset_missing_path_is_unchanged() {
        let state = json!({"a": {"b": 1}});
        assert_eq!(apply_action(&state, &Action::unset(path("x.y"))).unwrap(), state);
        assert_eq!(
            apply_action(&state, &Action::unset(path("a.b"))).unwrap(),
            json!({"a": {}})
        );
    }

    #[test]
    fn test_tree_action_on_missing_collection_is_noop() {
        let state = json!({"resources": {}});
        let action = Action::insert(
            path("resources.images"),
            "x",
            Default::default(),
            ParentRef::Root,
            Position::First,
        );
        assert_eq!(apply_action(&state, &action).unwrap(), state);
    }

    #[test]
    fn test_tree_action_on_malformed_collection_fails() {
        let state = json!({"images": 3});
        let action = Action::delete(path("images"), "x");
        assert!(matches!(apply_action(&state, &action), Err(JournalError::Hierarchy(_))));
    }

    #[test]
    fn test_tree_insert_writes_order_and_drops_tree_alias() {
        let state = json!({"images": {"items": {}, "tree": [], "label": "Images"}});
        let action = Action::insert(
            path("images"),
            "x",
            json!({"name": "X"}).as_object().cloned().unwrap(),
            ParentRef::Root,
            Position::Last,
        );
        let next = apply_action(&state, &action).unwrap();
        assert_eq!(
            next,
            json!({"images": {
                "items": {"x": {"name": "X"}},
                "order": [{"id": "x", "children": []}],
                "label": "Images"
            }})
        );
    }

    #[test]
    fn test_init_replaces_state() {
        let next = apply_action(&json!({"old": true}), &Action::init(json!({"new": 1}))).unwrap();
        assert_eq!(next, json!({"new": 1}));
    }
}
