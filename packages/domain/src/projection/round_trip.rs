//! Round-trip verification.
//!
//! `to_storage(to_domain(S), S)` must cover `S`: every stored key keeps its
//! value, every collection keeps the relative placement of its stored ids.
//! The projection may add keys (defaults, timestamps) but never lose or
//! change one.
//!
//! Derived fields the projection repairs are left out of the comparison:
//! an `initialSceneId`, `initialSectionId` or `initialLineId` naming no
//! projected child, and a `parentId` the order tree contradicts.

use serde_json::{Map, Value};
use std::collections::HashSet;
use tessera_hierarchy::forest;
use tracing::warn;

use super::stored::{order_value, read_forest, TreeLinks};
use super::{to_domain, to_storage, ProjectionContext};
use crate::error::DomainError;

/// Project `storage` to the domain and back, and report the first path
/// whose stored value did not survive
pub fn check_round_trip(storage: &Value, ctx: &ProjectionContext) -> Result<(), DomainError> {
    let domain = to_domain(storage, ctx);
    let written = to_storage(&domain, storage)?;
    let expected = without_repaired(storage);
    match first_drift(&expected, Some(&written), "") {
        None => Ok(()),
        Some(path) => {
            warn!(path = %path, "projection round trip drifted");
            Err(DomainError::ProjectionDrift(path))
        }
    }
}

/// `storage` minus the derived fields `to_domain` repairs
fn without_repaired(storage: &Value) -> Value {
    let mut expected = storage.clone();
    if let Some(root) = expected.as_object_mut() {
        let scene_ids = projected_ids(root.get("scenes"), |scene| {
            scene.get("type").and_then(Value::as_str) == Some("scene")
        });
        if let Some(story) = root.get_mut("story").and_then(Value::as_object_mut) {
            drop_stale(story, "initialSceneId", &scene_ids);
        }

        let scenes = root
            .get_mut("scenes")
            .and_then(|scenes| scenes.get_mut("items"))
            .and_then(Value::as_object_mut);
        for scene in scenes.into_iter().flat_map(|items| items.values_mut()) {
            let Some(scene) = scene.as_object_mut() else {
                continue;
            };
            let section_ids = projected_ids(scene.get("sections"), |section| !is_folder(section));
            drop_stale(scene, "initialSectionId", &section_ids);

            let sections = scene
                .get_mut("sections")
                .and_then(|sections| sections.get_mut("items"))
                .and_then(Value::as_object_mut);
            for section in sections.into_iter().flat_map(|items| items.values_mut()) {
                if let Some(section) = section.as_object_mut() {
                    let line_ids = projected_ids(section.get("lines"), |_| true);
                    drop_stale(section, "initialLineId", &line_ids);
                }
            }
        }
    }
    drop_contradicted_parents(&mut expected);
    expected
}

fn is_folder(object: &Map<String, Value>) -> bool {
    object.get("type").and_then(Value::as_str) == Some("folder")
}

/// Ids of the object entries of a stored collection that pass `keep`
fn projected_ids(collection: Option<&Value>, keep: impl Fn(&Map<String, Value>) -> bool) -> HashSet<String> {
    collection
        .and_then(|collection| collection.get("items"))
        .and_then(Value::as_object)
        .map(|items| {
            items
                .iter()
                .filter(|(_, item)| item.as_object().map_or(false, &keep))
                .map(|(id, _)| id.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Remove `key` unless it names one of `valid`
fn drop_stale(object: &mut Map<String, Value>, key: &str, valid: &HashSet<String>) {
    let stale = match object.get(key) {
        None => false,
        Some(Value::String(id)) => !valid.contains(id),
        Some(_) => true,
    };
    if stale {
        object.remove(key);
    }
}

/// Remove every stored `parentId` that disagrees with its item's place in
/// the order tree, in every collection at any depth
fn drop_contradicted_parents(value: &mut Value) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    if is_collection(object) {
        let links = TreeLinks::of(&read_forest(order_value(object)));
        if let Some(items) = object.get_mut("items").and_then(Value::as_object_mut) {
            for (id, item) in items.iter_mut() {
                let Some(item) = item.as_object_mut() else {
                    continue;
                };
                let stored = item.get("parentId").and_then(Value::as_str);
                if item.contains_key("parentId") && links.is_placed(id) && stored != links.parent(id) {
                    item.remove("parentId");
                }
            }
        }
    }
    for child in object.values_mut() {
        drop_contradicted_parents(child);
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn is_collection(object: &Map<String, Value>) -> bool {
    object.contains_key("items") && order_value(object).is_some()
}

fn first_drift(expected: &Value, actual: Option<&Value>, path: &str) -> Option<String> {
    let Some(actual) = actual else {
        return (!expected.is_null()).then(|| path.to_string());
    };

    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) if is_collection(expected) => {
            collection_drift(expected, actual, path)
        }
        (Value::Object(expected), Value::Object(actual)) => expected
            .iter()
            .find_map(|(key, value)| first_drift(value, actual.get(key), &join(path, key))),
        (Value::Array(expected), Value::Array(actual)) => {
            if expected.len() != actual.len() {
                return Some(path.to_string());
            }
            expected
                .iter()
                .zip(actual)
                .enumerate()
                .find_map(|(index, (e, a))| first_drift(e, Some(a), &join(path, &index.to_string())))
        }
        (Value::Number(e), Value::Number(a)) => (e.as_f64() != a.as_f64()).then(|| path.to_string()),
        (e, a) => (e != a).then(|| path.to_string()),
    }
}

fn collection_drift(expected: &Map<String, Value>, actual: &Map<String, Value>, path: &str) -> Option<String> {
    let empty = Map::new();
    let expected_items = expected.get("items").and_then(Value::as_object).unwrap_or(&empty);
    let actual_items = actual.get("items").and_then(Value::as_object).unwrap_or(&empty);
    let items_path = join(path, "items");

    for (id, item) in expected_items {
        let item_path = join(&items_path, id);
        let Some(actual_item) = actual_items.get(id) else {
            return Some(item_path);
        };
        let drift = match (item, actual_item) {
            // An item never stores its own id; dropping one is not drift
            (Value::Object(e), Value::Object(a)) => e
                .iter()
                .filter(|(key, _)| key.as_str() != "id")
                .find_map(|(key, value)| first_drift(value, a.get(key), &join(&item_path, key))),
            (e, a) => first_drift(e, Some(a), &item_path),
        };
        if drift.is_some() {
            return drift;
        }
    }

    let expected_order = read_forest(order_value(expected));
    let placed: HashSet<String> = forest::preorder_ids(&expected_order).into_iter().collect();
    let mut actual_order = read_forest(order_value(actual));
    forest::retain(&mut actual_order, &|id| placed.contains(id));
    if actual_order != expected_order {
        return Some(join(path, "order"));
    }

    expected
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "items" | "order" | "tree"))
        .find_map(|(key, value)| first_drift(value, actual.get(key), &join(path, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_added_keys_are_not_drift() {
        let expected = json!({"a": 1, "b": {"c": 2.0}});
        let actual = json!({"a": 1.0, "b": {"c": 2, "d": 3}, "e": 4});
        assert_eq!(first_drift(&expected, Some(&actual), ""), None);
    }

    #[test]
    fn test_changed_value_reports_path() {
        let expected = json!({"a": {"b": [1, 2]}});
        let actual = json!({"a": {"b": [1, 3]}});
        assert_eq!(first_drift(&expected, Some(&actual), ""), Some("a.b.1".into()));
    }

    #[test]
    fn test_collection_order_compares_placed_ids_only() {
        let expected = json!({"items": {"a": {}, "b": {}}, "tree": [{"id": "a", "children": [{"id": "b"}]}]});
        let actual = json!({
            "items": {"a": {}, "b": {}, "n": {}},
            "order": [{"id": "n"}, {"id": "a", "children": [{"id": "b"}]}]
        });
        assert_eq!(first_drift(&expected, Some(&actual), "scenes"), None);

        let moved = json!({"items": {"a": {}, "b": {}}, "order": [{"id": "b"}, {"id": "a"}]});
        assert_eq!(
            first_drift(&expected, Some(&moved), "scenes"),
            Some("scenes.order".into())
        );
    }

    #[test]
    fn test_check_round_trip_on_typical_document() {
        let storage = json!({
            "model_version": 2,
            "project": {"id": "p1", "name": "Demo", "description": "", "theme": "dark"},
            "story": {"initialSceneId": "s1"},
            "scenes": {
                "items": {
                    "dir": {"type": "folder", "name": "Act 1"},
                    "s1": {
                        "type": "scene",
                        "name": "Intro",
                        "position": {"x": 10, "y": 20},
                        "sections": {
                            "items": {"x1": {"name": "Main", "lines": {
                                "items": {"l1": {"actions": {"dialogue": {"text": "hi"}}}},
                                "order": [{"id": "l1"}]
                            }}},
                            "order": [{"id": "x1"}]
                        }
                    }
                },
                "order": [{"id": "dir", "children": [{"id": "s1"}]}]
            },
            "images": {
                "items": {"f": {"type": "folder", "name": "Art"}, "i": {"name": "Logo", "fileId": "x"}},
                "tree": [{"id": "f", "children": [{"id": "i"}]}]
            },
            "layouts": {
                "items": {"L": {"type": "layout", "name": "Main", "layoutType": "normal", "elements": {
                    "items": {"e1": {"type": "text", "x": 1}},
                    "order": [{"id": "e1"}]
                }}},
                "order": [{"id": "L"}]
            },
            "variables": {
                "items": {"v": {"itemType": "variable", "name": "hp", "type": "number",
                                "variableType": "number", "default": 10, "value": 10}},
                "order": [{"id": "v"}]
            }
        });
        let ctx = ProjectionContext::new("p1", 100);
        assert_eq!(check_round_trip(&storage, &ctx), Ok(()));
    }

    #[test]
    fn test_repaired_initial_ids_are_not_drift() {
        let mut storage = crate::projection::initial_storage_state("p1");
        storage["story"]["initialSceneId"] = json!(null);
        storage["scenes"] = json!({
            "items": {"s1": {"type": "scene", "name": "S", "initialSectionId": "gone", "sections": {
                "items": {"x1": {"name": "X", "initialLineId": null, "lines": {
                    "items": {"l1": {}},
                    "order": [{"id": "l1"}]
                }}},
                "order": [{"id": "x1"}]
            }}},
            "order": [{"id": "s1"}]
        });
        let ctx = ProjectionContext::new("p1", 1);
        assert_eq!(check_round_trip(&storage, &ctx), Ok(()));

        let written = to_storage(&to_domain(&storage, &ctx), &storage).unwrap();
        assert_eq!(written["story"]["initialSceneId"], json!("s1"));
        assert_eq!(written["scenes"]["items"]["s1"]["initialSectionId"], json!("x1"));
    }

    #[test]
    fn test_parent_id_contradicting_tree_is_not_drift() {
        let mut storage = crate::projection::initial_storage_state("p1");
        storage["images"] = json!({
            "items": {"f": {"type": "folder", "name": "Art"}, "a": {"name": "A", "parentId": "zzz"}},
            "order": [{"id": "f", "children": [{"id": "a"}]}]
        });
        assert_eq!(check_round_trip(&storage, &ProjectionContext::new("p1", 1)), Ok(()));
    }

    #[test]
    fn test_valid_derived_fields_are_still_compared() {
        let storage = json!({
            "story": {"initialSceneId": "s2"},
            "scenes": {
                "items": {"s1": {"type": "scene"}, "s2": {"type": "scene"}},
                "order": [{"id": "s1"}, {"id": "s2"}]
            },
            "images": {
                "items": {"f": {"type": "folder"}, "a": {"parentId": "f"}, "loose": {"parentId": "f"}},
                "order": [{"id": "f", "children": [{"id": "a"}]}]
            }
        });
        let expected = without_repaired(&storage);
        assert_eq!(expected["story"]["initialSceneId"], json!("s2"));
        assert_eq!(expected["images"]["items"]["a"]["parentId"], json!("f"));
        assert_eq!(expected["images"]["items"]["loose"]["parentId"], json!("f"));

        let written = json!({"story": {"initialSceneId": "s1"}});
        assert_eq!(
            first_drift(&expected["story"], Some(&written["story"]), "story"),
            Some("story.initialSceneId".into())
        );
    }

    #[test]
    fn test_variable_value_survives_round_trip() {
        let mut storage = crate::projection::initial_storage_state("p1");
        storage["variables"] = json!({
            "items": {"v": {"type": "number", "default": 0, "value": 5}},
            "order": [{"id": "v"}]
        });
        let ctx = ProjectionContext::new("p1", 1);
        assert_eq!(check_round_trip(&storage, &ctx), Ok(()));
        let written = to_storage(&to_domain(&storage, &ctx), &storage).unwrap();
        assert_eq!(written["variables"]["items"]["v"]["value"], json!(5));
        assert_eq!(written["variables"]["items"]["v"]["default"], json!(0));
    }

    #[test]
    fn test_stored_project_id_is_kept() {
        let storage = crate::projection::initial_storage_state("other");
        let ctx = ProjectionContext::new("p1", 1);
        assert_eq!(to_domain(&storage, &ctx).project.id, "other");
        assert_eq!(check_round_trip(&storage, &ctx), Ok(()));
    }
}
