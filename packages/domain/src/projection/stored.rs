//! Lenient readers over the stored JSON.
//!
//! Storage written by older clients can be missing collections, carry
//! `tree` instead of `order`, or hold entries that are not objects. These
//! readers never fail; whatever cannot be read is treated as absent.

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tessera_hierarchy::forest;
use tessera_hierarchy::{Forest, OrderNode};
use tracing::debug;

use crate::model::{Id, Timestamp};

/// Items and order of one stored collection
pub(crate) struct StoredCollection<'a> {
    pub items: Vec<(&'a str, &'a Map<String, Value>)>,
    pub order: Forest,
}

impl<'a> StoredCollection<'a> {
    pub fn read(value: Option<&'a Value>) -> Self {
        let Some(object) = value.and_then(Value::as_object) else {
            return Self {
                items: Vec::new(),
                order: Forest::new(),
            };
        };

        let mut items = Vec::new();
        if let Some(map) = object.get("items").and_then(Value::as_object) {
            for (id, data) in map {
                match data.as_object() {
                    Some(data) => items.push((id.as_str(), data)),
                    None => debug!(id = %id, "skipping stored entry that is not an object"),
                }
            }
        }

        Self {
            items,
            order: read_forest(order_value(object)),
        }
    }

    pub fn ids(&self) -> Vec<Id> {
        self.items.iter().map(|(id, _)| id.to_string()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&'a Map<String, Value>> {
        self.items
            .iter()
            .find(|(item_id, _)| *item_id == id)
            .map(|(_, data)| *data)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Pre-order ids of the order forest with each id's tree parent
    pub fn tree_links(&self) -> TreeLinks {
        TreeLinks::of(&self.order)
    }
}

/// The order field of a stored collection (`order`, or legacy `tree`)
pub(crate) fn order_value(object: &Map<String, Value>) -> Option<&Value> {
    object.get("order").or_else(|| object.get("tree"))
}

/// Forest out of a JSON array, dropping nodes without a usable id
pub(crate) fn read_forest(value: Option<&Value>) -> Forest {
    let Some(nodes) = value.and_then(Value::as_array) else {
        return Forest::new();
    };
    nodes
        .iter()
        .filter_map(|node| {
            let object = node.as_object()?;
            let id = object.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
            Some(OrderNode::with_children(id, read_forest(object.get("children"))))
        })
        .collect()
}

pub(crate) struct TreeLinks {
    pub ordered: Vec<Id>,
    pub parents: HashMap<Id, Option<Id>>,
}

impl TreeLinks {
    pub fn of(order: &[OrderNode]) -> Self {
        let mut ordered = Vec::new();
        let mut parents = HashMap::new();
        forest::walk(order, &mut |node, parent, _| {
            ordered.push(node.id.clone());
            parents.insert(node.id.clone(), parent.map(str::to_string));
        });
        Self { ordered, parents }
    }

    pub fn is_placed(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Tree parent of a placed id
    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).and_then(Option::as_deref)
    }
}

/// `ordered` restricted to `all`, then every id of `all` not yet listed
pub(crate) fn append_missing_ids(ordered: &[Id], all: &[Id]) -> Vec<Id> {
    let known: HashSet<&str> = all.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(all.len());
    for id in ordered.iter().chain(all.iter()) {
        if known.contains(id.as_str()) && seen.insert(id.as_str()) {
            out.push(id.clone());
        }
    }
    out
}

/// Whole-millisecond timestamp, if the value is one
pub(crate) fn timestamp(value: Option<&Value>) -> Option<Timestamp> {
    let value = value?;
    if let Some(ms) = value.as_i64() {
        return Some(ms);
    }
    value
        .as_f64()
        .filter(|ms| ms.is_finite() && ms.fract() == 0.0)
        .map(|ms| ms as Timestamp)
}

pub(crate) fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Copy of `object` without `reserved` keys
pub(crate) fn without(object: &Map<String, Value>, reserved: &[&str]) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| !reserved.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_accepts_tree_alias_and_skips_junk() {
        let value = json!({
            "items": {"a": {"name": "A"}, "b": 3},
            "tree": [{"id": "a"}, {"name": "no id"}, {"id": "", "children": []}]
        });
        let collection = StoredCollection::read(Some(&value));
        assert_eq!(collection.ids(), vec!["a"]);
        assert_eq!(collection.order, vec![OrderNode::leaf("a")]);
    }

    #[test]
    fn test_missing_collection_reads_empty() {
        let collection = StoredCollection::read(None);
        assert!(collection.items.is_empty());
        assert!(collection.order.is_empty());
    }

    #[test]
    fn test_append_missing_ids() {
        let ordered = vec!["b".to_string(), "x".into(), "b".into()];
        let all = vec!["a".to_string(), "b".into()];
        assert_eq!(append_missing_ids(&ordered, &all), vec!["b", "a"]);
    }

    #[test]
    fn test_timestamp_accepts_whole_numbers_only() {
        assert_eq!(timestamp(Some(&json!(12))), Some(12));
        assert_eq!(timestamp(Some(&json!(12.0))), Some(12));
        assert_eq!(timestamp(Some(&json!(12.5))), None);
        assert_eq!(timestamp(Some(&json!("12"))), None);
        assert_eq!(timestamp(None), None);
    }
}
