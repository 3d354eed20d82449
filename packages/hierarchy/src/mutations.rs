//! # Tree Mutations
//!
//! Insert, delete, update, move and duplicate over a [`Hierarchy`].
//!
//! ## Mutation Semantics
//!
//! ### Insert
//! - Adds the item and a childless order node under `parent` at `position`
//! - Missing parent: no-op, the collection comes back unchanged
//! - Existing id: no-op (replaying an insert does not double-place a node)
//!
//! ### Delete
//! - Removes the node, its whole subtree, and every item in that subtree
//!
//! ### Update
//! - Shallow merge by default, full replace on request
//! - The `id` field is never stored
//!
//! ### Move
//! - Relocates the node with its subtree intact
//! - Missing node or parent: no-op
//! - Target inside the node's own subtree: refused (no-op with a warning)
//!
//! ### Duplicate
//! - Deep copy placed right after the source, ids drawn from a seeded
//!   generator so replay reproduces them
//! - The copy's root gets a `" (copy)"` name suffix
//!
//! Positions that reference an absent sibling fall back to an end:
//! `after` to the last slot, `before` to the first.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::collection::{Hierarchy, ItemData};
use crate::error::HierarchyError;
use crate::forest::{self, OrderNode};
use crate::ids::{IdGenerator, SeededIdGenerator};
use crate::position::{ParentRef, Position, ROOT_ID};

/// Suffix appended to the name of a duplicated subtree's root
pub const COPY_SUFFIX: &str = " (copy)";

/// A single tree edit, as carried on journaled events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TreeMutation {
    Insert {
        id: String,
        #[serde(default)]
        data: ItemData,
        #[serde(default)]
        parent: ParentRef,
        #[serde(default)]
        position: Position,
    },

    Delete {
        id: String,
    },

    Update {
        id: String,
        #[serde(default)]
        data: ItemData,
        #[serde(default)]
        replace: bool,
    },

    Move {
        id: String,
        #[serde(default)]
        parent: ParentRef,
        #[serde(default)]
        position: Position,
    },

    Duplicate {
        id: String,
        #[serde(default)]
        seed: Option<String>,
    },
}

/// Result of applying a [`TreeMutation`]
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    pub collection: Hierarchy,

    /// Old id to new id, filled only by duplicates
    pub id_map: IndexMap<String, String>,
}

/// A duplicated collection and the ids minted for the copy
#[derive(Debug, Clone, PartialEq)]
pub struct Duplicated {
    pub collection: Hierarchy,
    pub id_map: IndexMap<String, String>,
}

impl TreeMutation {
    /// Id of the node this mutation addresses
    pub fn id(&self) -> &str {
        match self {
            TreeMutation::Insert { id, .. }
            | TreeMutation::Delete { id }
            | TreeMutation::Update { id, .. }
            | TreeMutation::Move { id, .. }
            | TreeMutation::Duplicate { id, .. } => id,
        }
    }

    pub fn apply(&self, collection: &Hierarchy) -> Result<MutationResult, HierarchyError> {
        let (collection, id_map) = match self {
            TreeMutation::Insert {
                id,
                data,
                parent,
                position,
            } => (collection.insert(id, data.clone(), parent, position)?, IndexMap::new()),

            TreeMutation::Delete { id } => (collection.delete(id), IndexMap::new()),

            TreeMutation::Update { id, data, replace } => {
                (collection.update(id, data.clone(), *replace), IndexMap::new())
            }

            TreeMutation::Move {
                id,
                parent,
                position,
            } => (collection.move_node(id, parent, position), IndexMap::new()),

            TreeMutation::Duplicate { id, seed } => {
                let seed = seed.as_deref().ok_or(HierarchyError::MissingSeed)?;
                let duplicated = collection.duplicate(id, seed)?;
                (duplicated.collection, duplicated.id_map)
            }
        };

        Ok(MutationResult { collection, id_map })
    }
}

fn strip_id(mut data: ItemData) -> ItemData {
    data.remove("id");
    data
}

impl Hierarchy {
    /// Add `data` as item `id` under `parent` at `position`
    pub fn insert(
        &self,
        id: &str,
        data: ItemData,
        parent: &ParentRef,
        position: &Position,
    ) -> Result<Self, HierarchyError> {
        if id.is_empty() {
            return Err(HierarchyError::Malformed("item id is empty".into()));
        }
        if id == ROOT_ID {
            return Err(HierarchyError::ReservedId(id.to_string()));
        }
        if self.contains(id) || self.is_placed(id) {
            debug!(id, "insert skipped, id already present");
            return Ok(self.clone());
        }

        let mut next = self.clone();
        let (items, order) = next.parts_mut();
        let Some(siblings) = forest::children_mut(order, parent) else {
            debug!(id, parent = %parent, "insert skipped, parent not found");
            return Ok(self.clone());
        };

        let index = position.index_in(siblings);
        siblings.insert(index, OrderNode::leaf(id));
        items.insert(id.to_string(), strip_id(data));
        Ok(next)
    }

    /// Remove `id`, its subtree, and all of their items
    pub fn delete(&self, id: &str) -> Self {
        let mut next = self.clone();
        let (items, order) = next.parts_mut();

        let mut removed: Vec<String> = Vec::new();
        while let Some(node) = forest::detach(order, id) {
            removed.extend(node.subtree_ids());
        }
        if removed.is_empty() {
            removed.push(id.to_string());
        }

        let removed: HashSet<String> = removed.into_iter().collect();
        forest::retain(order, &|candidate| !removed.contains(candidate));

        let before = items.len();
        items.retain(|item_id, _| !removed.contains(item_id));
        if before == items.len() && !forest::contains(self.order(), id) {
            debug!(id, "delete skipped, id not found");
            return self.clone();
        }
        next
    }

    /// Merge `data` into item `id`, or replace it wholesale
    pub fn update(&self, id: &str, data: ItemData, replace: bool) -> Self {
        if !self.contains(id) {
            debug!(id, "update skipped, id not found");
            return self.clone();
        }

        let mut next = self.clone();
        let (items, _) = next.parts_mut();
        if let Some(entry) = items.get_mut(id) {
            if replace {
                *entry = strip_id(data);
            } else {
                for (key, value) in data {
                    entry.insert(key, value);
                }
                entry.remove("id");
            }
        }
        next
    }

    /// Relocate `id` (with its subtree) under `parent` at `position`
    pub fn move_node(&self, id: &str, parent: &ParentRef, position: &Position) -> Self {
        if !self.is_placed(id) {
            debug!(id, "move skipped, id not found");
            return self.clone();
        }
        if let ParentRef::Node(parent_id) = parent {
            if forest::is_within(self.order(), id, parent_id) {
                warn!(id, parent = %parent_id, "move refused, target is inside the moved subtree");
                return self.clone();
            }
            if !self.is_placed(parent_id) {
                debug!(id, parent = %parent_id, "move skipped, parent not found");
                return self.clone();
            }
        }

        let mut next = self.clone();
        let (_, order) = next.parts_mut();
        let Some(node) = forest::detach(order, id) else {
            return self.clone();
        };
        let Some(siblings) = forest::children_mut(order, parent) else {
            return self.clone();
        };
        let index = position.index_in(siblings);
        siblings.insert(index, node);
        next
    }

    /// Deep-copy the subtree at `id`, minting ids from `seed`
    pub fn duplicate(&self, id: &str, seed: &str) -> Result<Duplicated, HierarchyError> {
        if seed.is_empty() {
            return Err(HierarchyError::MissingSeed);
        }
        Ok(self.duplicate_with(id, &mut SeededIdGenerator::new(seed)))
    }

    /// Deep-copy the subtree at `id` with ids from any generator
    pub fn duplicate_with(&self, id: &str, ids: &mut dyn IdGenerator) -> Duplicated {
        let Some(source) = forest::find(self.order(), id) else {
            debug!(id, "duplicate skipped, id not found");
            return Duplicated {
                collection: self.clone(),
                id_map: IndexMap::new(),
            };
        };

        let mut taken: HashSet<String> = self.items().keys().cloned().collect();
        taken.extend(self.ids());
        let mut id_map = IndexMap::new();
        let copy = copy_subtree(source, ids, &mut taken, &mut id_map);

        let mut next = self.clone();
        let (items, order) = next.parts_mut();
        for (old, new) in &id_map {
            let mut data = self.get(old).cloned().unwrap_or_default();
            if old == id {
                if let Some(Value::String(name)) = data.get_mut("name") {
                    name.push_str(COPY_SUFFIX);
                }
            }
            items.insert(new.clone(), data);
        }

        let parent = forest::parent_of(self.order(), id).unwrap_or_default();
        if let Some(siblings) = forest::children_mut(order, &parent) {
            let index = Position::After(id.to_string()).index_in(siblings);
            siblings.insert(index, copy);
        }

        Duplicated {
            collection: next,
            id_map,
        }
    }
}

fn copy_subtree(
    node: &OrderNode,
    ids: &mut dyn IdGenerator,
    taken: &mut HashSet<String>,
    id_map: &mut IndexMap<String, String>,
) -> OrderNode {
    let new_id = fresh_id(ids, taken);
    id_map.insert(node.id.clone(), new_id.clone());

    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        if id_map.contains_key(&child.id) {
            continue;
        }
        children.push(copy_subtree(child, ids, taken, id_map));
    }
    OrderNode::with_children(new_id, children)
}

fn fresh_id(ids: &mut dyn IdGenerator, taken: &mut HashSet<String>) -> String {
    let mut attempt = 0usize;
    loop {
        let mut candidate = ids.next_id();
        if attempt > 16 {
            candidate = format!("{}-{}", candidate, attempt);
        }
        attempt += 1;
        if candidate.is_empty() || candidate == ROOT_ID {
            continue;
        }
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequenceIdGenerator;
    use serde_json::json;

    fn collection(value: Value) -> Hierarchy {
        Hierarchy::from_value(&value).unwrap()
    }

    fn data(value: Value) -> ItemData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_strips_id() {
        let c = Hierarchy::new()
            .insert("a", data(json!({"id": "a", "name": "A"})), &ParentRef::Root, &Position::Last)
            .unwrap();
        assert_eq!(c.get("a"), Some(&data(json!({"name": "A"}))));
        assert!(c.is_valid());
    }

    #[test]
    fn test_insert_missing_parent_is_noop() {
        let c = collection(json!({"items": {"a": {}}, "order": [{"id": "a"}]}));
        let next = c
            .insert("b", ItemData::new(), &ParentRef::from("ghost"), &Position::Last)
            .unwrap();
        assert_eq!(next, c);
    }

    #[test]
    fn test_insert_reserved_id_fails() {
        let err = Hierarchy::new()
            .insert(ROOT_ID, ItemData::new(), &ParentRef::Root, &Position::First)
            .unwrap_err();
        assert_eq!(err, HierarchyError::ReservedId(ROOT_ID.into()));
    }

    #[test]
    fn test_insert_existing_id_is_noop() {
        let c = collection(json!({"items": {"a": {"name": "A"}}, "order": [{"id": "a"}]}));
        let next = c
            .insert("a", data(json!({"name": "B"})), &ParentRef::Root, &Position::Last)
            .unwrap();
        assert_eq!(next, c);
    }

    #[test]
    fn test_update_merge_and_replace() {
        let c = collection(json!({"items": {"a": {"name": "A", "x": 1}}, "order": [{"id": "a"}]}));
        let merged = c.update("a", data(json!({"x": 2, "id": "a"})), false);
        assert_eq!(merged.get("a"), Some(&data(json!({"name": "A", "x": 2}))));
        let replaced = c.update("a", data(json!({"y": 3})), true);
        assert_eq!(replaced.get("a"), Some(&data(json!({"y": 3}))));
    }

    #[test]
    fn test_update_missing_is_noop() {
        let c = collection(json!({"items": {}, "order": []}));
        assert_eq!(c.update("a", data(json!({"x": 1})), false), c);
    }

    #[test]
    fn test_move_into_descendant_refused() {
        let c = collection(json!({
            "items": {"a": {}, "b": {}},
            "order": [{"id": "a", "children": [{"id": "b"}]}]
        }));
        assert_eq!(c.move_node("a", &ParentRef::from("b"), &Position::First), c);
        assert_eq!(c.move_node("a", &ParentRef::from("a"), &Position::First), c);
    }

    #[test]
    fn test_move_missing_parent_keeps_node() {
        let c = collection(json!({"items": {"a": {}}, "order": [{"id": "a"}]}));
        let next = c.move_node("a", &ParentRef::from("ghost"), &Position::First);
        assert_eq!(next, c);
    }

    #[test]
    fn test_duplicate_requires_seed() {
        let c = collection(json!({"items": {"a": {}}, "order": [{"id": "a"}]}));
        let mutation = TreeMutation::Duplicate {
            id: "a".into(),
            seed: None,
        };
        assert_eq!(mutation.apply(&c).unwrap_err(), HierarchyError::MissingSeed);
        assert_eq!(c.duplicate("a", "").unwrap_err(), HierarchyError::MissingSeed);
    }

    #[test]
    fn test_duplicate_with_sequence_ids() {
        let c = collection(json!({
            "items": {"a": {"name": "A"}, "b": {"name": "B"}, "z": {}},
            "order": [{"id": "a", "children": [{"id": "b"}]}, {"id": "z"}]
        }));
        let mut ids = SequenceIdGenerator::new(["b", "a2", "b2"]);
        let out = c.duplicate_with("a", &mut ids);

        // "b" is taken, so the generator is asked again
        assert_eq!(out.id_map.get("a").map(String::as_str), Some("a2"));
        assert_eq!(out.id_map.get("b").map(String::as_str), Some("b2"));
        assert_eq!(out.collection.ids(), vec!["a", "b", "a2", "b2", "z"]);
        assert_eq!(out.collection.get("a2").unwrap()["name"], json!("A (copy)"));
        assert_eq!(out.collection.get("b2").unwrap()["name"], json!("B"));
        assert!(out.collection.is_valid());
    }

    #[test]
    fn test_mutation_serde_shape() {
        let mutation: TreeMutation = serde_json::from_value(json!({
            "kind": "move",
            "id": "b",
            "parent": "_root",
            "position": {"after": "a"}
        }))
        .unwrap();
        assert_eq!(
            mutation,
            TreeMutation::Move {
                id: "b".into(),
                parent: ParentRef::Root,
                position: Position::After("a".into()),
            }
        );
    }
}
