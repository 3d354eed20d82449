//! # Hierarchy Collection
//!
//! An items map keyed by id plus the order forest that places those ids.
//!
//! ```text
//! items: { a: {name: "A"}, b: {name: "B"} }
//! order: [ {id: a, children: [ {id: b, children: []} ]} ]
//! ```
//!
//! Collections are values. Every mutation in [`crate::mutations`] returns
//! a new collection and leaves its input untouched, which is what lets the
//! journal fold them without copying on the caller's side.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::HierarchyError;
use crate::forest::{self, Forest, OrderNode};
use crate::position::ROOT_ID;

/// Data stored for one item (never includes the item's own id)
pub type ItemData = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hierarchy {
    #[serde(default)]
    items: IndexMap<String, ItemData>,

    #[serde(default, alias = "tree")]
    order: Forest,
}

/// A structural problem found by [`Hierarchy::validate`]
pub type Violation = HierarchyError;

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection and reject it if it breaks any structural rule
    pub fn from_parts(
        items: IndexMap<String, ItemData>,
        order: Forest,
    ) -> Result<Self, HierarchyError> {
        let collection = Self { items, order };
        match collection.validate().into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(collection),
        }
    }

    /// Read a collection out of a JSON value.
    ///
    /// Missing `items`/`order` fields read as empty. Anything that is not an
    /// object, or whose items are not objects, is malformed.
    pub fn from_value(value: &Value) -> Result<Self, HierarchyError> {
        let object = value
            .as_object()
            .ok_or_else(|| HierarchyError::Malformed("collection is not an object".into()))?;

        let items = match object.get("items") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::Object(map)) => {
                let mut items = IndexMap::with_capacity(map.len());
                for (id, data) in map {
                    let data = data
                        .as_object()
                        .ok_or_else(|| HierarchyError::NotAnObject(id.clone()))?;
                    items.insert(id.clone(), data.clone());
                }
                items
            }
            Some(_) => return Err(HierarchyError::Malformed("items is not an object".into())),
        };

        let order_value = object.get("order").or_else(|| object.get("tree"));
        let order = match order_value {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| HierarchyError::Malformed(format!("order: {}", e)))?,
        };

        Ok(Self { items, order })
    }

    /// `{items, order}` as JSON
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        let items: Map<String, Value> = self
            .items
            .iter()
            .map(|(id, data)| (id.clone(), Value::Object(data.clone())))
            .collect();
        object.insert("items".into(), Value::Object(items));
        object.insert(
            "order".into(),
            serde_json::to_value(&self.order).unwrap_or_else(|_| Value::Array(Vec::new())),
        );
        Value::Object(object)
    }

    pub fn items(&self) -> &IndexMap<String, ItemData> {
        &self.items
    }

    pub fn order(&self) -> &[OrderNode] {
        &self.order
    }

    pub fn get(&self, id: &str) -> Option<&ItemData> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// True if `id` is placed somewhere in the order forest
    pub fn is_placed(&self, id: &str) -> bool {
        forest::contains(&self.order, id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids in pre-order
    pub fn ids(&self) -> Vec<String> {
        forest::preorder_ids(&self.order)
    }

    /// Parent id of a placed node (`None` for top-level or unplaced nodes)
    pub fn parent_id(&self, id: &str) -> Option<String> {
        forest::parent_of(&self.order, id).and_then(|p| p.node_id().map(str::to_string))
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut IndexMap<String, ItemData>, &mut Forest) {
        (&mut self.items, &mut self.order)
    }

    pub fn into_parts(self) -> (IndexMap<String, ItemData>, Forest) {
        (self.items, self.order)
    }

    /// Every structural rule the collection breaks.
    ///
    /// Items that are not placed in the order are allowed; the reverse
    /// (an order node without an item) is not.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        fn visit<'a>(
            nodes: &'a [OrderNode],
            items: &IndexMap<String, ItemData>,
            seen: &mut HashSet<&'a str>,
            out: &mut Vec<Violation>,
        ) {
            for node in nodes {
                if node.id == ROOT_ID {
                    out.push(HierarchyError::ReservedId(node.id.clone()));
                }
                if !seen.insert(node.id.as_str()) {
                    out.push(HierarchyError::DuplicateNode(node.id.clone()));
                    continue;
                }
                if !items.contains_key(&node.id) {
                    out.push(HierarchyError::DanglingNode(node.id.clone()));
                }
                visit(&node.children, items, seen, out);
            }
        }

        visit(&self.order, &self.items, &mut seen, &mut violations);

        for (id, data) in &self.items {
            if id == ROOT_ID && !seen.contains(id.as_str()) {
                violations.push(HierarchyError::ReservedId(id.clone()));
            }
            if data.contains_key("id") {
                violations.push(HierarchyError::StoredId(id.clone()));
            }
        }

        violations
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
