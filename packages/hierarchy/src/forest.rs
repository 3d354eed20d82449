//! # Order Forest
//!
//! The ordered `{id, children}` structure behind every hierarchy collection.
//!
//! ```text
//! [a, b]            a
//!  a.children = [c] ├── c
//!                   b
//! ```
//!
//! These helpers are the only code that walks or rewrites the forest.
//! Traversals visit each id once, so a malformed forest that repeats an
//! id cannot send them into a loop.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::position::ParentRef;

/// A single node in the order forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNode {
    pub id: String,

    #[serde(default)]
    pub children: Forest,
}

/// Ordered list of sibling trees
pub type Forest = Vec<OrderNode>;

impl OrderNode {
    pub fn leaf(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(id: impl Into<String>, children: Forest) -> Self {
        Self {
            id: id.into(),
            children,
        }
    }

    /// Ids of this node and all its descendants, in pre-order
    pub fn subtree_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        collect_preorder(std::slice::from_ref(self), &mut out, &mut seen);
        out
    }
}

fn collect_preorder(forest: &[OrderNode], out: &mut Vec<String>, seen: &mut HashSet<String>) {
    for node in forest {
        if !seen.insert(node.id.clone()) {
            continue;
        }
        out.push(node.id.clone());
        collect_preorder(&node.children, out, seen);
    }
}

/// Every id in the forest, pre-order
pub fn preorder_ids(forest: &[OrderNode]) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect_preorder(forest, &mut out, &mut seen);
    out
}

/// Locate a node anywhere in the forest
pub fn find<'a>(forest: &'a [OrderNode], id: &str) -> Option<&'a OrderNode> {
    for node in forest {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find(&node.children, id) {
            return Some(found);
        }
    }
    None
}

pub fn find_mut<'a>(forest: &'a mut [OrderNode], id: &str) -> Option<&'a mut OrderNode> {
    for node in forest.iter_mut() {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

pub fn contains(forest: &[OrderNode], id: &str) -> bool {
    find(forest, id).is_some()
}

/// Sibling list a parent reference points at, if that parent exists
pub fn children_mut<'a>(forest: &'a mut Forest, parent: &ParentRef) -> Option<&'a mut Forest> {
    match parent {
        ParentRef::Root => Some(forest),
        ParentRef::Node(id) => find_mut(forest, id).map(|node| &mut node.children),
    }
}

pub fn children<'a>(forest: &'a [OrderNode], parent: &ParentRef) -> Option<&'a [OrderNode]> {
    match parent {
        ParentRef::Root => Some(forest),
        ParentRef::Node(id) => find(forest, id).map(|node| node.children.as_slice()),
    }
}

/// Remove a node (with its subtree intact) and return it
pub fn detach(forest: &mut Forest, id: &str) -> Option<OrderNode> {
    if let Some(index) = forest.iter().position(|node| node.id == id) {
        return Some(forest.remove(index));
    }
    for node in forest.iter_mut() {
        if let Some(found) = detach(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Parent of `id`, or `None` if the id is not in the forest
pub fn parent_of(forest: &[OrderNode], id: &str) -> Option<ParentRef> {
    if forest.iter().any(|node| node.id == id) {
        return Some(ParentRef::Root);
    }
    for node in forest {
        if node.children.iter().any(|child| child.id == id) {
            return Some(ParentRef::Node(node.id.clone()));
        }
        if let Some(found) = parent_of(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// True if `candidate` sits inside the subtree rooted at `ancestor`
/// (a node counts as part of its own subtree)
pub fn is_within(forest: &[OrderNode], ancestor: &str, candidate: &str) -> bool {
    match find(forest, ancestor) {
        Some(node) => node.id == candidate || find(&node.children, candidate).is_some(),
        None => false,
    }
}

/// Map of child id to parent id (`None` for top-level nodes)
pub fn parent_map(forest: &[OrderNode]) -> HashMap<String, Option<String>> {
    let mut out = HashMap::new();
    walk(forest, &mut |node, parent, _| {
        out.entry(node.id.clone())
            .or_insert_with(|| parent.map(str::to_string));
    });
    out
}

/// Depth-first walk passing each node with its parent id and depth.
/// Repeated ids are visited only the first time.
pub fn walk<'a, F>(forest: &'a [OrderNode], visit: &mut F)
where
    F: FnMut(&'a OrderNode, Option<&'a str>, usize),
{
    let mut seen = HashSet::new();
    walk_inner(forest, None, 0, &mut seen, visit);
}

fn walk_inner<'a, F>(
    forest: &'a [OrderNode],
    parent: Option<&'a str>,
    depth: usize,
    seen: &mut HashSet<&'a str>,
    visit: &mut F,
) where
    F: FnMut(&'a OrderNode, Option<&'a str>, usize),
{
    for node in forest {
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        visit(node, parent, depth);
        walk_inner(&node.children, Some(node.id.as_str()), depth + 1, seen, visit);
    }
}

/// Drop every node whose id fails the predicate, together with its subtree
pub fn retain(forest: &mut Forest, keep: &dyn Fn(&str) -> bool) {
    forest.retain(|node| keep(&node.id));
    for node in forest.iter_mut() {
        retain(&mut node.children, keep);
    }
}

/// Build a forest from `(id, parent)` pairs given in sibling order.
///
/// Pairs whose parent is unknown, or whose parent chain loops back on
/// itself, land at the top level so that no id is lost.
pub fn from_parent_links<I>(links: I) -> Forest
where
    I: IntoIterator<Item = (String, Option<String>)>,
{
    let links: Vec<(String, Option<String>)> = {
        let mut seen = HashSet::new();
        links
            .into_iter()
            .filter(|(id, _)| seen.insert(id.clone()))
            .collect()
    };
    let known: HashSet<&str> = links.iter().map(|(id, _)| id.as_str()).collect();
    let parents: HashMap<&str, &str> = links
        .iter()
        .filter_map(|(id, parent)| {
            parent
                .as_deref()
                .filter(|p| known.contains(p) && *p != id.as_str())
                .map(|p| (id.as_str(), p))
        })
        .collect();

    let loops_back = |start: &str| {
        let mut seen = HashSet::new();
        let mut cursor = start;
        while let Some(next) = parents.get(cursor) {
            if !seen.insert(cursor) {
                return true;
            }
            cursor = *next;
        }
        false
    };

    let mut by_parent: HashMap<Option<&str>, Vec<&str>> = HashMap::new();
    for (id, _) in &links {
        let parent = parents
            .get(id.as_str())
            .copied()
            .filter(|_| !loops_back(id));
        by_parent.entry(parent).or_default().push(id.as_str());
    }

    fn build<'a>(parent: Option<&'a str>, by_parent: &HashMap<Option<&'a str>, Vec<&'a str>>) -> Forest {
        by_parent
            .get(&parent)
            .map(|ids| {
                ids.iter()
                    .map(|id| OrderNode::with_children(*id, build(Some(*id), by_parent)))
                    .collect()
            })
            .unwrap_or_default()
    }

    build(None, &by_parent)
}
