//! Read-only views of a collection for listing and navigation.
//!
//! Each view carries the item's data alongside its depth, its parent, and
//! a `fullLabel` built from ancestor names (`"Folder > Sub > Item"`).

use serde::Serialize;
use std::collections::HashSet;

use crate::collection::{Hierarchy, ItemData};
use crate::forest::OrderNode;

const LABEL_SEPARATOR: &str = " > ";
const RESERVED_KEYS: [&str; 6] = ["id", "_level", "fullLabel", "parentId", "hasChildren", "children"];

/// One entry of the pre-order listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatItem {
    pub id: String,
    #[serde(rename = "_level")]
    pub level: usize,
    pub full_label: String,
    pub parent_id: Option<String>,
    pub has_children: bool,
    #[serde(flatten)]
    pub data: ItemData,
}

/// A folder with its direct non-folder children
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatGroup {
    #[serde(flatten)]
    pub folder: FlatItem,
    pub children: Vec<FlatItem>,
}

/// Nested view with item data at every node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeItem {
    #[serde(flatten)]
    pub item: FlatItem,
    pub children: Vec<TreeItem>,
}

impl Hierarchy {
    /// Every placed item in pre-order
    pub fn flat_items(&self) -> Vec<FlatItem> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for node in self.order() {
            self.flatten_into(node, 0, &mut Vec::new(), &mut visited, &mut out);
        }
        out
    }

    fn flatten_into<'a>(
        &self,
        node: &'a OrderNode,
        level: usize,
        chain: &mut Vec<&'a str>,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<FlatItem>,
    ) {
        if !visited.insert(node.id.as_str()) {
            return;
        }
        out.push(self.view_of(node, level, chain));
        chain.push(node.id.as_str());
        for child in &node.children {
            self.flatten_into(child, level + 1, chain, visited, out);
        }
        chain.pop();
    }

    /// Folders (items with `type: "folder"`) with their direct non-folder children
    pub fn flat_groups(&self) -> Vec<FlatGroup> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for node in self.order() {
            self.group_into(node, 0, &mut Vec::new(), &mut visited, &mut out);
        }
        out
    }

    fn group_into<'a>(
        &self,
        node: &'a OrderNode,
        level: usize,
        chain: &mut Vec<&'a str>,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<FlatGroup>,
    ) {
        if !visited.insert(node.id.as_str()) || !self.is_folder(&node.id) {
            return;
        }

        let folder = self.view_of(node, level, chain);
        chain.push(node.id.as_str());
        let children = node
            .children
            .iter()
            .filter(|child| !self.is_folder(&child.id))
            .map(|child| self.view_of(child, level + 1, chain))
            .collect();
        out.push(FlatGroup { folder, children });

        for child in &node.children {
            self.group_into(child, level + 1, chain, visited, out);
        }
        chain.pop();
    }

    /// The order forest with item data attached at each node
    pub fn tree_view(&self) -> Vec<TreeItem> {
        let mut visited = HashSet::new();
        self.order()
            .iter()
            .filter_map(|node| self.tree_item(node, 0, &mut Vec::new(), &mut visited))
            .collect()
    }

    fn tree_item<'a>(
        &self,
        node: &'a OrderNode,
        level: usize,
        chain: &mut Vec<&'a str>,
        visited: &mut HashSet<&'a str>,
    ) -> Option<TreeItem> {
        if !visited.insert(node.id.as_str()) {
            return None;
        }
        let item = self.view_of(node, level, chain);
        chain.push(node.id.as_str());
        let children = node
            .children
            .iter()
            .filter_map(|child| self.tree_item(child, level + 1, chain, visited))
            .collect();
        chain.pop();
        Some(TreeItem { item, children })
    }

    fn is_folder(&self, id: &str) -> bool {
        self.get(id)
            .and_then(|data| data.get("type"))
            .and_then(|kind| kind.as_str())
            == Some("folder")
    }

    fn name_of(&self, id: &str) -> &str {
        self.get(id)
            .and_then(|data| data.get("name"))
            .and_then(|name| name.as_str())
            .unwrap_or("")
    }

    fn view_of(&self, node: &OrderNode, level: usize, chain: &[&str]) -> FlatItem {
        let mut labels: Vec<&str> = chain
            .iter()
            .map(|id| self.name_of(id))
            .filter(|name| !name.is_empty())
            .collect();
        labels.push(self.name_of(&node.id));

        let mut data = self.get(&node.id).cloned().unwrap_or_default();
        for key in RESERVED_KEYS {
            data.remove(key);
        }

        FlatItem {
            id: node.id.clone(),
            level,
            full_label: labels.join(LABEL_SEPARATOR),
            parent_id: chain.last().map(|id| id.to_string()),
            has_children: !node.children.is_empty(),
            data,
        }
    }
}
