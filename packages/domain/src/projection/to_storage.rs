//! Domain → storage.
//!
//! Every written entry is merged onto the prior stored entry with the same
//! id, so stored fields the domain does not model survive. Structural
//! fields the domain derives (`id`, `parentId`, `children`, the `*Ids`
//! lists) are never written as data; a stored `parentId` is kept in step
//! with the tree when the prior entry had one.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tessera_hierarchy::forest::{self, from_parent_links};
use tessera_hierarchy::{Forest, Hierarchy, ItemData, OrderNode};

use super::stored::{order_value, read_forest};
use crate::constants::MODEL_VERSION;
use crate::error::DomainError;
use crate::model::{DomainState, Id, Item, ItemCollection, Layout, Scene, Section};

/// Write `domain` back into storage form on top of `prior`
pub fn to_storage(domain: &DomainState, prior: &Value) -> Result<Value, DomainError> {
    let prior_root = prior.as_object().cloned().unwrap_or_default();
    let mut next = prior_root.clone();

    next.insert("model_version".into(), json!(MODEL_VERSION));

    let mut project = object_of(prior_root.get("project"));
    for (key, value) in to_fields(&domain.project)? {
        project.insert(key, value);
    }
    next.insert("project".into(), Value::Object(project));

    for (kind, collection) in &domain.resources {
        let written = write_items(collection, prior_root.get(kind.as_str()), resource_data)?;
        next.insert(kind.clone(), written);
    }

    let mut story = object_of(prior_root.get("story"));
    story.insert("initialSceneId".into(), json!(domain.story.initial_scene_id));
    next.insert("story".into(), Value::Object(story));
    next.insert("scenes".into(), write_scenes(domain, prior_root.get("scenes"))?);

    next.insert("layouts".into(), write_layouts(domain, prior_root.get("layouts"))?);
    next.insert(
        "variables".into(),
        write_items(&domain.variables, prior_root.get("variables"), variable_data)?,
    );

    Ok(Value::Object(next))
}

fn object_of(value: Option<&Value>) -> Map<String, Value> {
    value.and_then(Value::as_object).cloned().unwrap_or_default()
}

fn to_fields<T: Serialize>(entity: &T) -> Result<Map<String, Value>, DomainError> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(DomainError::Invariant(format!("entity serialized to {}", other))),
        Err(e) => Err(DomainError::Invariant(e.to_string())),
    }
}

fn strip(mut fields: Map<String, Value>, derived: &[&str]) -> Map<String, Value> {
    for key in derived {
        fields.remove(*key);
    }
    fields
}

/// `fields` over the prior entry; the item's own id never lands in its data
fn merge_onto(prior: Option<&Value>, fields: Map<String, Value>) -> ItemData {
    let mut out = object_of(prior);
    out.remove("id");
    for (key, value) in fields {
        out.insert(key, value);
    }
    out
}

/// Refresh a stored `parentId` if the prior entry carried one
fn sync_parent(data: &mut ItemData, prior: Option<&Value>, parent: Option<&str>) {
    let stored = prior
        .and_then(Value::as_object)
        .map_or(false, |object| object.contains_key("parentId"));
    if stored {
        data.insert("parentId".into(), json!(parent));
    }
}

fn prior_items(prior_collection: Option<&Value>) -> Map<String, Value> {
    prior_collection
        .and_then(Value::as_object)
        .and_then(|collection| collection.get("items"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn prior_order(prior_collection: Option<&Value>) -> Forest {
    read_forest(prior_collection.and_then(Value::as_object).and_then(order_value))
}

/// Validate and write `{items, order}` onto the prior collection object
fn write_collection(
    prior_collection: Option<&Value>,
    items: IndexMap<String, ItemData>,
    order: Forest,
) -> Result<Value, DomainError> {
    let collection = Hierarchy::from_parts(items, order)?;
    let mut out = object_of(prior_collection);
    out.remove("tree");
    if let Value::Object(written) = collection.to_value() {
        out.extend(written);
    }
    Ok(Value::Object(out))
}

/// `ordered` restricted to `known`, followed by any `known` id it misses
fn unique_in_order<'a>(ordered: &'a [Id], known: &[&'a Id]) -> Vec<&'a Id> {
    let known_set: HashSet<&str> = known.iter().map(|id| id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in ordered.iter().chain(known.iter().copied()) {
        if known_set.contains(id.as_str()) && seen.insert(id.as_str()) {
            out.push(id);
        }
    }
    out
}

fn write_items(
    collection: &ItemCollection,
    prior_collection: Option<&Value>,
    shape: fn(&Item) -> Result<Map<String, Value>, DomainError>,
) -> Result<Value, DomainError> {
    let prior = prior_items(prior_collection);
    let known: Vec<&Id> = collection.items.keys().collect();
    let ordered = unique_in_order(&collection.order, &known);

    let mut items = IndexMap::with_capacity(collection.items.len());
    for (id, item) in &collection.items {
        let prior_item = prior.get(id);
        let mut data = merge_onto(prior_item, shape(item)?);
        sync_parent(&mut data, prior_item, item.parent_id.as_deref());
        items.insert(id.clone(), data);
    }

    let order = from_parent_links(ordered.into_iter().map(|id| {
        let parent = collection.items.get(id).and_then(|item| item.parent_id.clone());
        (id.clone(), parent)
    }));
    write_collection(prior_collection, items, order)
}

fn resource_data(item: &Item) -> Result<Map<String, Value>, DomainError> {
    Ok(strip(to_fields(item)?, &["id", "parentId"]))
}

fn variable_data(item: &Item) -> Result<Map<String, Value>, DomainError> {
    let mut data = resource_data(item)?;
    if item.is_folder() {
        data.insert("type".into(), json!("folder"));
        return Ok(data);
    }

    let text = |key: &str| data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
    let value_type = text("type")
        .or_else(|| text("variableType"))
        .unwrap_or("string")
        .to_string();
    let default = match data.get("default") {
        Some(default) => default.clone(),
        None => data.get("value").cloned().unwrap_or_else(|| json!("")),
    };

    data.insert("itemType".into(), json!("variable"));
    data.insert("type".into(), json!(value_type));
    data.insert("variableType".into(), json!(value_type));
    data.insert("default".into(), default.clone());
    // Only a missing value starts at the default
    data.entry("value").or_insert(default);
    Ok(data)
}

/// Reorder the ids of `desired` inside the prior forest.
///
/// Ids failing `keep` are dropped. Nodes that hold a desired id keep their
/// shape and are relabelled in desired order, so ids the domain does not
/// order (folders) stay where they were. Desired ids the forest lacks are
/// placed next to their predecessor in `desired`.
pub(crate) fn arrange(prior: &[OrderNode], keep: &dyn Fn(&str) -> bool, desired: &[&Id]) -> Forest {
    let mut forest = dedupe(prior.to_vec(), &mut HashSet::new());
    forest::retain(&mut forest, keep);

    let desired_set: HashSet<&str> = desired.iter().map(|id| id.as_str()).collect();
    let present: HashSet<String> = forest::preorder_ids(&forest).into_iter().collect();
    let mut placed = desired
        .iter()
        .filter(|id| present.contains(id.as_str()))
        .map(|id| id.to_string());
    relabel(&mut forest, &desired_set, &mut placed);

    for (index, id) in desired.iter().enumerate() {
        if present.contains(id.as_str()) {
            continue;
        }
        let anchor = desired[..index].last().map(|previous| (previous.as_str(), 1)).or_else(|| {
            desired[index + 1..]
                .iter()
                .find(|next| present.contains(next.as_str()))
                .map(|next| (next.as_str(), 0))
        });
        insert_near(&mut forest, id, anchor);
    }
    forest
}

fn dedupe(nodes: Forest, seen: &mut HashSet<String>) -> Forest {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node.id.clone()) {
            continue;
        }
        let children = dedupe(node.children, seen);
        out.push(OrderNode::with_children(node.id, children));
    }
    out
}

fn relabel(forest: &mut Forest, desired: &HashSet<&str>, placed: &mut dyn Iterator<Item = String>) {
    for node in forest.iter_mut() {
        if desired.contains(node.id.as_str()) {
            if let Some(id) = placed.next() {
                node.id = id;
            }
        }
        relabel(&mut node.children, desired, placed);
    }
}

/// Insert a leaf for `id` beside `anchor` (`(sibling, 1)` after it,
/// `(sibling, 0)` before it), or at the end of the top level
fn insert_near(forest: &mut Forest, id: &str, anchor: Option<(&str, usize)>) {
    if let Some((sibling, offset)) = anchor {
        if let Some(parent) = forest::parent_of(forest, sibling) {
            if let Some(siblings) = forest::children_mut(forest, &parent) {
                if let Some(at) = siblings.iter().position(|node| node.id == sibling) {
                    siblings.insert(at + offset, OrderNode::leaf(id));
                    return;
                }
            }
        }
    }
    forest.push(OrderNode::leaf(id));
}

fn write_scenes(domain: &DomainState, prior_collection: Option<&Value>) -> Result<Value, DomainError> {
    let prior = prior_items(prior_collection);
    let known: Vec<&Id> = domain.scenes.keys().collect();
    let scene_order = unique_in_order(&domain.story.scene_order, &known);

    let carried = |data: &Value| data.is_object() && data.get("type").and_then(Value::as_str) != Some("scene");
    let mut items = IndexMap::new();
    for (id, data) in &prior {
        if let Some(scene) = domain.scenes.get(id) {
            items.insert(id.clone(), write_scene(domain, scene, Some(data))?);
        } else if carried(data) {
            items.insert(id.clone(), merge_onto(Some(data), Map::new()));
        }
    }
    for id in &scene_order {
        if !items.contains_key(id.as_str()) {
            items.insert((*id).clone(), write_scene(domain, &domain.scenes[id.as_str()], None)?);
        }
    }

    let keep = |id: &str| domain.scenes.contains_key(id) || prior.get(id).map_or(false, carried);
    let order = arrange(&prior_order(prior_collection), &keep, &scene_order);
    write_collection(prior_collection, items, order)
}

fn write_scene(domain: &DomainState, scene: &Scene, prior: Option<&Value>) -> Result<ItemData, DomainError> {
    let prior_sections = prior.and_then(|p| p.get("sections"));
    let mut fields = strip(to_fields(scene)?, &["id", "sectionIds"]);
    fields.insert("type".into(), json!("scene"));
    fields.insert("sections".into(), write_sections(domain, scene, prior_sections)?);
    Ok(merge_onto(prior, fields))
}

fn write_sections(
    domain: &DomainState,
    scene: &Scene,
    prior_collection: Option<&Value>,
) -> Result<Value, DomainError> {
    let prior = prior_items(prior_collection);
    let known: Vec<&Id> = domain
        .sections
        .values()
        .filter(|section| section.scene_id == scene.id)
        .map(|section| &section.id)
        .collect();
    let section_order = unique_in_order(&scene.section_ids, &known);

    let is_folder = |data: &Value| data.get("type").and_then(Value::as_str) == Some("folder");
    let mut items = IndexMap::new();
    for (id, data) in &prior {
        if is_folder(data) {
            items.insert(id.clone(), merge_onto(Some(data), Map::new()));
        }
    }
    for id in &section_order {
        let section = &domain.sections[id.as_str()];
        items.insert((*id).clone(), write_section(domain, section, prior.get(id.as_str()))?);
    }

    let keep = |id: &str| {
        section_order.iter().any(|section_id| section_id.as_str() == id) || prior.get(id).map_or(false, is_folder)
    };
    let order = arrange(&prior_order(prior_collection), &keep, &section_order);
    write_collection(prior_collection, items, order)
}

fn write_section(domain: &DomainState, section: &Section, prior: Option<&Value>) -> Result<ItemData, DomainError> {
    let prior_lines_collection = prior.and_then(|p| p.get("lines"));
    let prior_lines = prior_items(prior_lines_collection);
    let known: Vec<&Id> = domain
        .lines
        .values()
        .filter(|line| line.section_id == section.id)
        .map(|line| &line.id)
        .collect();
    let line_order = unique_in_order(&section.line_ids, &known);

    let mut lines = IndexMap::new();
    for id in &line_order {
        let line = &domain.lines[id.as_str()];
        let fields = strip(to_fields(line)?, &["id", "sectionId"]);
        lines.insert((*id).clone(), merge_onto(prior_lines.get(id.as_str()), fields));
    }
    let keep = |id: &str| line_order.iter().any(|line_id| line_id.as_str() == id);
    let order = arrange(&prior_order(prior_lines_collection), &keep, &line_order);

    let mut fields = strip(to_fields(section)?, &["id", "sceneId", "lineIds"]);
    fields.insert("type".into(), json!("section"));
    fields.insert("lines".into(), write_collection(prior_lines_collection, lines, order)?);
    Ok(merge_onto(prior, fields))
}

fn write_layouts(domain: &DomainState, prior_collection: Option<&Value>) -> Result<Value, DomainError> {
    let prior = prior_items(prior_collection);
    let tree_ids = forest::preorder_ids(&domain.layout_tree);
    let known: Vec<&Id> = domain.layouts.keys().collect();
    let ordered = unique_in_order(&tree_ids, &known);

    let mut items = IndexMap::new();
    for id in &ordered {
        let layout = &domain.layouts[id.as_str()];
        let prior_layout = prior.get(id.as_str());
        let mut fields = strip(to_fields(layout)?, &["id", "elements", "rootElementOrder", "parentId"]);
        if !layout.is_folder() {
            let prior_elements = prior_layout.and_then(|p| p.get("elements"));
            fields.insert("elements".into(), write_elements(layout, prior_elements)?);
        }
        let mut data = merge_onto(prior_layout, fields);
        sync_parent(&mut data, prior_layout, layout.parent_id.as_deref());
        items.insert((*id).clone(), data);
    }

    let order = from_parent_links(ordered.iter().map(|id| {
        let parent = domain.layouts.get(id.as_str()).and_then(|layout| layout.parent_id.clone());
        ((*id).clone(), parent)
    }));
    write_collection(prior_collection, items, order)
}

fn write_elements(layout: &Layout, prior_collection: Option<&Value>) -> Result<Value, DomainError> {
    let prior = prior_items(prior_collection);

    let mut items = IndexMap::new();
    for (id, element) in &layout.elements {
        let prior_element = prior.get(id);
        let fields = strip(to_fields(element)?, &["id", "parentId", "children"]);
        let mut data = merge_onto(prior_element, fields);
        sync_parent(&mut data, prior_element, element.parent_id.as_deref());
        items.insert(id.clone(), data);
    }

    // Lists are authoritative; a child is only placed under the element its
    // parentId agrees with
    fn make_node(layout: &Layout, id: &str, visited: &mut HashSet<String>) -> Option<OrderNode> {
        let element = layout.elements.get(id)?;
        if !visited.insert(id.to_string()) {
            return None;
        }
        let children = element
            .children
            .iter()
            .filter(|child| {
                layout
                    .elements
                    .get(child.as_str())
                    .map_or(false, |c| c.parent_id.as_deref() == Some(id))
            })
            .filter_map(|child| make_node(layout, child, visited))
            .collect();
        Some(OrderNode::with_children(id, children))
    }

    let mut visited = HashSet::new();
    let mut order: Forest = Vec::new();
    for id in layout.root_element_order.iter().chain(layout.elements.keys()) {
        if let Some(node) = make_node(layout, id, &mut visited) {
            order.push(node);
        }
    }
    write_collection(prior_collection, items, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{to_domain, ProjectionContext};
    use serde_json::json;

    fn ctx() -> ProjectionContext {
        ProjectionContext::new("p1", 5)
    }

    #[test]
    fn test_arrange_keeps_folders_and_reorders_slots() {
        let prior = vec![
            OrderNode::with_children("dir", vec![OrderNode::leaf("a")]),
            OrderNode::leaf("b"),
        ];
        let a = "a".to_string();
        let b = "b".to_string();
        let c = "c".to_string();
        let keep = |id: &str| id != "gone";
        let forest = arrange(&prior, &keep, &[&b, &c, &a]);
        assert_eq!(
            forest,
            vec![
                OrderNode::with_children("dir", vec![OrderNode::leaf("b"), OrderNode::leaf("c")]),
                OrderNode::leaf("a"),
            ]
        );
    }

    #[test]
    fn test_arrange_new_first_goes_before_successor() {
        let prior = vec![OrderNode::leaf("a")];
        let a = "a".to_string();
        let n = "n".to_string();
        let forest = arrange(&prior, &|_| true, &[&n, &a]);
        assert_eq!(forest, vec![OrderNode::leaf("n"), OrderNode::leaf("a")]);
    }

    #[test]
    fn test_unmodelled_fields_survive() {
        let storage = json!({
            "model_version": 2,
            "project": {"id": "p1", "name": "Demo", "theme": "dark"},
            "images": {
                "items": {"img": {"name": "Logo", "fileId": "f-1", "width": 64}},
                "order": [{"id": "img"}],
                "label": "Images"
            },
            "customRoot": {"keep": true}
        });
        let domain = to_domain(&storage, &ctx());
        let written = to_storage(&domain, &storage).unwrap();
        assert_eq!(written["customRoot"], json!({"keep": true}));
        assert_eq!(written["project"]["theme"], json!("dark"));
        assert_eq!(written["images"]["label"], json!("Images"));
        let img = &written["images"]["items"]["img"];
        assert_eq!(img["fileId"], json!("f-1"));
        assert_eq!(img["width"], json!(64));
        assert!(img.get("id").is_none());
        assert!(img.get("parentId").is_none());
    }

    #[test]
    fn test_scenes_write_nested_collections() {
        let mut domain = DomainState::empty("p1", 5);
        let storage = json!({"model_version": 2});
        domain.story.scene_order = vec!["s".into()];
        domain.story.initial_scene_id = Some("s".into());
        domain.scenes.insert(
            "s".into(),
            Scene {
                id: "s".into(),
                name: "S".into(),
                section_ids: vec!["x".into()],
                initial_section_id: Some("x".into()),
                position: json!({"x": 1, "y": 2}),
                created_at: 5,
                updated_at: 5,
                extra: Default::default(),
            },
        );
        domain.sections.insert(
            "x".into(),
            Section {
                id: "x".into(),
                scene_id: "s".into(),
                name: "X".into(),
                line_ids: vec![],
                initial_line_id: None,
                created_at: 5,
                updated_at: 5,
                extra: Default::default(),
            },
        );

        let written = to_storage(&domain, &storage).unwrap();
        let scene = &written["scenes"]["items"]["s"];
        assert_eq!(scene["type"], json!("scene"));
        assert!(scene.get("sectionIds").is_none());
        assert_eq!(scene["sections"]["order"], json!([{"id": "x", "children": []}]));
        assert_eq!(scene["sections"]["items"]["x"]["type"], json!("section"));
        assert_eq!(written["story"]["initialSceneId"], json!("s"));
    }

    #[test]
    fn test_stored_parent_id_tracks_tree() {
        let storage = json!({
            "variables": {
                "items": {
                    "g": {"type": "folder", "parentId": null},
                    "v": {"name": "n", "type": "number", "default": 1, "parentId": null}
                },
                "order": [{"id": "g"}, {"id": "v"}]
            }
        });
        let mut domain = to_domain(&storage, &ctx());
        domain.variables.items["v"].parent_id = Some("g".into());
        let written = to_storage(&domain, &storage).unwrap();
        assert_eq!(written["variables"]["items"]["v"]["parentId"], json!("g"));
        assert_eq!(written["variables"]["items"]["v"]["value"], json!(1));
        assert_eq!(
            written["variables"]["order"],
            json!([{"id": "g", "children": [{"id": "v", "children": []}]}])
        );
    }

    #[test]
    fn test_variable_value_is_not_reset_to_default() {
        let storage = json!({
            "variables": {
                "items": {
                    "v": {"name": "score", "type": "number", "default": 0, "value": 5},
                    "w": {"name": "fresh", "type": "number", "default": 3}
                },
                "order": [{"id": "v"}, {"id": "w"}]
            }
        });
        let written = to_storage(&to_domain(&storage, &ctx()), &storage).unwrap();
        assert_eq!(written["variables"]["items"]["v"]["value"], json!(5));
        assert_eq!(written["variables"]["items"]["v"]["default"], json!(0));
        assert_eq!(written["variables"]["items"]["w"]["value"], json!(3));
    }
}
