//! Storage → domain.
//!
//! Tree order is authoritative: an item's place in its collection's order
//! forest decides its parent and its position. A stored `parentId` is only
//! consulted for items the forest does not place, and unplaced items are
//! appended after the placed ones. Stale `initial*Id` references fall back
//! to the first ordered child.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tessera_hierarchy::forest::from_parent_links;

use super::stored::{append_missing_ids, non_empty_str, timestamp, without, StoredCollection, TreeLinks};
use super::ProjectionContext;
use crate::constants::RESOURCE_TYPES;
use crate::model::{
    default_scene_position, DomainState, Id, Item, ItemCollection, Layout, LayoutElement, Line, Scene, Section,
    Timestamp,
};

const PROJECT_KEYS: [&str; 5] = ["id", "name", "description", "createdAt", "updatedAt"];
const SCENE_KEYS: [&str; 9] = [
    "id",
    "type",
    "name",
    "sections",
    "sectionIds",
    "initialSectionId",
    "position",
    "createdAt",
    "updatedAt",
];
const SECTION_KEYS: [&str; 9] = [
    "id",
    "type",
    "sceneId",
    "name",
    "lines",
    "lineIds",
    "initialLineId",
    "createdAt",
    "updatedAt",
];
const LINE_KEYS: [&str; 5] = ["id", "sectionId", "actions", "createdAt", "updatedAt"];
const ITEM_KEYS: [&str; 4] = ["id", "parentId", "createdAt", "updatedAt"];
const LAYOUT_KEYS: [&str; 9] = [
    "id",
    "type",
    "name",
    "layoutType",
    "parentId",
    "elements",
    "rootElementOrder",
    "createdAt",
    "updatedAt",
];
const ELEMENT_KEYS: [&str; 3] = ["id", "parentId", "children"];

/// Project stored state onto the normalized domain model.
///
/// Total: anything unreadable projects as absent, and a non-object input
/// yields an empty project.
pub fn to_domain(storage: &Value, ctx: &ProjectionContext) -> DomainState {
    let now = ctx.now;
    let mut state = DomainState::empty(&ctx.project_id, now);
    let Some(root) = storage.as_object() else {
        return state;
    };

    if let Some(project) = root.get("project").and_then(Value::as_object) {
        read_project(project, &mut state, now);
    }
    read_story(root, &mut state, now);

    state.resources = RESOURCE_TYPES
        .iter()
        .map(|kind| {
            let collection = StoredCollection::read(root.get(*kind));
            (kind.to_string(), read_items(&collection, now, resource_fields))
        })
        .collect();

    let layouts = StoredCollection::read(root.get("layouts"));
    state.layouts = read_layouts(&layouts, now);
    let ordered = append_missing_ids(&layouts.tree_links().ordered, &layouts.ids());
    let layout_tree = from_parent_links(ordered.into_iter().map(|id| {
        let parent = state.layouts.get(&id).and_then(|layout| layout.parent_id.clone());
        (id, parent)
    }));
    state.layout_tree = layout_tree;

    let variables = StoredCollection::read(root.get("variables"));
    state.variables = read_items(&variables, now, variable_fields);

    state
}

fn read_project(project: &Map<String, Value>, state: &mut DomainState, now: Timestamp) {
    let target = &mut state.project;
    if let Some(id) = project.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
        target.id = id.to_string();
    }
    target.name = project.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    target.description = project
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    target.created_at = timestamp(project.get("createdAt")).unwrap_or(now);
    target.updated_at = timestamp(project.get("updatedAt")).unwrap_or(target.created_at);
    target.extra = without(project, &PROJECT_KEYS);
}

fn created_updated(object: &Map<String, Value>, now: Timestamp) -> (Timestamp, Timestamp) {
    let created = timestamp(object.get("createdAt")).unwrap_or(now);
    let updated = timestamp(object.get("updatedAt")).unwrap_or(created);
    (created, updated)
}

fn is_folder(object: &Map<String, Value>) -> bool {
    object.get("type").and_then(Value::as_str) == Some("folder")
}

/// `preferred` if it is one of `ids`, otherwise the first id
fn initial_of(preferred: Option<&str>, ids: &[Id]) -> Option<Id> {
    preferred
        .filter(|id| ids.iter().any(|candidate| candidate == id))
        .map(str::to_string)
        .or_else(|| ids.first().cloned())
}

fn read_story(root: &Map<String, Value>, state: &mut DomainState, now: Timestamp) {
    let scenes = StoredCollection::read(root.get("scenes"));

    for (scene_id, scene) in &scenes.items {
        if scene.get("type").and_then(Value::as_str) != Some("scene") {
            continue;
        }
        let sections = StoredCollection::read(scene.get("sections"));
        let section_ids = {
            let placed: Vec<Id> = sections
                .tree_links()
                .ordered
                .into_iter()
                .filter(|id| !sections.get(id).map_or(false, is_folder))
                .collect();
            let all: Vec<Id> = sections
                .items
                .iter()
                .filter(|(_, section)| !is_folder(section))
                .map(|(id, _)| id.to_string())
                .collect();
            append_missing_ids(&placed, &all)
        };

        let (created_at, updated_at) = created_updated(scene, now);
        state.scenes.insert(
            scene_id.to_string(),
            Scene {
                id: scene_id.to_string(),
                name: non_empty_str(scene, "name")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Scene {}", scene_id)),
                initial_section_id: initial_of(non_empty_str(scene, "initialSectionId"), &section_ids),
                section_ids,
                position: match scene.get("position") {
                    None | Some(Value::Null) => default_scene_position(),
                    Some(position) => position.clone(),
                },
                created_at,
                updated_at,
                extra: without(scene, &SCENE_KEYS),
            },
        );

        for (section_id, section) in &sections.items {
            if is_folder(section) {
                continue;
            }
            read_section(scene_id, section_id, section, state, now);
        }
    }

    let scene_ids: Vec<Id> = state.scenes.keys().cloned().collect();
    let scene_order = append_missing_ids(&scenes.tree_links().ordered, &scene_ids);
    let stored_initial = root
        .get("story")
        .and_then(Value::as_object)
        .and_then(|story| non_empty_str(story, "initialSceneId"));
    state.story.initial_scene_id = initial_of(stored_initial, &scene_order);
    state.story.scene_order = scene_order;
}

fn read_section(
    scene_id: &str,
    section_id: &str,
    section: &Map<String, Value>,
    state: &mut DomainState,
    now: Timestamp,
) {
    let lines = StoredCollection::read(section.get("lines"));
    let line_ids = append_missing_ids(&lines.tree_links().ordered, &lines.ids());
    let (created_at, updated_at) = created_updated(section, now);

    state.sections.insert(
        section_id.to_string(),
        Section {
            id: section_id.to_string(),
            scene_id: scene_id.to_string(),
            name: non_empty_str(section, "name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Section {}", section_id)),
            initial_line_id: initial_of(non_empty_str(section, "initialLineId"), &line_ids),
            line_ids,
            created_at,
            updated_at,
            extra: without(section, &SECTION_KEYS),
        },
    );

    for (line_id, line) in &lines.items {
        let (created_at, updated_at) = created_updated(line, now);
        state.lines.insert(
            line_id.to_string(),
            Line {
                id: line_id.to_string(),
                section_id: section_id.to_string(),
                actions: line.get("actions").and_then(Value::as_object).cloned().unwrap_or_default(),
                created_at,
                updated_at,
                extra: without(line, &LINE_KEYS),
            },
        );
    }
}

/// Parent of `id`: its tree parent when placed, otherwise a stored
/// `parentId` naming another existing entry
fn resolve_parent(
    id: &str,
    data: &Map<String, Value>,
    links: &TreeLinks,
    exists: &dyn Fn(&str) -> bool,
) -> Option<Id> {
    let candidate = if links.is_placed(id) {
        links.parent(id)
    } else {
        non_empty_str(data, "parentId")
    };
    candidate
        .filter(|parent| *parent != id && exists(parent))
        .map(str::to_string)
}

fn read_items(
    collection: &StoredCollection<'_>,
    now: Timestamp,
    shape: fn(&str, &Map<String, Value>) -> Map<String, Value>,
) -> ItemCollection {
    let links = collection.tree_links();
    let exists = |id: &str| collection.contains(id);
    let order = append_missing_ids(&links.ordered, &collection.ids());

    let items = collection
        .items
        .iter()
        .map(|(id, data)| {
            let (created_at, updated_at) = created_updated(data, now);
            let item = Item {
                id: id.to_string(),
                parent_id: resolve_parent(id, data, &links, &exists),
                created_at,
                updated_at,
                fields: shape(id, data),
            };
            (id.to_string(), item)
        })
        .collect();

    ItemCollection { items, order }
}

fn resource_fields(_id: &str, data: &Map<String, Value>) -> Map<String, Value> {
    without(data, &ITEM_KEYS)
}

fn variable_fields(id: &str, data: &Map<String, Value>) -> Map<String, Value> {
    let mut fields = without(data, &ITEM_KEYS);
    if is_folder(data) {
        let name = non_empty_str(data, "name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Folder {}", id));
        fields.insert("type".into(), json!("folder"));
        fields.insert("name".into(), json!(name));
        return fields;
    }

    let inferred_type = non_empty_str(data, "type")
        .or_else(|| non_empty_str(data, "variableType"))
        .map(str::to_string)
        .unwrap_or_else(|| {
            let holds = |value: Option<&Value>, check: fn(&Value) -> bool| value.map_or(false, check);
            if holds(data.get("default"), Value::is_number) || holds(data.get("value"), Value::is_number) {
                "number".into()
            } else if holds(data.get("default"), Value::is_boolean) || holds(data.get("value"), Value::is_boolean) {
                "boolean".into()
            } else {
                "string".into()
            }
        });
    let default = data
        .get("default")
        .or_else(|| data.get("value"))
        .cloned()
        .unwrap_or_else(|| json!(""));

    fields.insert("itemType".into(), json!("variable"));
    fields.insert("type".into(), json!(inferred_type));
    fields.insert("default".into(), default);
    fields
}

fn read_layouts(collection: &StoredCollection<'_>, now: Timestamp) -> IndexMap<Id, Layout> {
    let links = collection.tree_links();
    let exists = |id: &str| collection.contains(id);

    collection
        .items
        .iter()
        .map(|(id, data)| {
            let (created_at, updated_at) = created_updated(data, now);
            let kind = non_empty_str(data, "type").unwrap_or("layout").to_string();
            let folder = kind == "folder";
            let (elements, root_element_order) = if folder {
                (IndexMap::new(), Vec::new())
            } else {
                read_elements(&StoredCollection::read(data.get("elements")))
            };
            let layout = Layout {
                id: id.to_string(),
                name: non_empty_str(data, "name").map(str::to_string).unwrap_or_else(|| {
                    if folder {
                        format!("Folder {}", id)
                    } else {
                        format!("Layout {}", id)
                    }
                }),
                layout_type: match non_empty_str(data, "layoutType") {
                    Some(layout_type) => Some(layout_type.to_string()),
                    None if folder => None,
                    None => Some("base".to_string()),
                },
                kind,
                parent_id: resolve_parent(id, data, &links, &exists),
                elements,
                root_element_order,
                created_at,
                updated_at,
                extra: without(data, &LAYOUT_KEYS),
            };
            (id.to_string(), layout)
        })
        .collect()
}

fn read_elements(collection: &StoredCollection<'_>) -> (IndexMap<Id, LayoutElement>, Vec<Id>) {
    let links = collection.tree_links();
    let exists = |id: &str| collection.contains(id);

    let mut elements: IndexMap<Id, LayoutElement> = collection
        .items
        .iter()
        .map(|(id, data)| {
            let element = LayoutElement {
                id: id.to_string(),
                parent_id: resolve_parent(id, data, &links, &exists),
                children: Vec::new(),
                fields: without(data, &ELEMENT_KEYS),
            };
            (id.to_string(), element)
        })
        .collect();

    // Placed children in tree order, then children known only by parentId
    let unplaced: Vec<Id> = collection
        .ids()
        .into_iter()
        .filter(|id| !links.is_placed(id))
        .collect();
    for id in links.ordered.iter().filter(|id| exists(id)).chain(unplaced.iter()) {
        let Some(parent) = elements.get(id.as_str()).and_then(|e| e.parent_id.clone()) else {
            continue;
        };
        if let Some(parent) = elements.get_mut(&parent) {
            if !parent.children.contains(id) {
                parent.children.push(id.clone());
            }
        }
    }

    let roots: Vec<Id> = elements
        .values()
        .filter(|element| element.parent_id.is_none())
        .map(|element| element.id.clone())
        .collect();
    let placed_roots: Vec<Id> = links
        .ordered
        .iter()
        .filter(|id| roots.contains(id))
        .cloned()
        .collect();
    let root_element_order = append_missing_ids(&placed_roots, &roots);

    (elements, root_element_order)
}
