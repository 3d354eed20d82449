//! Applies one domain event to a domain state.
//!
//! The reducer trusts preconditions: every id an event names has already
//! been checked. A missing entity still surfaces as
//! [`DomainError::MissingEntity`] instead of a panic, so replaying an
//! event onto the wrong state fails cleanly.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tessera_hierarchy::forest;
use tessera_hierarchy::{OrderNode, ParentRef};

use super::event::*;
use crate::error::DomainError;
use crate::model::{
    default_scene_position, merge_patch, DomainState, Fields, Id, Item, ItemCollection, Layout, LayoutElement, Line,
    Scene, Section, Timestamp,
};
use crate::projection::stored::{without, StoredCollection};

const ITEM_RESERVED: [&str; 4] = ["id", "parentId", "createdAt", "updatedAt"];
const ELEMENT_RESERVED: [&str; 3] = ["id", "parentId", "children"];
const LAYOUT_RESERVED: [&str; 8] = [
    "id",
    "name",
    "layoutType",
    "parentId",
    "elements",
    "rootElementOrder",
    "createdAt",
    "updatedAt",
];

/// Apply `event` to `state` in place, stamping `meta.ts` as the time
pub fn apply_event(state: &mut DomainState, event: &DomainEvent) -> Result<(), DomainError> {
    let now = event.meta.ts;
    match event.body()? {
        EventBody::ProjectUpdated(p) => {
            state.project = merge_patch(&state.project, &p.patch, &["id", "createdAt", "updatedAt"])?;
        }

        EventBody::SceneCreated(p) => scene_created(state, p, now),
        EventBody::SceneUpdated(p) => {
            let scene = scene_mut(state, &p.scene_id)?;
            let mut next = merge_patch(&*scene, &p.patch, &["id", "sectionIds"])?;
            next.updated_at = now;
            *scene = next;
        }
        EventBody::SceneRenamed(p) => {
            let scene = scene_mut(state, &p.scene_id)?;
            scene.name = p.name;
            scene.updated_at = now;
        }
        EventBody::SceneDeleted(p) => delete_scene(state, &p.scene_id),
        EventBody::SceneInitialSet(p) => state.story.initial_scene_id = Some(p.scene_id),
        EventBody::SceneReordered(p) => {
            upsert(&mut state.story.scene_order, &p.scene_id, normalize_index(Some(p.index)));
        }

        EventBody::SectionCreated(p) => section_created(state, p, now)?,
        EventBody::SectionRenamed(p) => {
            let section = section_mut(state, &p.section_id)?;
            section.name = p.name;
            section.updated_at = now;
        }
        EventBody::SectionDeleted(p) => delete_section(state, &p.section_id),
        EventBody::SectionReordered(p) => {
            let scene_id = section_mut(state, &p.section_id)?.scene_id.clone();
            let scene = scene_mut(state, &scene_id)?;
            upsert(&mut scene.section_ids, &p.section_id, normalize_index(Some(p.index)));
        }

        EventBody::LineInserted(p) => line_inserted(state, p, now)?,
        EventBody::LineActionsUpdated(p) => {
            let line = line_mut(state, &p.line_id)?;
            if p.replace {
                line.actions = p.patch;
            } else {
                line.actions.extend(p.patch);
            }
            line.updated_at = now;
        }
        EventBody::LineDeleted(p) => delete_line(state, &p.line_id),
        EventBody::LineMoved(p) => {
            let line = line_mut(state, &p.line_id)?;
            let from = std::mem::replace(&mut line.section_id, p.to_section_id.clone());
            if let Some(section) = state.sections.get_mut(&from) {
                remove_from(&mut section.line_ids, &p.line_id);
                repair_initial(&mut section.initial_line_id, &section.line_ids);
            }
            let target = section_mut(state, &p.to_section_id)?;
            insert_at(&mut target.line_ids, &p.line_id, normalize_index(Some(p.index)));
        }

        EventBody::ResourceCreated(p) => {
            let collection = state.resource_collection_mut(&p.resource_type)?;
            let item = Item {
                id: p.resource_id.clone(),
                parent_id: non_empty(p.parent_id),
                created_at: now,
                updated_at: now,
                fields: without(&p.data, &ITEM_RESERVED),
            };
            collection.items.insert(p.resource_id.clone(), item);
            place_item(collection, &p.resource_id, p.index);
        }
        EventBody::ResourceUpdated(p) => {
            let collection = state.resource_collection_mut(&p.resource_type)?;
            update_item(collection, "resource", &p.resource_id, &p.patch, now)?;
        }
        EventBody::ResourceRenamed(p) => {
            let collection = state.resource_collection_mut(&p.resource_type)?;
            let item = item_mut(collection, "resource", &p.resource_id)?;
            item.fields.insert("name".into(), json!(p.name));
            item.updated_at = now;
        }
        EventBody::ResourceMoved(p) => {
            let collection = state.resource_collection_mut(&p.resource_type)?;
            let item = item_mut(collection, "resource", &p.resource_id)?;
            item.parent_id = non_empty(p.parent_id);
            item.updated_at = now;
            place_item(collection, &p.resource_id, Some(p.index));
        }
        EventBody::ResourceDeleted(p) => {
            let collection = state.resource_collection_mut(&p.resource_type)?;
            delete_item(collection, &p.resource_id);
        }
        EventBody::ResourceDuplicated(p) => {
            let collection = state.resource_collection_mut(&p.resource_type)?;
            duplicate_item(collection, &p, now)?;
        }

        EventBody::LayoutCreated(p) => layout_created(state, p, now),
        EventBody::LayoutRenamed(p) => {
            let layout = layout_mut(state, &p.layout_id)?;
            layout.name = p.name;
            layout.updated_at = now;
        }
        EventBody::LayoutDeleted(p) => delete_layout(state, &p.layout_id),
        EventBody::LayoutReordered(p) => layout_reordered(state, p, now)?,
        EventBody::ElementCreated(p) => {
            let layout = layout_mut(state, &p.layout_id)?;
            let parent_id = non_empty(p.parent_id);
            layout.elements.insert(
                p.element_id.clone(),
                LayoutElement {
                    id: p.element_id.clone(),
                    parent_id: parent_id.clone(),
                    children: Vec::new(),
                    fields: without(&p.element, &ELEMENT_RESERVED),
                },
            );
            let siblings = layout.children_mut(parent_id.as_deref())?;
            insert_at(siblings, &p.element_id, normalize_index(p.index));
            layout.updated_at = now;
        }
        EventBody::ElementUpdated(p) => {
            let layout = layout_mut(state, &p.layout_id)?;
            let element = layout
                .elements
                .get_mut(&p.element_id)
                .ok_or_else(|| DomainError::missing("layout element", &p.element_id))?;
            *element = merge_patch(&*element, &p.patch, &ELEMENT_RESERVED)?;
            layout.updated_at = now;
        }
        EventBody::ElementMoved(p) => {
            let layout = layout_mut(state, &p.layout_id)?;
            let element = layout
                .elements
                .get_mut(&p.element_id)
                .ok_or_else(|| DomainError::missing("layout element", &p.element_id))?;
            let next_parent = non_empty(p.parent_id);
            let previous = std::mem::replace(&mut element.parent_id, next_parent.clone());
            remove_from(layout.children_mut(previous.as_deref())?, &p.element_id);
            let siblings = layout.children_mut(next_parent.as_deref())?;
            insert_at(siblings, &p.element_id, normalize_index(Some(p.index)));
            layout.updated_at = now;
        }
        EventBody::ElementDeleted(p) => {
            let layout = layout_mut(state, &p.layout_id)?;
            delete_element(layout, &p.element_id);
            layout.updated_at = now;
        }

        EventBody::VariableCreated(p) => variable_created(state, p, now),
        EventBody::VariableUpdated(p) => {
            let mut patch = p.patch;
            if let Some(default) = patch.get("default").cloned() {
                patch.insert("value".into(), default);
            }
            if let Some(kind) = patch.get("type").cloned() {
                patch.insert("variableType".into(), kind);
            }
            update_item(&mut state.variables, "variable", &p.variable_id, &patch, now)?;
        }
        EventBody::VariableDeleted(p) => delete_item(&mut state.variables, &p.variable_id),
    }

    state.touch(now);
    Ok(())
}

fn scene_mut<'a>(state: &'a mut DomainState, id: &str) -> Result<&'a mut Scene, DomainError> {
    state.scenes.get_mut(id).ok_or_else(|| DomainError::missing("scene", id))
}

fn section_mut<'a>(state: &'a mut DomainState, id: &str) -> Result<&'a mut Section, DomainError> {
    state.sections.get_mut(id).ok_or_else(|| DomainError::missing("section", id))
}

fn line_mut<'a>(state: &'a mut DomainState, id: &str) -> Result<&'a mut Line, DomainError> {
    state.lines.get_mut(id).ok_or_else(|| DomainError::missing("line", id))
}

fn layout_mut<'a>(state: &'a mut DomainState, id: &str) -> Result<&'a mut Layout, DomainError> {
    state.layouts.get_mut(id).ok_or_else(|| DomainError::missing("layout", id))
}

fn item_mut<'a>(
    collection: &'a mut ItemCollection,
    kind: &'static str,
    id: &str,
) -> Result<&'a mut Item, DomainError> {
    collection.items.get_mut(id).ok_or_else(|| DomainError::missing(kind, id))
}

fn non_empty(id: Option<Id>) -> Option<Id> {
    id.filter(|id| !id.is_empty())
}

/// Negative indices clamp to the front
pub(crate) fn normalize_index(index: Option<i64>) -> Option<usize> {
    index.map(|index| index.max(0) as usize)
}

/// Insert at `index`, or append when there is none or it is past the end
pub(crate) fn insert_at(list: &mut Vec<Id>, id: &str, index: Option<usize>) {
    match index {
        Some(index) if index < list.len() => list.insert(index, id.to_string()),
        _ => list.push(id.to_string()),
    }
}

pub(crate) fn remove_from(list: &mut Vec<Id>, id: &str) {
    if let Some(at) = list.iter().position(|entry| entry == id) {
        list.remove(at);
    }
}

fn upsert(list: &mut Vec<Id>, id: &str, index: Option<usize>) {
    remove_from(list, id);
    insert_at(list, id, index);
}

/// Without an index, place `id` before the first entry created after it
/// (ties broken by id); entries without a timestamp count as created at 0
fn insert_stable(list: &mut Vec<Id>, id: &str, index: Option<i64>, created_at: &dyn Fn(&str) -> Option<Timestamp>) {
    if index.is_some() {
        insert_at(list, id, normalize_index(index));
        return;
    }
    remove_from(list, id);
    let key = (created_at(id).unwrap_or(0), id);
    let at = list
        .iter()
        .position(|other| (created_at(other).unwrap_or(0), other.as_str()) > key);
    insert_at(list, id, at);
}

fn repair_initial(initial: &mut Option<Id>, ids: &[Id]) {
    let stale = initial.as_ref().map_or(false, |id| !ids.contains(id));
    if stale {
        *initial = ids.first().cloned();
    }
}

fn scene_created(state: &mut DomainState, p: SceneCreated, now: Timestamp) {
    state.scenes.insert(
        p.scene_id.clone(),
        Scene {
            id: p.scene_id.clone(),
            name: p.name,
            section_ids: Vec::new(),
            initial_section_id: None,
            position: default_scene_position(),
            created_at: now,
            updated_at: now,
            extra: Fields::new(),
        },
    );
    let scenes = &state.scenes;
    insert_stable(&mut state.story.scene_order, &p.scene_id, p.index, &|id| {
        scenes.get(id).map(|scene| scene.created_at)
    });
    if state.story.initial_scene_id.is_none() {
        state.story.initial_scene_id = Some(p.scene_id);
    }
}

fn delete_scene(state: &mut DomainState, scene_id: &str) {
    let Some(scene) = state.scenes.shift_remove(scene_id) else {
        return;
    };
    for section_id in &scene.section_ids {
        if let Some(section) = state.sections.shift_remove(section_id) {
            for line_id in &section.line_ids {
                state.lines.shift_remove(line_id);
            }
        }
    }
    remove_from(&mut state.story.scene_order, scene_id);
    if state.story.initial_scene_id.as_deref() == Some(scene_id) {
        state.story.initial_scene_id = state.story.scene_order.first().cloned();
    }
}

fn section_created(state: &mut DomainState, p: SectionCreated, now: Timestamp) -> Result<(), DomainError> {
    state.sections.insert(
        p.section_id.clone(),
        Section {
            id: p.section_id.clone(),
            scene_id: p.scene_id.clone(),
            name: p.name,
            line_ids: Vec::new(),
            initial_line_id: None,
            created_at: now,
            updated_at: now,
            extra: Fields::new(),
        },
    );
    let scene = state
        .scenes
        .get_mut(&p.scene_id)
        .ok_or_else(|| DomainError::missing("scene", &p.scene_id))?;
    let sections = &state.sections;
    insert_stable(&mut scene.section_ids, &p.section_id, p.index, &|id| {
        sections.get(id).map(|section| section.created_at)
    });
    Ok(())
}

fn delete_section(state: &mut DomainState, section_id: &str) {
    let Some(section) = state.sections.shift_remove(section_id) else {
        return;
    };
    for line_id in &section.line_ids {
        state.lines.shift_remove(line_id);
    }
    if let Some(scene) = state.scenes.get_mut(&section.scene_id) {
        remove_from(&mut scene.section_ids, section_id);
        repair_initial(&mut scene.initial_section_id, &scene.section_ids);
    }
}

fn line_inserted(state: &mut DomainState, p: LineInserted, now: Timestamp) -> Result<(), DomainError> {
    let actions = p.line.get("actions").and_then(Value::as_object).cloned().unwrap_or_default();
    state.lines.insert(
        p.line_id.clone(),
        Line {
            id: p.line_id.clone(),
            section_id: p.section_id.clone(),
            actions,
            created_at: now,
            updated_at: now,
            extra: Fields::new(),
        },
    );

    let section = state
        .sections
        .get_mut(&p.section_id)
        .ok_or_else(|| DomainError::missing("section", &p.section_id))?;
    match non_empty(p.after_line_id) {
        Some(after) => {
            let at = section.line_ids.iter().position(|id| *id == after).map(|at| at + 1);
            insert_at(&mut section.line_ids, &p.line_id, at);
        }
        None => {
            let lines = &state.lines;
            insert_stable(&mut section.line_ids, &p.line_id, None, &|id| {
                lines.get(id).map(|line| line.created_at)
            });
        }
    }
    Ok(())
}

fn delete_line(state: &mut DomainState, line_id: &str) {
    let Some(line) = state.lines.shift_remove(line_id) else {
        return;
    };
    if let Some(section) = state.sections.get_mut(&line.section_id) {
        remove_from(&mut section.line_ids, line_id);
        repair_initial(&mut section.initial_line_id, &section.line_ids);
    }
}

/// Position `id` in the flat order at sibling `index` among the items
/// sharing its parent; no index places it by creation time
fn place_item(collection: &mut ItemCollection, id: &str, index: Option<i64>) {
    remove_from(&mut collection.order, id);
    let Some(index) = normalize_index(index) else {
        let items = &collection.items;
        insert_stable(&mut collection.order, id, None, &|other| {
            items.get(other).map(|item| item.created_at)
        });
        return;
    };

    let parent = collection.items.get(id).and_then(|item| item.parent_id.clone());
    let siblings = collection.siblings(parent.as_deref());
    let at = siblings
        .get(index)
        .and_then(|sibling| collection.order.iter().position(|entry| entry == sibling));
    insert_at(&mut collection.order, id, at);
}

fn update_item(
    collection: &mut ItemCollection,
    kind: &'static str,
    id: &str,
    patch: &Fields,
    now: Timestamp,
) -> Result<(), DomainError> {
    let item = item_mut(collection, kind, id)?;
    let mut next = merge_patch(&*item, patch, &["id"])?;
    next.updated_at = now;
    *item = next;
    Ok(())
}

fn delete_item(collection: &mut ItemCollection, id: &str) {
    if !collection.items.contains_key(id) {
        return;
    }
    for doomed in collection.subtree(id) {
        remove_from(&mut collection.order, &doomed);
        collection.items.shift_remove(&doomed);
    }
}

fn duplicate_item(collection: &mut ItemCollection, p: &ResourceDuplicated, now: Timestamp) -> Result<(), DomainError> {
    let source = collection
        .items
        .get(&p.source_id)
        .ok_or_else(|| DomainError::missing("resource", &p.source_id))?;
    let mut copy = source.clone();
    let name = source.name().filter(|name| !name.is_empty()).unwrap_or("Resource");
    copy.fields.insert("name".into(), json!(format!("{} Copy", name)));
    copy.id = p.new_id.clone();
    copy.created_at = now;
    copy.updated_at = now;
    collection.items.insert(p.new_id.clone(), copy);

    if p.index.is_some() {
        place_item(collection, &p.new_id, p.index);
        return Ok(());
    }
    remove_from(&mut collection.order, &p.new_id);
    let at = collection
        .order
        .iter()
        .position(|entry| *entry == p.source_id)
        .map(|at| at + 1);
    insert_at(&mut collection.order, &p.new_id, at);
    Ok(())
}

fn layout_created(state: &mut DomainState, p: LayoutCreated, now: Timestamp) {
    let extra = without(&p.data, &LAYOUT_RESERVED);
    let kind = extra
        .get("type")
        .and_then(Value::as_str)
        .filter(|kind| !kind.is_empty())
        .unwrap_or("layout")
        .to_string();
    let mut extra = extra;
    extra.remove("type");

    let (elements, root_element_order) = elements_from_collection(p.elements.as_ref());
    let parent_id = non_empty(p.parent_id);
    state.layouts.insert(
        p.layout_id.clone(),
        Layout {
            id: p.layout_id.clone(),
            kind,
            name: p.name,
            layout_type: Some(p.layout_type),
            parent_id: parent_id.clone(),
            elements,
            root_element_order,
            created_at: now,
            updated_at: now,
            extra,
        },
    );
    place_layout_node(state, OrderNode::leaf(p.layout_id), parent_id.as_deref(), p.index);
}

/// Insert `node` under `parent` in the layout tree at a sibling index;
/// a parent the tree does not hold puts the node at the top level
fn place_layout_node(state: &mut DomainState, node: OrderNode, parent: Option<&str>, index: Option<i64>) {
    let parent = match parent {
        Some(id) if forest::contains(&state.layout_tree, id) => ParentRef::from(id),
        _ => ParentRef::Root,
    };
    let Some(siblings) = forest::children_mut(&mut state.layout_tree, &parent) else {
        state.layout_tree.push(node);
        return;
    };
    match normalize_index(index) {
        Some(at) if at < siblings.len() => siblings.insert(at, node),
        _ => siblings.push(node),
    }
}

fn layout_reordered(state: &mut DomainState, p: LayoutReordered, now: Timestamp) -> Result<(), DomainError> {
    let parent_id = non_empty(p.parent_id);
    let layout = layout_mut(state, &p.layout_id)?;
    layout.parent_id = parent_id.clone();
    layout.updated_at = now;

    let node = forest::detach(&mut state.layout_tree, &p.layout_id).unwrap_or_else(|| OrderNode::leaf(&p.layout_id));
    place_layout_node(state, node, parent_id.as_deref(), p.index);
    Ok(())
}

fn delete_layout(state: &mut DomainState, layout_id: &str) {
    let mut doomed = vec![layout_id.to_string()];
    let mut cursor = 0;
    while cursor < doomed.len() {
        let current = doomed[cursor].clone();
        for (id, layout) in &state.layouts {
            if layout.parent_id.as_deref() == Some(current.as_str()) && !doomed.contains(id) {
                doomed.push(id.clone());
            }
        }
        cursor += 1;
    }
    if let Some(node) = forest::detach(&mut state.layout_tree, layout_id) {
        for id in node.subtree_ids() {
            if !doomed.contains(&id) {
                doomed.push(id);
            }
        }
    }
    let doomed: HashSet<String> = doomed.into_iter().collect();
    forest::retain(&mut state.layout_tree, &|id| !doomed.contains(id));
    state.layouts.retain(|id, _| !doomed.contains(id));
}

fn delete_element(layout: &mut Layout, element_id: &str) {
    let mut stack = vec![element_id.to_string()];
    while let Some(id) = stack.pop() {
        if let Some(element) = layout.elements.shift_remove(&id) {
            stack.extend(element.children);
        }
    }
    let live: HashSet<String> = layout.elements.keys().cloned().collect();
    for element in layout.elements.values_mut() {
        element.children.retain(|id| live.contains(id));
    }
    layout.root_element_order.retain(|id| live.contains(id));
}

/// Elements out of a stored `{items, order}` collection: tree placement
/// wins, a stored `parentId` covers ids the tree misses
fn elements_from_collection(value: Option<&Value>) -> (IndexMap<Id, LayoutElement>, Vec<Id>) {
    let source = StoredCollection::read(value);
    let links = source.tree_links();

    let mut all: Vec<Id> = links.ordered.clone();
    for id in source.ids() {
        if !all.contains(&id) {
            all.push(id);
        }
    }

    let empty = Map::new();
    let mut elements: IndexMap<Id, LayoutElement> = all
        .iter()
        .map(|id| {
            let data = source.get(id).unwrap_or(&empty);
            let parent = if links.is_placed(id) {
                links.parent(id).map(str::to_string)
            } else {
                data.get("parentId").and_then(Value::as_str).map(str::to_string)
            };
            let element = LayoutElement {
                id: id.clone(),
                parent_id: parent.filter(|parent| !parent.is_empty() && parent != id),
                children: Vec::new(),
                fields: without(data, &ELEMENT_RESERVED),
            };
            (id.clone(), element)
        })
        .collect();

    for id in &all {
        let Some(parent) = elements.get(id).and_then(|element| element.parent_id.clone()) else {
            continue;
        };
        match elements.get_mut(&parent) {
            Some(parent) => parent.children.push(id.clone()),
            None => {
                if let Some(element) = elements.get_mut(id) {
                    element.parent_id = None;
                }
            }
        }
    }

    let root_element_order = all
        .iter()
        .filter(|id| elements.get(id.as_str()).map_or(false, |element| element.parent_id.is_none()))
        .cloned()
        .collect();
    (elements, root_element_order)
}

fn variable_created(state: &mut DomainState, p: VariableCreated, now: Timestamp) {
    let mut fields = Fields::new();
    fields.insert("name".into(), json!(p.name));
    fields.insert("itemType".into(), json!("variable"));
    fields.insert("type".into(), json!(p.variable_type));
    fields.insert("variableType".into(), json!(p.variable_type));
    fields.insert("default".into(), p.initial_value.clone());
    fields.insert("value".into(), p.initial_value);
    fields.extend(without(&p.data, &ITEM_RESERVED));

    let item = Item {
        id: p.variable_id.clone(),
        parent_id: non_empty(p.parent_id),
        created_at: now,
        updated_at: now,
        fields,
    };
    state.variables.items.insert(p.variable_id.clone(), item);
    place_item(&mut state.variables, &p.variable_id, p.index);
}
