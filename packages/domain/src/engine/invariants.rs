//! Whole-state consistency checks run after every reduced command.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tessera_hierarchy::{forest, OrderNode};

use crate::constants::{is_resource_type, MODEL_VERSION, RESOURCE_TYPES};
use crate::error::DomainError;
use crate::model::{DomainState, ItemCollection, Layout};

const NUMERIC_ELEMENT_KEYS: [&str; 6] = ["x", "y", "width", "height", "rotation", "opacity"];

fn fail<T>(message: String) -> Result<T, DomainError> {
    Err(DomainError::Invariant(message))
}

fn ensure_unique(ids: &[String], label: &str) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    match ids.iter().find(|id| !seen.insert(id.as_str())) {
        Some(id) => fail(format!("Duplicate ids in {}: {}", label, id)),
        None => Ok(()),
    }
}

/// Fail with the first broken invariant of `state`
pub fn assert_domain_invariants(state: &DomainState) -> Result<(), DomainError> {
    if state.model_version != MODEL_VERSION {
        return Err(DomainError::UnsupportedModelVersion {
            expected: MODEL_VERSION,
            found: state.model_version.to_string(),
        });
    }
    if state.project.id.is_empty() {
        return fail("Missing project id".into());
    }

    for kind in RESOURCE_TYPES {
        if !state.resources.contains_key(kind) {
            return fail(format!("Missing resource collection: {}", kind));
        }
    }
    if let Some(kind) = state.resources.keys().find(|kind| !is_resource_type(kind)) {
        return fail(format!("Unknown resource collection: {}", kind));
    }

    check_story(state)?;
    for (kind, collection) in &state.resources {
        check_items(collection, &format!("resources.{}", kind))?;
    }
    check_items(&state.variables, "variables")?;
    check_line_references(state)?;
    check_layout_tree(state)?;
    for layout in state.layouts.values() {
        check_layout(layout)?;
    }
    Ok(())
}

fn check_story(state: &DomainState) -> Result<(), DomainError> {
    ensure_unique(&state.story.scene_order, "story.sceneOrder")?;
    if let Some(initial) = &state.story.initial_scene_id {
        if !state.scenes.contains_key(initial) {
            return fail(format!("initialSceneId does not exist: {}", initial));
        }
    }
    if let Some(missing) = state.story.scene_order.iter().find(|id| !state.scenes.contains_key(*id)) {
        return fail(format!("sceneOrder contains missing scene: {}", missing));
    }

    for scene in state.scenes.values() {
        ensure_unique(&scene.section_ids, &format!("scene({}).sectionIds", scene.id))?;
        for section_id in &scene.section_ids {
            let Some(section) = state.sections.get(section_id) else {
                return fail(format!("Scene references missing section: {} -> {}", scene.id, section_id));
            };
            if section.scene_id != scene.id {
                return fail(format!(
                    "Section parent mismatch: {} listed by {} but belongs to {}",
                    section_id, scene.id, section.scene_id
                ));
            }
        }
    }

    for section in state.sections.values() {
        let Some(scene) = state.scenes.get(&section.scene_id) else {
            return fail(format!(
                "Section references missing parent scene: {} -> {}",
                section.id, section.scene_id
            ));
        };
        if !scene.section_ids.contains(&section.id) {
            return fail(format!(
                "Section parent does not include section id: {} in {}",
                section.id, section.scene_id
            ));
        }
        ensure_unique(&section.line_ids, &format!("section({}).lineIds", section.id))?;
        for line_id in &section.line_ids {
            let Some(line) = state.lines.get(line_id) else {
                return fail(format!("Section references missing line: {} -> {}", section.id, line_id));
            };
            if line.section_id != section.id {
                return fail(format!(
                    "Line parent mismatch: {} listed by {} but belongs to {}",
                    line_id, section.id, line.section_id
                ));
            }
        }
    }

    for line in state.lines.values() {
        let Some(section) = state.sections.get(&line.section_id) else {
            return fail(format!(
                "Line references missing parent section: {} -> {}",
                line.id, line.section_id
            ));
        };
        if !section.line_ids.contains(&line.id) {
            return fail(format!(
                "Line parent does not include line id: {} in {}",
                line.id, line.section_id
            ));
        }
    }
    Ok(())
}

fn check_items(collection: &ItemCollection, label: &str) -> Result<(), DomainError> {
    ensure_unique(&collection.order, &format!("{}.order", label))?;
    if let Some(missing) = collection.order.iter().find(|id| !collection.items.contains_key(*id)) {
        return fail(format!("{} order references missing item: {}", label, missing));
    }
    if let Some(unordered) = collection.items.keys().find(|id| !collection.order.contains(*id)) {
        return fail(format!("{} item missing from order: {}", label, unordered));
    }
    Ok(())
}

/// Either `actions.<key>` or the nested `actions.actions.<key>`
fn action<'a>(actions: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a Value> {
    actions
        .get(key)
        .or_else(|| actions.get("actions").and_then(|nested| nested.get(key)))
}

fn check_line_references(state: &DomainState) -> Result<(), DomainError> {
    for line in state.lines.values() {
        let scene_ref = action(&line.actions, "sectionTransition")
            .and_then(|transition| transition.get("sceneId"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty());
        if let Some(scene_id) = scene_ref {
            if !state.scenes.contains_key(scene_id) {
                return fail(format!("Line references missing scene: {} -> {}", line.id, scene_id));
            }
        }

        if let Some(background) = action(&line.actions, "background") {
            let is_layout = background.get("resourceType").and_then(Value::as_str) == Some("layout");
            let layout_id = background
                .get("resourceId")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty());
            if let (true, Some(layout_id)) = (is_layout, layout_id) {
                if !state.layouts.contains_key(layout_id) {
                    return fail(format!("Line references missing layout: {} -> {}", line.id, layout_id));
                }
            }
        }
    }
    Ok(())
}

fn count_nodes(nodes: &[OrderNode]) -> usize {
    nodes.iter().map(|node| 1 + count_nodes(&node.children)).sum()
}

fn check_layout_tree(state: &DomainState) -> Result<(), DomainError> {
    let placed = forest::preorder_ids(&state.layout_tree);
    if placed.len() != count_nodes(&state.layout_tree) {
        return fail("Duplicate ids in layoutTree".into());
    }
    match placed.iter().find(|id| !state.layouts.contains_key(*id)) {
        Some(missing) => fail(format!("Layout tree references missing layout: {}", missing)),
        None => Ok(()),
    }
}

fn check_layout(layout: &Layout) -> Result<(), DomainError> {
    let id = &layout.id;
    ensure_unique(&layout.root_element_order, &format!("layout({}).rootElementOrder", id))?;

    let mut placements: HashMap<&str, usize> = HashMap::new();
    for root in &layout.root_element_order {
        if !layout.elements.contains_key(root) {
            return fail(format!("Layout root references missing element: {} -> {}", id, root));
        }
        *placements.entry(root.as_str()).or_default() += 1;
    }

    for element in layout.elements.values() {
        ensure_unique(
            &element.children,
            &format!("layout({}).element({}).children", id, element.id),
        )?;

        if let Some(parent_id) = &element.parent_id {
            let Some(parent) = layout.elements.get(parent_id) else {
                return fail(format!(
                    "Layout element references missing parent: {}/{} -> {}",
                    id, element.id, parent_id
                ));
            };
            if !parent.children.contains(&element.id) {
                return fail(format!(
                    "Layout parent does not reference child: {}/{} -> {}",
                    id, element.id, parent_id
                ));
            }
        }

        for child_id in &element.children {
            let Some(child) = layout.elements.get(child_id) else {
                return fail(format!(
                    "Layout element references missing child: {}/{} -> {}",
                    id, element.id, child_id
                ));
            };
            if child.parent_id.as_deref() != Some(element.id.as_str()) {
                return fail(format!(
                    "Layout child parent mismatch: {}/{} -> {}",
                    id, element.id, child_id
                ));
            }
            *placements.entry(child_id.as_str()).or_default() += 1;
        }

        for key in NUMERIC_ELEMENT_KEYS {
            if let Some(value) = element.fields.get(key) {
                if !value.as_f64().map_or(false, f64::is_finite) {
                    return fail(format!(
                        "Invalid numeric layout property: {}/{}.{} = {}",
                        id, element.id, key, value
                    ));
                }
            }
        }
        if let Some(opacity) = element.fields.get("opacity").and_then(Value::as_f64) {
            if !(0.0..=1.0).contains(&opacity) {
                return fail(format!(
                    "Layout opacity out of range: {}/{} = {}",
                    id, element.id, opacity
                ));
            }
        }
    }

    for element_id in layout.elements.keys() {
        let count = placements.get(element_id.as_str()).copied().unwrap_or(0);
        if count != 1 {
            return fail(format!(
                "Layout element must appear exactly once in tree: {}/{} appears {} times",
                id, element_id, count
            ));
        }
    }

    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();
    for root in &layout.root_element_order {
        walk_elements(layout, root, &mut visiting, &mut visited)?;
    }
    if visited.len() != layout.elements.len() {
        let unreachable: Vec<&str> = layout
            .elements
            .keys()
            .filter(|element| !visited.contains(element.as_str()))
            .map(String::as_str)
            .collect();
        return fail(format!(
            "Layout has unreachable elements: {}: {}",
            id,
            unreachable.join(", ")
        ));
    }
    Ok(())
}

fn walk_elements<'a>(
    layout: &'a Layout,
    id: &'a str,
    visiting: &mut HashSet<&'a str>,
    visited: &mut HashSet<&'a str>,
) -> Result<(), DomainError> {
    if visiting.contains(id) {
        return fail(format!("Layout cycle detected: {} at {}", layout.id, id));
    }
    if visited.contains(id) {
        return Ok(());
    }
    let Some(element) = layout.elements.get(id) else {
        return fail(format!("Layout traversal missing element: {}/{}", layout.id, id));
    };

    visiting.insert(id);
    for child in &element.children {
        walk_elements(layout, child, visiting, visited)?;
    }
    visiting.remove(id);
    visited.insert(id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fields, LayoutElement};
    use indexmap::IndexMap;
    use serde_json::json;

    fn layout_with(elements: Vec<(&str, Option<&str>, Vec<&str>, Value)>, roots: Vec<&str>) -> Layout {
        let elements: IndexMap<String, LayoutElement> = elements
            .into_iter()
            .map(|(id, parent, children, fields)| {
                let element = LayoutElement {
                    id: id.into(),
                    parent_id: parent.map(str::to_string),
                    children: children.into_iter().map(str::to_string).collect(),
                    fields: fields.as_object().cloned().unwrap_or_default(),
                };
                (id.to_string(), element)
            })
            .collect();
        Layout {
            id: "L".into(),
            kind: "layout".into(),
            name: "L".into(),
            layout_type: Some("normal".into()),
            parent_id: None,
            elements,
            root_element_order: roots.into_iter().map(str::to_string).collect(),
            created_at: 0,
            updated_at: 0,
            extra: Fields::new(),
        }
    }

    fn message(result: Result<(), DomainError>) -> String {
        match result {
            Err(DomainError::Invariant(message)) => message,
            other => panic!("expected invariant failure, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_state_is_consistent() {
        assert_eq!(assert_domain_invariants(&DomainState::empty("p1", 0)), Ok(()));
    }

    #[test]
    fn test_unknown_and_missing_collections() {
        let mut state = DomainState::empty("p1", 0);
        state.resources.shift_remove("fonts");
        assert_eq!(message(assert_domain_invariants(&state)), "Missing resource collection: fonts");

        let mut state = DomainState::empty("p1", 0);
        state.resources.insert("gifs".into(), ItemCollection::default());
        assert_eq!(message(assert_domain_invariants(&state)), "Unknown resource collection: gifs");
    }

    #[test]
    fn test_layout_element_rules() {
        let good = layout_with(
            vec![("a", None, vec!["b"], json!({"opacity": 0.5})), ("b", Some("a"), vec![], json!({"x": 3}))],
            vec!["a"],
        );
        assert_eq!(check_layout(&good), Ok(()));

        let orphan = layout_with(vec![("a", None, vec![], json!({}))], vec![]);
        assert_eq!(
            message(check_layout(&orphan)),
            "Layout element must appear exactly once in tree: L/a appears 0 times"
        );

        let faded = layout_with(vec![("a", None, vec![], json!({"opacity": 1.5}))], vec!["a"]);
        assert_eq!(message(check_layout(&faded)), "Layout opacity out of range: L/a = 1.5");

        let text_x = layout_with(vec![("a", None, vec![], json!({"x": "10"}))], vec!["a"]);
        assert!(message(check_layout(&text_x)).starts_with("Invalid numeric layout property"));

        let mismatch = layout_with(
            vec![("a", None, vec!["b"], json!({})), ("b", None, vec![], json!({}))],
            vec!["a", "b"],
        );
        assert_eq!(message(check_layout(&mismatch)), "Layout child parent mismatch: L/a -> b");
    }

    #[test]
    fn test_layout_tree_must_reference_layouts() {
        let mut state = DomainState::empty("p1", 0);
        state.layout_tree = vec![OrderNode::leaf("ghost")];
        assert_eq!(
            message(assert_domain_invariants(&state)),
            "Layout tree references missing layout: ghost"
        );
    }
}
