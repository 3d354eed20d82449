//! # Collection-Scoped Edits
//!
//! Names a hierarchy collection inside the stored document and edits it
//! through journaled tree actions.
//!
//! ```text
//! CollectionTarget::Lines { section_id: "x1" }
//!     │ resolve(state)
//!     ▼
//! scenes.items.<scene>.sections.items.x1.lines
//!     │ insert / delete / update / move / duplicate
//!     ▼
//! Action::{Insert, Delete, ...} ──▶ ProjectRepository::add_event
//! ```

use serde_json::Value;
use tessera_domain::constants::is_resource_type;
use tessera_hierarchy::{forest, resolve_index, Hierarchy, ItemData, ParentRef, Position};
use tessera_journal::{Action, StatePath};

use crate::errors::EditorError;
use crate::repository::ProjectRepository;
use crate::store::EventStore;

/// A hierarchy collection in the stored document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionTarget {
    /// One of the resource-type collections, e.g. `images`
    Resource(String),
    Scenes,
    Layouts,
    Variables,
    /// Sections of one scene
    Sections { scene_id: String },
    /// Lines of one section, wherever its scene is
    Lines { section_id: String },
    /// Elements of one layout
    Elements { layout_id: String },
    Path(StatePath),
}

impl CollectionTarget {
    /// Dotted path of the collection in `state`
    pub fn resolve(&self, state: &Value) -> Result<StatePath, EditorError> {
        let path = match self {
            CollectionTarget::Resource(kind) if is_resource_type(kind) => StatePath::from_segments([kind.as_str()])?,
            CollectionTarget::Resource(kind) => return Err(EditorError::UnknownCollection(kind.clone())),
            CollectionTarget::Scenes => StatePath::from_segments(["scenes"])?,
            CollectionTarget::Layouts => StatePath::from_segments(["layouts"])?,
            CollectionTarget::Variables => StatePath::from_segments(["variables"])?,
            CollectionTarget::Sections { scene_id } => {
                if state["scenes"]["items"].get(scene_id.as_str()).is_none() {
                    return Err(EditorError::UnknownCollection(format!("scene {}", scene_id)));
                }
                StatePath::from_segments(["scenes", "items", scene_id.as_str(), "sections"])?
            }
            CollectionTarget::Lines { section_id } => {
                let scene_id = scene_of_section(state, section_id)
                    .ok_or_else(|| EditorError::UnknownCollection(format!("section {}", section_id)))?;
                StatePath::from_segments([
                    "scenes",
                    "items",
                    scene_id,
                    "sections",
                    "items",
                    section_id.as_str(),
                    "lines",
                ])?
            }
            CollectionTarget::Elements { layout_id } => {
                if state["layouts"]["items"].get(layout_id.as_str()).is_none() {
                    return Err(EditorError::UnknownCollection(format!("layout {}", layout_id)));
                }
                StatePath::from_segments(["layouts", "items", layout_id.as_str(), "elements"])?
            }
            CollectionTarget::Path(path) => path.clone(),
        };
        Ok(path)
    }
}

fn scene_of_section<'a>(state: &'a Value, section_id: &str) -> Option<&'a str> {
    state["scenes"]["items"]
        .as_object()?
        .iter()
        .find(|(_, scene)| scene["sections"]["items"].get(section_id).is_some())
        .map(|(scene_id, _)| scene_id.as_str())
}

/// Edits on one collection of a repository
pub struct Collection<'a, S: EventStore> {
    repository: &'a mut ProjectRepository<S>,
    path: StatePath,
}

impl<'a, S: EventStore> Collection<'a, S> {
    pub(crate) fn new(repository: &'a mut ProjectRepository<S>, path: StatePath) -> Self {
        Self { repository, path }
    }

    pub fn path(&self) -> &StatePath {
        &self.path
    }

    /// Current contents; an absent collection reads as empty
    pub fn read(&self) -> Result<Hierarchy, EditorError> {
        match self.path.get_opt(self.repository.state()) {
            Some(value) => Ok(Hierarchy::from_value(value)?),
            None => Ok(Hierarchy::new()),
        }
    }

    /// Index `position` resolves to among the children of `parent`,
    /// not counting `moving`
    pub fn sibling_index(&self, parent: &ParentRef, position: &Position, moving: Option<&str>) -> Result<usize, EditorError> {
        let collection = self.read()?;
        let siblings: Vec<&str> = forest::children(collection.order(), parent)
            .map(|nodes| nodes.iter().map(|node| node.id.as_str()).collect())
            .unwrap_or_default();
        Ok(resolve_index(&siblings, position, moving))
    }

    pub fn insert(&mut self, id: &str, data: ItemData, parent: ParentRef, position: Position) -> Result<&Value, EditorError> {
        self.record(Action::insert(self.path.clone(), id, data, parent, position))
    }

    pub fn delete(&mut self, id: &str) -> Result<&Value, EditorError> {
        self.record(Action::delete(self.path.clone(), id))
    }

    pub fn update(&mut self, id: &str, data: ItemData, replace: bool) -> Result<&Value, EditorError> {
        self.record(Action::update(self.path.clone(), id, data, replace))
    }

    pub fn move_node(&mut self, id: &str, parent: ParentRef, position: Position) -> Result<&Value, EditorError> {
        self.record(Action::move_node(self.path.clone(), id, parent, position))
    }

    /// Copy `id` and its subtree with ids derived from `seed`
    pub fn duplicate(&mut self, id: &str, seed: &str) -> Result<&Value, EditorError> {
        self.record(Action::duplicate(self.path.clone(), id, seed))
    }

    fn record(&mut self, action: Action) -> Result<&Value, EditorError> {
        self.repository.add_event(action.into())?;
        Ok(self.repository.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use crate::store::MemoryStore;
    use serde_json::json;
    use tessera_domain::{Actor, Command};

    fn repository() -> ProjectRepository<MemoryStore> {
        ProjectRepository::open("p1", MemoryStore::new(), RepositoryConfig::default()).unwrap()
    }

    fn data(value: Value) -> ItemData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_resolve_targets() {
        let state = json!({
            "scenes": {"items": {"s1": {"sections": {"items": {"x1": {}}, "order": []}}}, "order": []},
            "layouts": {"items": {"L": {}}, "order": []}
        });
        let resolve = |target: CollectionTarget| target.resolve(&state).map(|path| path.to_string());

        assert_eq!(resolve(CollectionTarget::Resource("images".into())).unwrap(), "images");
        assert_eq!(resolve(CollectionTarget::Sections { scene_id: "s1".into() }).unwrap(), "scenes.items.s1.sections");
        assert_eq!(
            resolve(CollectionTarget::Lines { section_id: "x1".into() }).unwrap(),
            "scenes.items.s1.sections.items.x1.lines"
        );
        assert_eq!(resolve(CollectionTarget::Elements { layout_id: "L".into() }).unwrap(), "layouts.items.L.elements");
        assert_eq!(
            resolve(CollectionTarget::Resource("gifs".into())),
            Err(EditorError::UnknownCollection("gifs".into()))
        );
        assert!(resolve(CollectionTarget::Lines { section_id: "nope".into() }).is_err());
    }

    #[test]
    fn test_tree_edits_are_journaled() {
        let mut repo = repository();
        let target = CollectionTarget::Resource("images".into());
        {
            let mut images = repo.collection(&target).unwrap();
            images.insert("a", data(json!({"name": "A"})), ParentRef::Root, Position::Last).unwrap();
            images.insert("b", data(json!({"name": "B"})), ParentRef::from("a"), Position::Last).unwrap();
            let state = images.move_node("b", ParentRef::Root, Position::First).unwrap();
            assert_eq!(
                state["images"]["order"],
                json!([{"id": "b", "children": []}, {"id": "a", "children": []}])
            );
            images.delete("a").unwrap();
        }
        assert_eq!(repo.len(), 4);
        assert_eq!(repo.state()["images"]["items"], json!({"b": {"name": "B"}}));
        assert!(repo.events().iter().all(|event| event.kind() != "typedCommand"));
    }

    #[test]
    fn test_sibling_index_ignores_moving_node() {
        let mut repo = repository();
        let mut scenes = repo.collection(&CollectionTarget::Scenes).unwrap();
        for id in ["a", "b", "c"] {
            scenes.insert(id, data(json!({"type": "folder"})), ParentRef::Root, Position::Last).unwrap();
        }
        let index = scenes
            .sibling_index(&ParentRef::Root, &Position::After("c".into()), Some("a"))
            .unwrap();
        assert_eq!(index, 2);
        assert_eq!(scenes.sibling_index(&ParentRef::from("a"), &Position::Last, None).unwrap(), 0);
    }

    #[test]
    fn test_lines_collection_follows_typed_commands() {
        let mut repo = repository();
        for (kind, payload) in [
            ("scene.create", json!({"sceneId": "s1", "name": "S"})),
            ("section.create", json!({"sectionId": "x1", "sceneId": "s1", "name": "X"})),
            ("line.insert_after", json!({"lineId": "l1", "sectionId": "x1", "line": {}})),
        ] {
            repo.apply_command(Command::new("p1", kind, payload, Actor::new("u", "c")).with_client_ts(1))
                .unwrap();
        }
        let lines = repo.collection(&CollectionTarget::Lines { section_id: "x1".into() }).unwrap();
        assert_eq!(lines.read().unwrap().ids(), vec!["l1"]);
    }
}
