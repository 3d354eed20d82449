//! Versions, resource types, partition scopes and command type names.

/// Storage and domain model version this crate reads and writes
pub const MODEL_VERSION: u64 = 2;

/// Envelope version every command must carry
pub const COMMAND_VERSION: u64 = 1;

pub const PROTOCOL_VERSION: &str = "1.0";

/// Resource collections, each stored as a top-level hierarchy collection
pub const RESOURCE_TYPES: [&str; 10] = [
    "images",
    "tweens",
    "videos",
    "sounds",
    "characters",
    "fonts",
    "transforms",
    "colors",
    "typography",
    "components",
];

pub fn is_resource_type(name: &str) -> bool {
    RESOURCE_TYPES.contains(&name)
}

/// Partition scopes a command can be attributed to
pub mod partitions {
    pub const STORY: &str = "story";
    pub const RESOURCES: &str = "resources";
    pub const LAYOUTS: &str = "layouts";
    pub const SETTINGS: &str = "settings";
}

pub mod command_types {
    pub const PROJECT_UPDATE: &str = "project.update";

    pub const SCENE_CREATE: &str = "scene.create";
    pub const SCENE_UPDATE: &str = "scene.update";
    pub const SCENE_RENAME: &str = "scene.rename";
    pub const SCENE_DELETE: &str = "scene.delete";
    pub const SCENE_SET_INITIAL: &str = "scene.set_initial";
    pub const SCENE_REORDER: &str = "scene.reorder";

    pub const SECTION_CREATE: &str = "section.create";
    pub const SECTION_RENAME: &str = "section.rename";
    pub const SECTION_DELETE: &str = "section.delete";
    pub const SECTION_REORDER: &str = "section.reorder";

    pub const LINE_INSERT_AFTER: &str = "line.insert_after";
    pub const LINE_UPDATE_ACTIONS: &str = "line.update_actions";
    pub const LINE_DELETE: &str = "line.delete";
    pub const LINE_MOVE: &str = "line.move";

    pub const RESOURCE_CREATE: &str = "resource.create";
    pub const RESOURCE_UPDATE: &str = "resource.update";
    pub const RESOURCE_RENAME: &str = "resource.rename";
    pub const RESOURCE_MOVE: &str = "resource.move";
    pub const RESOURCE_DELETE: &str = "resource.delete";
    pub const RESOURCE_DUPLICATE: &str = "resource.duplicate";

    pub const LAYOUT_CREATE: &str = "layout.create";
    pub const LAYOUT_RENAME: &str = "layout.rename";
    pub const LAYOUT_DELETE: &str = "layout.delete";
    pub const LAYOUT_REORDER: &str = "layout.reorder";
    pub const LAYOUT_ELEMENT_CREATE: &str = "layout.element.create";
    pub const LAYOUT_ELEMENT_UPDATE: &str = "layout.element.update";
    pub const LAYOUT_ELEMENT_MOVE: &str = "layout.element.move";
    pub const LAYOUT_ELEMENT_DELETE: &str = "layout.element.delete";

    pub const VARIABLE_CREATE: &str = "variable.create";
    pub const VARIABLE_UPDATE: &str = "variable.update";
    pub const VARIABLE_DELETE: &str = "variable.delete";

    pub const ALL: [&str; 32] = [
        PROJECT_UPDATE,
        SCENE_CREATE,
        SCENE_UPDATE,
        SCENE_RENAME,
        SCENE_DELETE,
        SCENE_SET_INITIAL,
        SCENE_REORDER,
        SECTION_CREATE,
        SECTION_RENAME,
        SECTION_DELETE,
        SECTION_REORDER,
        LINE_INSERT_AFTER,
        LINE_UPDATE_ACTIONS,
        LINE_DELETE,
        LINE_MOVE,
        RESOURCE_CREATE,
        RESOURCE_UPDATE,
        RESOURCE_RENAME,
        RESOURCE_MOVE,
        RESOURCE_DELETE,
        RESOURCE_DUPLICATE,
        LAYOUT_CREATE,
        LAYOUT_RENAME,
        LAYOUT_DELETE,
        LAYOUT_REORDER,
        LAYOUT_ELEMENT_CREATE,
        LAYOUT_ELEMENT_UPDATE,
        LAYOUT_ELEMENT_MOVE,
        LAYOUT_ELEMENT_DELETE,
        VARIABLE_CREATE,
        VARIABLE_UPDATE,
        VARIABLE_DELETE,
    ];
}
