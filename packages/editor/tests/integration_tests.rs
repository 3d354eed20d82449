//! Integration tests for the editor crate

use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use tessera_domain::{check_round_trip, initial_storage_state, Actor, Command, ProjectionContext};
use tessera_editor::{
    CollectionTarget, EditSession, EditorError, EventStore, JsonlStore, MemoryStore, ProjectRepository,
    RepositoryConfig, RepositoryEvent, StoreError,
};
use tessera_hierarchy::{ParentRef, Position};
use tessera_journal::{Action, StatePath};

fn command(kind: &str, payload: Value, ts: i64) -> Command {
    Command::new("p1", kind, payload, Actor::new("u1", "c1")).with_client_ts(ts)
}

fn order_ids(order: &Value) -> Vec<String> {
    fn walk(nodes: &Value, out: &mut Vec<String>) {
        for node in nodes.as_array().into_iter().flatten() {
            if let Some(id) = node["id"].as_str() {
                out.push(id.to_string());
            }
            walk(&node["children"], out);
        }
    }
    let mut out = Vec::new();
    walk(order, &mut out);
    out
}

#[test]
fn test_jsonl_repository_survives_reopen() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("p1").join("events.jsonl");

    let state = {
        let mut repo = ProjectRepository::open("p1", JsonlStore::open(&path), RepositoryConfig::default())?;
        repo.apply_command(command("scene.create", json!({"sceneId": "s1", "name": "Intro"}), 10))?;
        repo.apply_command(command("section.create", json!({"sectionId": "x1", "sceneId": "s1", "name": "Main"}), 20))?;
        repo.apply_command(command(
            "line.insert_after",
            json!({"lineId": "l1", "sectionId": "x1", "line": {"actions": {"dialogue": {"text": "hi"}}}}),
            30,
        ))?;
        repo.add_event(Action::set(StatePath::parse("project.theme")?, json!("dark"), false).into())?;

        // Rejected commands leave no trace on disk
        assert!(repo
            .apply_command(command("line.delete", json!({"lineId": "ghost"}), 40))
            .is_err());
        repo.state().clone()
    };

    let text = std::fs::read_to_string(&path)?;
    assert_eq!(text.lines().count(), 4);

    let reopened = ProjectRepository::open("p1", JsonlStore::open(&path), RepositoryConfig::default())?;
    assert_eq!(reopened.state(), &state);
    assert_eq!(reopened.events()[3].kind(), "set");
    assert_eq!(
        reopened.state()["scenes"]["items"]["s1"]["sections"]["items"]["x1"]["lines"]["order"],
        json!([{"id": "l1", "children": []}])
    );
    Ok(())
}

#[test]
fn test_corrupt_log_refuses_to_open() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("events.jsonl");
    std::fs::write(&path, "{\"type\":\"init\",\"payload\":{\"value\":{}}}\nnot json\n")?;

    let err = ProjectRepository::open("p1", JsonlStore::open(&path), RepositoryConfig::default())
        .err()
        .map(|e| e.code());
    assert_eq!(err, Some("store_error"));
    assert!(matches!(
        JsonlStore::open(&path).load(),
        Err(StoreError::Corrupt { line: 2, .. })
    ));
    Ok(())
}

#[test]
fn test_history_is_browsable() {
    let mut repo = ProjectRepository::open("p1", MemoryStore::new(), RepositoryConfig::default()).unwrap();
    for (i, name) in ["A", "B", "C"].iter().enumerate() {
        let id = format!("s{}", i);
        repo.apply_command(command("scene.create", json!({"sceneId": id, "name": name}), i as i64))
            .unwrap();
    }

    assert_eq!(repo.state_at(0usize).unwrap(), initial_storage_state("p1"));
    assert_eq!(order_ids(&repo.state_at(2usize).unwrap()["scenes"]["order"]), ["s0", "s1"]);
    assert_eq!(&repo.state_at(99usize).unwrap(), repo.state());
    assert_eq!(&repo.state_at(f64::NAN).unwrap(), repo.state());
    assert_eq!(order_ids(&repo.state_at(1.7).unwrap()["scenes"]["order"]), ["s0"]);
    assert_eq!(repo.state_at(-3i64).unwrap(), initial_storage_state("p1"));
}

#[test]
fn test_typed_and_tree_edits_interleave() {
    let mut repo = ProjectRepository::open("p1", MemoryStore::new(), RepositoryConfig::default()).unwrap();
    repo.apply_command(command(
        "resource.create",
        json!({"resourceType": "images", "resourceId": "dir", "data": {"type": "folder", "name": "Art"}}),
        10,
    ))
    .unwrap();
    {
        let mut images = repo
            .collection(&CollectionTarget::Resource("images".into()))
            .unwrap();
        let data = json!({"name": "Logo"}).as_object().cloned().unwrap();
        images.insert("logo", data, ParentRef::from("dir"), Position::Last).unwrap();
    }
    repo.apply_command(command(
        "resource.duplicate",
        json!({"resourceType": "images", "sourceId": "logo", "newId": "logo2"}),
        20,
    ))
    .unwrap();

    assert_eq!(order_ids(&repo.state()["images"]["order"]), ["dir", "logo", "logo2"]);
    assert_eq!(repo.state()["images"]["items"]["logo2"]["name"], json!("Logo Copy"));
    assert!(repo.verify().unwrap());
}

#[test]
fn test_session_rebases_onto_repository_log() {
    let mut repo = ProjectRepository::open("p1", MemoryStore::new(), RepositoryConfig::default()).unwrap();
    let mut session = EditSession::new("p1", Actor::new("u2", "c2"), &RepositoryConfig::default());

    session
        .apply_optimistic(command("scene.create", json!({"sceneId": "mine", "name": "Mine"}), 5).with_id("m1"))
        .unwrap();
    repo.apply_command(command("scene.create", json!({"sceneId": "theirs", "name": "Theirs"}), 1))
        .unwrap();

    let dropped = session.rebase(repo.events()).unwrap();
    assert_eq!(dropped, 0);
    assert_eq!(session.pending_count(), 1);
    assert_eq!(order_ids(&session.state()["scenes"]["order"]), ["theirs", "mine"]);
    assert_eq!(session.authoritative(), repo.state());
}

#[test]
fn test_unsupported_model_version_in_log() {
    let events: Vec<RepositoryEvent> = vec![Action::init(json!({"model_version": 3})).into()];
    let err = ProjectRepository::open("p1", MemoryStore::with_events(events), RepositoryConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, EditorError::Domain(_)));
    assert_eq!(err.code(), "unsupported_model_version");
}

#[test]
fn test_set_variable_value_survives_typed_commands() -> anyhow::Result<()> {
    let mut repo = ProjectRepository::open("p1", MemoryStore::new(), RepositoryConfig::default())?;
    repo.add_event(
        Action::set(
            StatePath::parse("variables")?,
            json!({
                "items": {"v": {"type": "number", "default": 0, "value": 5}},
                "order": [{"id": "v", "children": []}]
            }),
            true,
        )
        .into(),
    )?;
    repo.apply_command(command("scene.create", json!({"sceneId": "s1", "name": "Intro"}), 10))?;

    let variable = &repo.state()["variables"]["items"]["v"];
    assert_eq!(variable["value"], json!(5));
    assert_eq!(variable["default"], json!(0));
    assert!(repo.verify()?);
    Ok(())
}

#[test]
fn test_repaired_fields_pass_round_trip_check() -> anyhow::Result<()> {
    let mut repo = ProjectRepository::open("p1", MemoryStore::new(), RepositoryConfig::default())?;
    repo.add_event(
        Action::set(
            StatePath::parse("images")?,
            json!({
                "items": {"f": {"type": "folder", "name": "Art"}, "a": {"name": "A", "parentId": "zzz"}},
                "order": [{"id": "f", "children": [{"id": "a", "children": []}]}]
            }),
            true,
        )
        .into(),
    )?;
    repo.apply_command(command("scene.create", json!({"sceneId": "s1", "name": "Intro"}), 10))?;
    repo.add_event(Action::set(StatePath::parse("story.initialSceneId")?, Value::Null, false).into())?;

    let ctx = ProjectionContext::new("p1", 99);
    for index in 0..=repo.len() {
        check_round_trip(&repo.state_at(index)?, &ctx)?;
    }

    let domain = repo.domain_state(99);
    assert_eq!(domain.story.initial_scene_id.as_deref(), Some("s1"));
    assert_eq!(domain.resources["images"].items["a"].parent_id.as_deref(), Some("f"));

    repo.apply_command(command("scene.create", json!({"sceneId": "s2", "name": "Next"}), 20))?;
    assert_eq!(repo.state()["story"]["initialSceneId"], json!("s1"));
    assert_eq!(repo.state()["images"]["items"]["a"]["parentId"], json!("f"));
    Ok(())
}

#[derive(Debug, Clone)]
enum Op {
    Create { id: usize, parent: Option<usize>, folder: bool },
    Move { id: usize, parent: Option<usize>, index: usize },
    Delete { id: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let id = 0usize..8;
    let parent = prop::option::of(0usize..8);
    prop_oneof![
        (id.clone(), parent.clone(), any::<bool>()).prop_map(|(id, parent, folder)| Op::Create { id, parent, folder }),
        (id.clone(), parent, 0usize..4).prop_map(|(id, parent, index)| Op::Move { id, parent, index }),
        id.prop_map(|id| Op::Delete { id }),
    ]
}

fn to_command(op: &Op, ts: i64) -> Command {
    let name = |id: &usize| format!("r{}", id);
    let payload = match op {
        Op::Create { id, parent, folder } => {
            let data = if *folder { json!({"type": "folder"}) } else { json!({"name": name(id)}) };
            let mut payload = json!({"resourceType": "sounds", "resourceId": name(id), "data": data});
            if let Some(parent) = parent {
                payload["parentId"] = json!(name(parent));
            }
            payload
        }
        Op::Move { id, parent, index } => json!({
            "resourceType": "sounds",
            "resourceId": name(id),
            "parentId": parent.as_ref().map(name),
            "index": index,
        }),
        Op::Delete { id } => json!({"resourceType": "sounds", "resourceId": name(id)}),
    };
    let kind = match op {
        Op::Create { .. } => "resource.create",
        Op::Move { .. } => "resource.move",
        Op::Delete { .. } => "resource.delete",
    };
    command(kind, payload, ts)
}

proptest! {
    #[test]
    fn replay_reproduces_the_live_document(
        ops in prop::collection::vec(op_strategy(), 0..30),
        interval in 0usize..4,
    ) {
        let mut repo = ProjectRepository::open("p1", MemoryStore::new(), RepositoryConfig::default()).unwrap();
        for (ts, op) in ops.iter().enumerate() {
            // Rejected commands are expected; they must simply not be journaled
            let before = repo.len();
            if repo.apply_command(to_command(op, ts as i64)).is_err() {
                prop_assert_eq!(repo.len(), before);
            }
        }

        let sounds = &repo.state()["sounds"];
        let mut placed = order_ids(&sounds["order"]);
        placed.sort();
        let mut stored: Vec<String> = sounds["items"].as_object().unwrap().keys().cloned().collect();
        stored.sort();
        prop_assert_eq!(&placed, &stored);

        let config = RepositoryConfig { snapshot_interval: interval, ..RepositoryConfig::default() };
        let store = MemoryStore::with_events(repo.events().to_vec());
        let reopened = ProjectRepository::open("p1", store, config).unwrap();
        prop_assert_eq!(reopened.state(), repo.state());
        prop_assert!(reopened.verify().unwrap());
    }
}
