use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Map, Value};
use tessera_domain::{
    check_round_trip, initial_storage_state, process_command, to_domain, to_storage, Actor, Command,
    ProjectionContext,
};

fn build_document(scenes: usize, lines: usize, images: usize) -> Value {
    let mut storage = initial_storage_state("bench");

    let mut scene_items = Map::new();
    let mut scene_order = Vec::new();
    for s in 0..scenes {
        let mut line_items = Map::new();
        let mut line_order = Vec::new();
        for l in 0..lines {
            let id = format!("l{}-{}", s, l);
            line_items.insert(id.clone(), json!({"actions": {"dialogue": {"text": format!("line {}", l)}}}));
            line_order.push(json!({"id": id, "children": []}));
        }
        let section_id = format!("x{}", s);
        let mut sections = Map::new();
        sections.insert(
            section_id.clone(),
            json!({"name": "Main", "lines": {"items": line_items, "order": line_order}}),
        );
        scene_items.insert(
            format!("s{}", s),
            json!({
                "type": "scene",
                "name": format!("Scene {}", s),
                "sections": {"items": sections, "order": [{"id": section_id}]}
            }),
        );
        scene_order.push(json!({"id": format!("s{}", s), "children": []}));
    }
    storage["scenes"] = json!({"items": scene_items, "order": scene_order});

    let mut image_items = Map::new();
    let mut image_order: Vec<Value> = Vec::new();
    for n in 0..images {
        let id = format!("img{}", n);
        if n % 10 == 0 {
            image_items.insert(id.clone(), json!({"type": "folder", "name": format!("Folder {}", n)}));
            image_order.push(json!({"id": id, "children": []}));
        } else {
            image_items.insert(id.clone(), json!({"name": format!("Image {}", n), "fileId": id}));
            if let Some(Value::Array(children)) = image_order.last_mut().map(|folder| &mut folder["children"]) {
                children.push(json!({"id": id, "children": []}));
            }
        }
    }
    storage["images"] = json!({"items": image_items, "order": image_order});
    storage
}

fn bench_projection(c: &mut Criterion) {
    let storage = build_document(20, 50, 500);
    let ctx = ProjectionContext::new("bench", 0);
    let domain = to_domain(&storage, &ctx);

    c.bench_function("to_domain_1000_lines", |b| {
        b.iter(|| to_domain(black_box(&storage), &ctx))
    });

    c.bench_function("to_storage_1000_lines", |b| {
        b.iter(|| to_storage(black_box(&domain), &storage))
    });

    c.bench_function("round_trip_check", |b| {
        b.iter(|| check_round_trip(black_box(&storage), &ctx))
    });

    let command = Command::new(
        "bench",
        "resource.move",
        json!({"resourceType": "images", "resourceId": "img5", "parentId": "img20", "index": 0}),
        Actor::new("bench", "bench"),
    );
    c.bench_function("process_resource_move", |b| {
        b.iter(|| process_command(black_box(&domain), &command))
    });
}

criterion_group!(benches, bench_projection);
criterion_main!(benches);
