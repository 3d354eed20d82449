use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use tessera_hierarchy::{ParentRef, Position};
use tessera_journal::{materialize, Action, ActionReducer, Journal, JournalConfig, StatePath};

fn build_events(count: usize) -> Vec<Action> {
    let target = StatePath::parse("resources.images").unwrap();
    let mut events = vec![Action::init(json!({
        "resources": {"images": {"items": {}, "order": []}}
    }))];
    for n in 0..count {
        let parent = if n % 10 == 0 || n == 0 {
            ParentRef::Root
        } else {
            ParentRef::Node(format!("img-{}", n - n % 10))
        };
        let data = json!({ "name": format!("Image {}", n) });
        events.push(Action::insert(
            target.clone(),
            &format!("img-{}", n),
            data.as_object().cloned().unwrap_or_default(),
            parent,
            Position::Last,
        ));
    }
    events
}

fn bench_replay(c: &mut Criterion) {
    let events = build_events(500);
    let reducer = ActionReducer::default();

    c.bench_function("cold_replay_500", |b| {
        b.iter(|| materialize(&reducer, black_box(&events), None::<usize>))
    });

    let journal = Journal::from_events(
        ActionReducer::default(),
        events.clone(),
        JournalConfig { snapshot_interval: 100 },
    )
    .unwrap();

    c.bench_function("checkpoint_replay_450", |b| {
        b.iter(|| journal.state_at(black_box(450usize)))
    });
}

criterion_group!(benches, bench_replay);
criterion_main!(benches);
