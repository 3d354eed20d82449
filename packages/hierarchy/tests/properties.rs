//! Property-based invariants for tree mutations.
//!
//! 1. Cascade delete leaves no descendant in items or order.
//! 2. Any sequence of mutations keeps the collection structurally valid.
//! 3. Duplicate with the same seed is deterministic.
//! 4. Move never loses or duplicates ids.

use proptest::prelude::*;
use std::collections::HashSet;
use tessera_hierarchy::{Hierarchy, ItemData, ParentRef, Position, TreeMutation};

// ── Helpers ─────────────────────────────────────────────────────────────

const IDS: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];

fn id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(IDS.to_vec()).prop_map(str::to_string)
}

fn parent_strategy() -> impl Strategy<Value = ParentRef> {
    prop_oneof![
        Just(ParentRef::Root),
        id_strategy().prop_map(ParentRef::Node),
    ]
}

fn position_strategy() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::First),
        Just(Position::Last),
        id_strategy().prop_map(Position::Before),
        id_strategy().prop_map(Position::After),
    ]
}

fn mutation_strategy() -> impl Strategy<Value = TreeMutation> {
    prop_oneof![
        4 => (id_strategy(), parent_strategy(), position_strategy()).prop_map(|(id, parent, position)| {
            TreeMutation::Insert { id, data: ItemData::new(), parent, position }
        }),
        1 => id_strategy().prop_map(|id| TreeMutation::Delete { id }),
        2 => (id_strategy(), parent_strategy(), position_strategy())
            .prop_map(|(id, parent, position)| TreeMutation::Move { id, parent, position }),
        1 => (id_strategy(), "[a-z]{1,4}").prop_map(|(id, seed)| TreeMutation::Duplicate { id, seed: Some(seed) }),
    ]
}

fn build(mutations: &[TreeMutation]) -> Hierarchy {
    let mut c = Hierarchy::new();
    for mutation in mutations {
        c = mutation.apply(&c).unwrap().collection;
    }
    c
}

proptest! {
    #[test]
    fn mutations_preserve_structure(mutations in prop::collection::vec(mutation_strategy(), 0..40)) {
        let c = build(&mutations);
        prop_assert!(c.is_valid(), "violations: {:?}", c.validate());
    }

    #[test]
    fn cascade_delete_removes_descendants(
        mutations in prop::collection::vec(mutation_strategy(), 1..40),
        target in id_strategy(),
    ) {
        let c = build(&mutations);
        let doomed: HashSet<String> = match tessera_hierarchy::forest::find(c.order(), &target) {
            Some(node) => node.subtree_ids().into_iter().collect(),
            None => std::iter::once(target.clone()).collect(),
        };

        let after = c.delete(&target);
        for id in &doomed {
            prop_assert!(!after.contains(id));
            prop_assert!(!after.is_placed(id));
        }
        prop_assert_eq!(after.len() + doomed.iter().filter(|id| c.contains(id)).count(), c.len());
    }

    #[test]
    fn duplicate_is_deterministic(
        mutations in prop::collection::vec(mutation_strategy(), 1..30),
        target in id_strategy(),
        seed in "[a-z0-9]{1,8}",
    ) {
        let c = build(&mutations);
        let first = c.duplicate(&target, &seed).unwrap();
        let second = c.duplicate(&target, &seed).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn move_keeps_id_set(
        mutations in prop::collection::vec(mutation_strategy(), 1..30),
        id in id_strategy(),
        parent in parent_strategy(),
        position in position_strategy(),
    ) {
        let c = build(&mutations);
        let before: HashSet<String> = c.ids().into_iter().collect();
        let after = c.move_node(&id, &parent, &position);
        let after_ids = after.ids();
        let after_set: HashSet<String> = after_ids.iter().cloned().collect();
        prop_assert_eq!(after_ids.len(), after_set.len());
        prop_assert_eq!(before, after_set);
    }
}
