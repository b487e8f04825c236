//! Properties that only show up under real concurrency: expansion
//! serialization and transposition swap symmetry. Exercised with real OS
//! threads via `std::thread::scope`.

use std::sync::Arc;

use mcts_core::{NodeHandle, NodeStore};

#[test]
fn two_concurrent_expansions_of_the_same_slot_produce_one_node() {
    let store = Arc::new(NodeStore::new());
    let root = store.root();
    let slot = store.alloc_children(&[1.0]);

    let (child_a, child_b) = std::thread::scope(|scope| {
        let store_a = store.clone();
        let store_b = store.clone();

        let handle_a = scope.spawn(move || store_a.create_child(root, slot));
        let handle_b = scope.spawn(move || store_b.create_child(root, slot));

        (handle_a.join().unwrap(), handle_b.join().unwrap())
    });

    assert_eq!(child_a, child_b);
    // The root (index 0) plus exactly one materialized child.
    assert_eq!(store.node_count(), 2);
}

#[test]
fn many_threads_racing_on_distinct_slots_each_create_exactly_one_node() {
    let store = Arc::new(NodeStore::new());
    let root = store.root();
    const SLOTS: usize = 8;
    let base = store.alloc_children(&vec![1.0; SLOTS]);

    let children: Vec<u32> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..SLOTS)
            .flat_map(|i| {
                let store_1 = store.clone();
                let store_2 = store.clone();
                // Two racing attempts per slot.
                [
                    scope.spawn(move || store_1.create_child(root, base + i as u32)),
                    scope.spawn(move || store_2.create_child(root, base + i as u32)),
                ]
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Each pair of racing attempts for the same slot must agree, and all
    // SLOTS winners must be distinct node indices.
    for i in 0..SLOTS {
        assert_eq!(children[2 * i], children[2 * i + 1]);
    }
    let mut distinct = children.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), SLOTS);
    assert_eq!(store.node_count(), 1 + SLOTS);
}

#[test]
fn master_swap_is_structurally_symmetric() {
    let store = Arc::new(NodeStore::new());
    let root = NodeHandle::root(store.clone());

    // Two unrelated parents, each with one child: `n` under `parent_n`,
    // `m` under `parent_m`.
    let slot_n_parent = store.alloc_children(&[1.0]);
    let parent_n = store.create_child(root.index(), slot_n_parent);
    let slot_m_parent = store.alloc_children(&[1.0]);
    let parent_m = store.create_child(root.index(), slot_m_parent);

    let slot_n = store.alloc_children(&[1.0]);
    store.with_node(parent_n, |rec| rec.set_children_start(slot_n, 1));
    let n = store.create_child(parent_n, slot_n);

    let slot_m = store.alloc_children(&[1.0]);
    store.with_node(parent_m, |rec| rec.set_children_start(slot_m, 1));
    let m = store.create_child(parent_m, slot_m);

    let n_handle = root.handle_for(n);
    let m_handle = root.handle_for(m);

    mcts_core::transposition::master_swap(&n_handle, &m_handle);

    // `parent_n`'s only slot now resolves to m, and vice versa.
    assert_eq!(store.child_slot_view(slot_n).child, Some(m));
    assert_eq!(store.child_slot_view(slot_m).child, Some(n));

    // ParentIndex has been exchanged on both records.
    assert_eq!(store.parent_of(n), Some(parent_m));
    assert_eq!(store.parent_of(m), Some(parent_n));

    // Expansion bookkeeping on the (untouched) parents is unaffected by a
    // swap of their single child's identity.
    assert_eq!(store.with_node(parent_n, |rec| rec.num_children_expanded()), 1);
    assert_eq!(store.with_node(parent_m, |rec| rec.num_children_expanded()), 1);
}
