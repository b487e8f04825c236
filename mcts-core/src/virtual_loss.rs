use std::sync::atomic::Ordering;

use crate::ids::{NodeIndex, SelectorId};
use crate::store::NodeStore;

/// Virtual-loss accounting. Every function here is a thin wrapper over the
/// per-node atomic `NInFlight[selector]` counters, updated with a single
/// atomic add/subtract each; the interesting invariants come from *how*
/// the selector calls these, not from anything clever here.

/// Reserve `k` visits for `selector` on a single node, returning the prior
/// (pre-reservation) value. A prior value of zero means this batchlet is
/// the first to reserve this node.
pub fn reserve(store: &NodeStore, node: NodeIndex, selector: SelectorId, k: i64) -> i64 {
    debug_assert!(k >= 0, "cannot reserve a negative number of visits");
    store.with_node(node, |n| n.n_in_flight[selector.index()].fetch_add(k, Ordering::AcqRel))
}

/// Undo a reservation of `k` visits on `node` and every ancestor up to and
/// including the root, so the net change to `NInFlight[s]` on every node
/// is zero before the descent returns. Walking from `node` itself — not
/// just its parent — is what keeps that conservation property: `node`'s
/// own reservation was made by its caller just before recursing into it,
/// symmetrically with every ancestor above it.
pub fn release_path_from(store: &NodeStore, node: NodeIndex, selector: SelectorId, k: i64) {
    debug_assert!(k >= 0, "cannot release a negative number of visits");
    let mut current = Some(node);
    while let Some(index) = current {
        let prior = store.with_node(index, |n| n.n_in_flight[selector.index()].fetch_sub(k, Ordering::AcqRel));
        if prior < k {
            tracing::error!(node = index, k, prior, "NInFlight underflow releasing from node");
        }
        debug_assert!(
            prior >= k,
            "NInFlight underflow releasing {k} from node {index} which only had {prior} reserved"
        );
        current = store.parent_of(index);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reserve_then_release_is_net_zero() {
        let store = NodeStore::new();
        let child_slots = store.alloc_children(&[1.0]);
        let child = store.create_child(store.root(), child_slots);

        let selector = SelectorId::A;
        reserve(&store, store.root(), selector, 3);
        reserve(&store, child, selector, 3);

        assert_eq!(store.with_node(store.root(), |n| n.n_in_flight(0)), 3);
        assert_eq!(store.with_node(child, |n| n.n_in_flight(0)), 3);

        release_path_from(&store, child, selector, 3);

        assert_eq!(store.with_node(store.root(), |n| n.n_in_flight(0)), 0);
        assert_eq!(store.with_node(child, |n| n.n_in_flight(0)), 0);
    }
}
