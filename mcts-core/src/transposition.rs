use crate::external::TranspositionRoots;
use crate::handle::NodeHandle;
use crate::ids::SelectorId;

/// Outcome of shared-subtree arbitration for a single descent.
pub enum Arbitration {
    /// `m` is behind `n` (or `n` has no cluster membership at all); proceed
    /// with the ordinary descent.
    Continue,
    /// `m` is ahead; `n` is treated as a leaf for this descent with its
    /// `V` borrowed from `m`'s statistics.
    TreatAsLeaf { override_v: f32 },
    /// `m` ties `n` but is claimed by another descent; back out.
    Abandon,
    /// `m` ties `n` and is idle; perform the master swap and continue
    /// through `m`.
    SwapTo(NodeHandle),
}

/// Locate the cluster member sharing `node`'s `ZobristHash` via the
/// transposition roots map and arbitrate against it. `roots` is expected to
/// map a hash to whichever member the surrounding search currently considers
/// canonical; if that happens to be `node` itself there is nothing to
/// arbitrate.
pub fn arbitrate(node: &NodeHandle, roots: &dyn TranspositionRoots) -> Arbitration {
    let Some(zobrist_hash) = node.zobrist_hash() else {
        return Arbitration::Continue;
    };
    let Some(m_index) = roots.lookup(zobrist_hash) else {
        return Arbitration::Continue;
    };
    if m_index == node.index() {
        return Arbitration::Continue;
    }

    let m = node.handle_for(m_index);
    let (m_n, n_n) = (m.n(), node.n());

    if m_n < n_n {
        Arbitration::Continue
    } else if m_n > n_n {
        let override_v = ((m.w() - node.w()) / (m_n as f64 - n_n as f64)) as f32;
        Arbitration::TreatAsLeaf { override_v }
    } else if m.n_in_flight(SelectorId::A) > 0 || m.n_in_flight(SelectorId::B) > 0 {
        Arbitration::Abandon
    } else {
        Arbitration::SwapTo(m)
    }
}

/// Find the global child-slot index in `node`'s parent's descriptor that
/// currently resolves to `node`. `None` for the root, which has no parent
/// slot to find.
fn slot_in_parent(node: &NodeHandle) -> Option<(NodeHandle, u32)> {
    let parent = node.parent()?;
    let start = parent.children_start()?;
    let offset = parent
        .children_slice()
        .iter()
        .position(|slot| slot.child == Some(node.index()))
        .expect("node must occupy a slot in its own parent's child descriptor");
    Some((parent, start + offset as u32))
}

/// Master swap: rewrite `n`'s old parent to reference `m` and vice versa,
/// then exchange `ParentIndex` on both records. After this call the tree
/// is structurally consistent, but `n` and `m` have traded places in the
/// tree; the caller continues its descent through `m`.
pub fn master_swap(n: &NodeHandle, m: &NodeHandle) {
    let n_slot = slot_in_parent(n);
    let m_slot = slot_in_parent(m);

    if let Some((n_parent, n_slot_index)) = &n_slot {
        n_parent.store().relink_slot(*n_slot_index, m.index());
    }
    if let Some((m_parent, m_slot_index)) = &m_slot {
        m_parent.store().relink_slot(*m_slot_index, n.index());
    }

    n.set_parent(m_slot.map(|(parent, _)| parent.index()));
    m.set_parent(n_slot.map(|(parent, _)| parent.index()));
}

/// A node created from a transposition root (via a master swap or the
/// deferred-copy path) is flagged but not yet marked deferred; its first
/// visit (through `visit-leaf`) transitions it so the *next* descent's
/// `gather` materializes its children instead of re-treating it as a leaf.
pub fn mark_visited_if_transposition_linked(node: &NodeHandle) {
    if node.is_transposition_linked() {
        node.set_transposition_extracted(1);
    }
}

/// On a deferred node's second visit, copy the unexpanded children from
/// the transposition root into this node's own child descriptor. This is
/// a pure structural copy; no evaluation is performed.
pub fn materialize_deferred_children(node: &NodeHandle) {
    if !node.is_deferred() {
        return;
    }
    let root_index = node
        .transposition_root_index()
        .expect("a deferred node always carries the transposition root it was copied from");
    let root = node.handle_for(root_index);

    let priors: Vec<f32> = root.children_slice().iter().map(|slot| slot.prior).collect();
    let base = node.store().alloc_children(&priors);
    node.set_children_descriptor(base, priors.len() as u32);
    node.set_transposition_extracted(2);
}
