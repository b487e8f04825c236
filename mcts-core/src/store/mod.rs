mod node;

use std::sync::RwLock;

pub use node::{Annotation, ChildSlot, ChildSlotView, NodeRecord, NodeStats, Terminal};

use crate::ids::{NodeIndex, ROOT};

/// Flat, index-addressed arena owning every node record.
///
/// Growth is serialized by a pair of `RwLock<Vec<_>>`s; every accessor takes
/// the lock just long enough to read or push, then releases it, so a
/// recursive descent never holds the arena lock across a recursive call
/// (the only thing that would risk a deadlock against a concurrent
/// `create_child`).
#[derive(Debug)]
pub struct NodeStore {
    nodes: RwLock<Vec<NodeRecord>>,
    children: RwLock<Vec<ChildSlot>>,
}

impl NodeStore {
    pub fn new() -> Self {
        NodeStore {
            nodes: RwLock::new(vec![NodeRecord::new(None)]),
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().unwrap().len()
    }

    pub fn root(&self) -> NodeIndex {
        ROOT
    }

    /// Run `f` with shared access to node `index`'s record. Kept short-lived
    /// by design: callers should extract the values they need rather than
    /// stash the reference.
    pub fn with_node<R>(&self, index: NodeIndex, f: impl FnOnce(&NodeRecord) -> R) -> R {
        let nodes = self.nodes.read().unwrap();
        f(&nodes[index as usize])
    }

    pub fn parent_of(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.with_node(index, |n| n.parent())
    }

    /// Allocate a contiguous run of child slots with the given priors,
    /// returning the base index. Used both when a node is first evaluated
    /// (the external apply phase supplies the freshly-normalized policy)
    /// and by lazy transposition materialization, which copies an existing
    /// root's priors verbatim.
    pub fn alloc_children(&self, priors: &[f32]) -> u32 {
        let mut children = self.children.write().unwrap();
        let base = children.len() as u32;
        children.extend(priors.iter().map(|&p| ChildSlot::new(p)));
        base
    }

    pub fn child_slot_view(&self, global_index: u32) -> ChildSlotView {
        let children = self.children.read().unwrap();
        let slot = &children[global_index as usize];
        ChildSlotView {
            prior: slot.prior,
            child: slot.child_index(),
        }
    }

    pub fn children_range(&self, start: u32, len: u32) -> Vec<ChildSlotView> {
        let children = self.children.read().unwrap();
        (0..len)
            .map(|i| {
                let slot = &children[(start + i) as usize];
                ChildSlotView {
                    prior: slot.prior,
                    child: slot.child_index(),
                }
            })
            .collect()
    }

    /// Materialize an unexpanded child slot into a real node record.
    /// Serialized per parent via that parent's expansion lock: two
    /// descents racing to expand *different* slots of the same parent
    /// still serialize (cheap, the critical section is just a vec push),
    /// but descents on different parents never contend.
    pub fn create_child(&self, parent: NodeIndex, slot_global_index: u32) -> NodeIndex {
        let lock = self.with_node(parent, |n| n.expansion_lock.clone());
        let _guard = lock.lock().unwrap();

        // Re-check under the lock: this parent's lock only rules out a race
        // on this exact slot coming from a sibling descent, which is exactly
        // the case we must not double-allocate for.
        if let Some(existing) = self.child_slot_view(slot_global_index).child {
            return existing;
        }

        let child_index = {
            let mut nodes = self.nodes.write().unwrap();
            let index = nodes.len() as u32;
            nodes.push(NodeRecord::new(Some(parent)));
            index
        };

        {
            let children = self.children.read().unwrap();
            children[slot_global_index as usize].set_child(child_index);
        }

        self.with_node(parent, |n| n.record_child_expanded());

        child_index
    }

    /// Atomically relink a parent's child slot to point at a different
    /// node index. Used both to finish a master swap (relink old parents)
    /// and to exchange `ParentIndex` on the swapped pair themselves.
    pub fn relink_slot(&self, slot_global_index: u32, new_child: NodeIndex) {
        let children = self.children.read().unwrap();
        children[slot_global_index as usize].set_child(new_child);
    }

    pub fn set_parent(&self, node: NodeIndex, parent: Option<NodeIndex>) {
        self.with_node(node, |n| n.set_parent(parent));
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}
