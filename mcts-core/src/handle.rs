use std::sync::Arc;

use crate::external::Annotator;
use crate::ids::{NodeIndex, SelectorId};
use crate::store::{Annotation, ChildSlotView, NodeStore, Terminal};

/// A copy-cheap navigator over the arena: a `(store, index)` pair. Cloning
/// a handle is an `Arc` bump, not a deep copy.
#[derive(Clone)]
pub struct NodeHandle {
    store: Arc<NodeStore>,
    index: NodeIndex,
}

impl NodeHandle {
    pub fn new(store: Arc<NodeStore>, index: NodeIndex) -> Self {
        NodeHandle { store, index }
    }

    pub fn root(store: Arc<NodeStore>) -> Self {
        let index = store.root();
        NodeHandle { store, index }
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    fn with(&self, index: NodeIndex) -> NodeHandle {
        NodeHandle {
            store: self.store.clone(),
            index,
        }
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.store.parent_of(self.index).map(|i| self.with(i))
    }

    /// Distance from the root, computed by walking `ParentIndex`; depth is
    /// never cached on the node record itself.
    pub fn depth(&self) -> u32 {
        let mut depth = 0;
        let mut current = self.index;
        while let Some(parent) = self.store.parent_of(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    pub fn n(&self) -> u64 {
        self.store.with_node(self.index, |n| n.stats().n)
    }

    pub fn w(&self) -> f64 {
        self.store.with_node(self.index, |n| n.stats().w)
    }

    pub fn terminal(&self) -> Terminal {
        self.store.with_node(self.index, |n| n.terminal())
    }

    pub fn annotation(&self) -> Option<Annotation> {
        self.store.with_node(self.index, |n| n.annotation())
    }

    pub fn zobrist_hash(&self) -> Option<u64> {
        self.annotation().map(|a| a.zobrist_hash)
    }

    pub fn num_policy_moves(&self) -> u32 {
        self.store.with_node(self.index, |n| n.num_policy_moves())
    }

    pub fn num_children_visited(&self) -> u32 {
        self.store.with_node(self.index, |n| n.num_children_visited())
    }

    pub fn num_children_expanded(&self) -> u32 {
        self.store.with_node(self.index, |n| n.num_children_expanded())
    }

    pub fn num_nodes_transposition_extracted(&self) -> u8 {
        self.store.with_node(self.index, |n| n.num_nodes_transposition_extracted())
    }

    pub fn transposition_root_index(&self) -> Option<NodeIndex> {
        self.store.with_node(self.index, |n| n.transposition_root_index())
    }

    pub fn is_transposition_linked(&self) -> bool {
        self.store.with_node(self.index, |n| n.is_transposition_linked())
    }

    pub fn is_deferred(&self) -> bool {
        self.store.with_node(self.index, |n| n.is_deferred())
    }

    pub fn n_in_flight(&self, selector: SelectorId) -> i64 {
        self.store.with_node(self.index, |n| n.n_in_flight(selector.index()))
    }

    pub fn is_annotated(&self) -> bool {
        self.store.with_node(self.index, |n| n.is_annotated())
    }

    /// Returns the existing annotation if present, otherwise calls out to
    /// `annotator` and stores the result (idempotently: a racing descent
    /// computing the same annotation concurrently still only keeps the
    /// first one to land, see `NodeRecord::set_annotation_if_absent`).
    pub fn ensure_annotated(&self, annotator: &dyn Annotator) -> Annotation {
        if let Some(existing) = self.annotation() {
            return existing;
        }
        let computed = annotator.annotate(self);
        self.store.with_node(self.index, |n| n.set_annotation_if_absent(computed));
        self.annotation().expect("annotation was just stored")
    }

    pub fn children_start(&self) -> Option<u32> {
        self.store.with_node(self.index, |n| n.children_start())
    }

    pub fn child_slot_at(&self, slot_offset: u32) -> Option<ChildSlotView> {
        let start = self.children_start()?;
        Some(self.store.child_slot_view(start + slot_offset))
    }

    /// All declared child slots, expanded or not, in policy order.
    pub fn children_slice(&self) -> Vec<ChildSlotView> {
        match self.children_start() {
            Some(start) => self.store.children_range(start, self.num_policy_moves()),
            None => Vec::new(),
        }
    }

    pub fn child_at(&self, slot_offset: u32) -> Option<NodeHandle> {
        let child_index = self.child_slot_at(slot_offset)?.child?;
        Some(self.with(child_index))
    }

    pub fn handle_for(&self, index: NodeIndex) -> NodeHandle {
        self.with(index)
    }

    pub(crate) fn set_children_descriptor(&self, start: u32, count: u32) {
        self.store.with_node(self.index, |n| n.set_children_start(start, count));
    }

    pub(crate) fn widen_children_visited(&self, at_least: u32) {
        self.store.with_node(self.index, |n| n.widen_children_visited(at_least));
    }

    pub(crate) fn set_transposition_root(&self, root: Option<NodeIndex>) {
        self.store.with_node(self.index, |n| n.set_transposition_root_index(root));
    }

    pub(crate) fn set_transposition_extracted(&self, value: u8) {
        self.store.with_node(self.index, |n| n.set_transposition_extracted(value));
    }

    pub fn override_v(&self) -> Option<f32> {
        self.store.with_node(self.index, |n| n.override_v())
    }

    pub(crate) fn set_override_v(&self, value: Option<f32>) {
        self.store.with_node(self.index, |n| n.set_override_v(value));
    }

    pub(crate) fn set_parent(&self, parent: Option<NodeIndex>) {
        self.store.set_parent(self.index, parent);
    }

    /// Materializes slot `slot_offset` (relative to this node's own child
    /// descriptor) into a real node record. Serialized per parent inside
    /// the store.
    pub fn create_child(&self, slot_offset: u32) -> Option<NodeHandle> {
        let start = self.children_start()?;
        let child_index = self.store.create_child(self.index, start + slot_offset);
        Some(self.with(child_index))
    }
}
