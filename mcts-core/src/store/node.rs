use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::ids::NodeIndex;

/// Terminal-status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Unknown,
    Win,
    Loss,
    Draw,
}

/// Derived position metadata, attached once on the node's first visit and
/// never mutated afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Annotation {
    pub zobrist_hash: u64,
    pub terminal: Terminal,
    pub win_p: f32,
    pub loss_p: f32,
    pub m_position: f32,
}

/// `N`/`W` rolled in by the (out-of-scope) apply phase. Read as-of-snapshot
/// during selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStats {
    pub n: u64,
    pub w: f64,
}

/// One child slot: either unexpanded (prior policy only) or expanded (also
/// holds the materialized child's index). `u32::MAX` is the "unexpanded"
/// sentinel, mutated only under the owning parent's expansion lock
/// (see `NodeStore::create_child`).
#[derive(Debug)]
pub struct ChildSlot {
    pub prior: f32,
    child: AtomicU32,
}

const UNEXPANDED: u32 = u32::MAX;

impl ChildSlot {
    pub fn new(prior: f32) -> Self {
        ChildSlot {
            prior,
            child: AtomicU32::new(UNEXPANDED),
        }
    }

    pub fn child_index(&self) -> Option<NodeIndex> {
        let raw = self.child.load(Ordering::Acquire);
        (raw != UNEXPANDED).then_some(raw)
    }

    pub(crate) fn set_child(&self, index: NodeIndex) {
        self.child.store(index, Ordering::Release);
    }
}

/// Cheap, owned snapshot of a [`ChildSlot`] returned by the store so callers
/// never hold a lock across the PUCT simulation loop.
#[derive(Debug, Clone, Copy)]
pub struct ChildSlotView {
    pub prior: f32,
    pub child: Option<NodeIndex>,
}

/// Fixed-size node record, addressed by [`NodeIndex`] inside the arena.
/// Structural fields (`parent_index`, `children_start`, ...) are interior-
/// mutable so the owning [`super::NodeStore`] only needs a read lock to hand
/// out access to an individual record; the hot `n_in_flight` counters are
/// plain atomics, updated with a single atomic add/subtract each.
#[derive(Debug)]
pub struct NodeRecord {
    parent_index: Mutex<Option<NodeIndex>>,
    annotation: RwLock<Option<Annotation>>,

    children_start: AtomicU32,
    num_policy_moves: AtomicU32,
    num_children_visited: AtomicU32,
    num_children_expanded: AtomicU32,

    num_nodes_transposition_extracted: AtomicU8,
    transposition_root_index: Mutex<Option<NodeIndex>>,
    override_v_to_apply_from_transposition: Mutex<Option<f32>>,

    pub(crate) n_in_flight: [AtomicI64; 2],
    stats: RwLock<NodeStats>,

    /// Per-parent critical section for materializing a child slot. An
    /// `Arc` so callers can clone a handle to it without holding the
    /// store's outer lock while waiting to acquire it.
    pub(crate) expansion_lock: Arc<Mutex<()>>,
}

impl NodeRecord {
    pub fn new(parent: Option<NodeIndex>) -> Self {
        NodeRecord {
            parent_index: Mutex::new(parent),
            annotation: RwLock::new(None),
            children_start: AtomicU32::new(UNEXPANDED),
            num_policy_moves: AtomicU32::new(0),
            num_children_visited: AtomicU32::new(0),
            num_children_expanded: AtomicU32::new(0),
            num_nodes_transposition_extracted: AtomicU8::new(0),
            transposition_root_index: Mutex::new(None),
            override_v_to_apply_from_transposition: Mutex::new(None),
            n_in_flight: [AtomicI64::new(0), AtomicI64::new(0)],
            stats: RwLock::new(NodeStats::default()),
            expansion_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        *self.parent_index.lock().unwrap()
    }

    pub(crate) fn set_parent(&self, parent: Option<NodeIndex>) {
        *self.parent_index.lock().unwrap() = parent;
    }

    pub fn annotation(&self) -> Option<Annotation> {
        *self.annotation.read().unwrap()
    }

    pub fn is_annotated(&self) -> bool {
        self.annotation.read().unwrap().is_some()
    }

    /// Idempotent: the first writer wins, matching `Annotator::annotate`'s
    /// documented idempotence.
    pub(crate) fn set_annotation_if_absent(&self, annotation: Annotation) {
        let mut slot = self.annotation.write().unwrap();
        if slot.is_none() {
            *slot = Some(annotation);
        }
    }

    pub fn terminal(&self) -> Terminal {
        self.annotation.read().unwrap().map(|a| a.terminal).unwrap_or(Terminal::Unknown)
    }

    pub fn stats(&self) -> NodeStats {
        *self.stats.read().unwrap()
    }

    /// Stand-in for the out-of-scope apply phase: records a completed
    /// evaluation's `N`/`W` contribution. Exposed so tests and the
    /// surrounding search can drive the tree into realistic shapes.
    pub fn apply_visit(&self, value: f64) {
        let mut stats = self.stats.write().unwrap();
        stats.n += 1;
        stats.w += value;
    }

    pub fn children_start(&self) -> Option<u32> {
        let raw = self.children_start.load(Ordering::Acquire);
        (raw != UNEXPANDED).then_some(raw)
    }

    pub(crate) fn set_children_start(&self, start: u32, count: u32) {
        self.children_start.store(start, Ordering::Release);
        self.num_policy_moves.store(count, Ordering::Release);
    }

    pub fn num_policy_moves(&self) -> u32 {
        self.num_policy_moves.load(Ordering::Acquire)
    }

    pub fn num_children_visited(&self) -> u32 {
        self.num_children_visited.load(Ordering::Acquire)
    }

    pub(crate) fn widen_children_visited(&self, at_least: u32) {
        self.num_children_visited.fetch_max(at_least, Ordering::AcqRel);
    }

    pub fn num_children_expanded(&self) -> u32 {
        self.num_children_expanded.load(Ordering::Acquire)
    }

    pub(crate) fn record_child_expanded(&self) {
        self.num_children_expanded.fetch_add(1, Ordering::AcqRel);
    }

    pub fn num_nodes_transposition_extracted(&self) -> u8 {
        self.num_nodes_transposition_extracted.load(Ordering::Acquire)
    }

    pub(crate) fn set_transposition_extracted(&self, value: u8) {
        self.num_nodes_transposition_extracted.store(value, Ordering::Release);
    }

    pub fn transposition_root_index(&self) -> Option<NodeIndex> {
        *self.transposition_root_index.lock().unwrap()
    }

    pub(crate) fn set_transposition_root_index(&self, root: Option<NodeIndex>) {
        *self.transposition_root_index.lock().unwrap() = root;
    }

    /// An analogous `M` (moves-left) override from a transposition swap is
    /// deliberately not carried here; only the `V` override is.
    pub fn override_v(&self) -> Option<f32> {
        *self.override_v_to_apply_from_transposition.lock().unwrap()
    }

    pub(crate) fn set_override_v(&self, value: Option<f32>) {
        *self.override_v_to_apply_from_transposition.lock().unwrap() = value;
    }

    pub fn n_in_flight(&self, selector: usize) -> i64 {
        self.n_in_flight[selector].load(Ordering::Acquire)
    }

    /// A node materialized under `SingleNodeDeferredCopy` whose child
    /// descriptors have not yet been extracted from its transposition
    /// root. `num_nodes_transposition_extracted` runs 0 (linked, fresh) ->
    /// 1 (deferred, visited once) -> 2 (materialized, ordinary from then
    /// on).
    pub fn is_transposition_linked(&self) -> bool {
        self.transposition_root_index().is_some() && self.num_nodes_transposition_extracted() == 0
    }

    pub fn is_deferred(&self) -> bool {
        self.num_nodes_transposition_extracted() == 1
    }
}
