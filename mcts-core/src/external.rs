use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::SelectorError;
use crate::handle::NodeHandle;
use crate::ids::NodeIndex;
use crate::store::{Annotation, NodeStore};

/// Populates derived position metadata the first time a node is visited.
/// Must be idempotent; the store itself enforces that
/// ([`crate::store::NodeRecord::set_annotation_if_absent`] keeps the first
/// writer's value), so implementations are free to recompute eagerly
/// without checking `is_annotated()` themselves.
pub trait Annotator: Send + Sync {
    fn annotate(&self, node: &NodeHandle) -> Annotation;
}

/// Transposition roots map, owned and maintained by the surrounding search;
/// the core only reads it.
pub trait TranspositionRoots: Send + Sync {
    fn lookup(&self, zobrist_hash: u64) -> Option<NodeIndex>;
}

/// Boolean predicate over two opaque network-definition fingerprints
/// supplied by the caller; the core never inspects what they encode, only
/// whether the reuse-other-tree evaluator considers them interchangeable.
pub trait ReuseCompatibility: Send + Sync {
    fn is_compatible(&self, ours: u64, theirs: u64) -> bool;
}

/// A leaf evaluator that can opportunistically short-circuit evaluation by
/// borrowing an annotation from elsewhere. `hits`/`misses` are tracked
/// per-instance; aggregating several instances' counters is the caller's
/// job.
pub trait ReuseEvaluator: Send + Sync {
    /// Attempt to short-circuit evaluation of `node` by borrowing an
    /// annotation from another tree. `Ok(None)` means "no reuse candidate,
    /// fall through to the normal apply phase"; `Err(IncompatibleReuse)` is
    /// raised at the first mismatching network definition probed.
    fn try_evaluate(&self, node: &NodeHandle) -> Result<Option<Annotation>, SelectorError>;

    /// Drops any cached state between searches; does not reset the
    /// hit/miss counters.
    fn reset(&self);

    fn hits(&self) -> u64;
    fn misses(&self) -> u64;
}

/// Default no-op evaluator: every probe is a miss, reuse is simply disabled.
#[derive(Debug, Default)]
pub struct NullReuseEvaluator {
    misses: AtomicU64,
}

impl ReuseEvaluator for NullReuseEvaluator {
    fn try_evaluate(&self, _node: &NodeHandle) -> Result<Option<Annotation>, SelectorError> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    fn reset(&self) {}

    fn hits(&self) -> u64 {
        0
    }

    fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Reuse-other-tree evaluator: probes a second tree's transposition roots
/// map for a node sharing this one's `ZobristHash`, and borrows its
/// annotation (subject to a compatibility check against a network
/// definition fingerprint) rather than requiring a fresh evaluation.
pub struct OtherTreeReuseEvaluator {
    other_store: Arc<NodeStore>,
    other_roots: Box<dyn TranspositionRoots>,
    other_annotator: Box<dyn Annotator>,
    compatibility: Box<dyn ReuseCompatibility>,
    our_network_definition: u64,
    their_network_definition: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl OtherTreeReuseEvaluator {
    pub fn new(
        other_store: Arc<NodeStore>,
        other_roots: Box<dyn TranspositionRoots>,
        other_annotator: Box<dyn Annotator>,
        compatibility: Box<dyn ReuseCompatibility>,
        our_network_definition: u64,
        their_network_definition: u64,
    ) -> Self {
        OtherTreeReuseEvaluator {
            other_store,
            other_roots,
            other_annotator,
            compatibility,
            our_network_definition,
            their_network_definition,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn other_handle(&self, index: NodeIndex) -> NodeHandle {
        NodeHandle::new(self.other_store.clone(), index)
    }
}

impl ReuseEvaluator for OtherTreeReuseEvaluator {
    fn try_evaluate(&self, node: &NodeHandle) -> Result<Option<Annotation>, SelectorError> {
        if !self.compatibility.is_compatible(self.our_network_definition, self.their_network_definition) {
            return Err(SelectorError::IncompatibleReuse);
        }

        let Some(zobrist_hash) = node.annotation().map(|a| a.zobrist_hash) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        match self.other_roots.lookup(zobrist_hash) {
            Some(other_index) => {
                let other = self.other_handle(other_index);
                let annotation = self.other_annotator.annotate(&other);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(annotation))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn reset(&self) {}

    fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handle::NodeHandle;
    use crate::ids::NodeIndex;
    use crate::store::Terminal;

    struct AlwaysCompatible;

    impl ReuseCompatibility for AlwaysCompatible {
        fn is_compatible(&self, _ours: u64, _theirs: u64) -> bool {
            true
        }
    }

    struct NeverCompatible;

    impl ReuseCompatibility for NeverCompatible {
        fn is_compatible(&self, _ours: u64, _theirs: u64) -> bool {
            false
        }
    }

    struct FixedAnnotator(Annotation);

    impl Annotator for FixedAnnotator {
        fn annotate(&self, _node: &NodeHandle) -> Annotation {
            self.0
        }
    }

    struct MapRoots(u64, NodeIndex);

    impl TranspositionRoots for MapRoots {
        fn lookup(&self, zobrist_hash: u64) -> Option<NodeIndex> {
            (zobrist_hash == self.0).then_some(self.1)
        }
    }

    fn annotate_with_hash(store: &NodeStore, index: NodeIndex, zobrist_hash: u64) {
        store.with_node(index, |n| {
            n.set_annotation_if_absent(Annotation {
                zobrist_hash,
                terminal: Terminal::Unknown,
                win_p: 0.0,
                loss_p: 0.0,
                m_position: 0.0,
            })
        });
    }

    #[test]
    fn hits_when_the_other_tree_tracks_a_root_for_our_hash() {
        let ours = Arc::new(NodeStore::new());
        annotate_with_hash(&ours, ours.root(), 42);
        let our_node = NodeHandle::root(ours.clone());

        let other = Arc::new(NodeStore::new());
        let borrowed = Annotation { zobrist_hash: 42, terminal: Terminal::Unknown, win_p: 0.9, loss_p: 0.05, m_position: 3.0 };

        let evaluator = OtherTreeReuseEvaluator::new(
            other.clone(),
            Box::new(MapRoots(42, other.root())),
            Box::new(FixedAnnotator(borrowed)),
            Box::new(AlwaysCompatible),
            1,
            1,
        );

        let result = evaluator.try_evaluate(&our_node).unwrap().expect("other tree tracks this hash");
        assert_eq!(result.win_p, borrowed.win_p);
        assert_eq!(result.m_position, borrowed.m_position);
        assert_eq!(evaluator.hits(), 1);
        assert_eq!(evaluator.misses(), 0);
    }

    #[test]
    fn misses_when_no_root_tracks_our_hash() {
        let ours = Arc::new(NodeStore::new());
        annotate_with_hash(&ours, ours.root(), 99);
        let our_node = NodeHandle::root(ours.clone());

        let other = Arc::new(NodeStore::new());
        let evaluator = OtherTreeReuseEvaluator::new(
            other.clone(),
            Box::new(MapRoots(1, other.root())),
            Box::new(FixedAnnotator(Annotation { zobrist_hash: 1, terminal: Terminal::Unknown, win_p: 0.0, loss_p: 0.0, m_position: 0.0 })),
            Box::new(AlwaysCompatible),
            1,
            1,
        );

        let result = evaluator.try_evaluate(&our_node).unwrap();
        assert!(result.is_none());
        assert_eq!(evaluator.misses(), 1);
        assert_eq!(evaluator.hits(), 0);
    }

    #[test]
    fn incompatible_network_definitions_are_rejected_before_any_lookup() {
        let ours = Arc::new(NodeStore::new());
        annotate_with_hash(&ours, ours.root(), 42);
        let our_node = NodeHandle::root(ours.clone());

        let other = Arc::new(NodeStore::new());
        let evaluator = OtherTreeReuseEvaluator::new(
            other.clone(),
            Box::new(MapRoots(42, other.root())),
            Box::new(FixedAnnotator(Annotation { zobrist_hash: 42, terminal: Terminal::Unknown, win_p: 0.0, loss_p: 0.0, m_position: 0.0 })),
            Box::new(NeverCompatible),
            1,
            2,
        );

        let err = evaluator.try_evaluate(&our_node).unwrap_err();
        assert!(matches!(err, SelectorError::IncompatibleReuse));
        assert_eq!(evaluator.hits(), 0);
        assert_eq!(evaluator.misses(), 0);
    }
}
