use std::sync::{Arc, Mutex};

use tracing::{debug, debug_span, trace, warn};

use crate::config::{SelectorConfig, TranspositionMode};
use crate::error::SelectorError;
use crate::external::{Annotator, ReuseEvaluator, TranspositionRoots};
use crate::handle::NodeHandle;
use crate::ids::SelectorId;
use crate::pool::{BatchBarrier, WorkerPool};
use crate::puct::{self, ChildStats, PuctScorer};
use crate::store::{Annotation, NodeStore, Terminal};
use crate::transposition::{self, Arbitration};
use crate::virtual_loss;

/// Everything a descent needs that outlives any single `gather` call;
/// shared behind an `Arc` so it can be captured by worker-dispatched
/// closures without lifetime gymnastics.
struct SelectorContext {
    store: Arc<NodeStore>,
    annotator: Arc<dyn Annotator>,
    scorer: Arc<dyn PuctScorer>,
    roots: Option<Arc<dyn TranspositionRoots>>,
    reuse: Option<Arc<dyn ReuseEvaluator>>,
    pool: Arc<dyn WorkerPool>,
    config: SelectorConfig,
}

/// The public orchestrator: descends the tree and assembles one batchlet.
pub struct ParallelLeafSelector {
    ctx: Arc<SelectorContext>,
}

impl ParallelLeafSelector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<NodeStore>,
        annotator: Arc<dyn Annotator>,
        scorer: Arc<dyn PuctScorer>,
        roots: Option<Arc<dyn TranspositionRoots>>,
        reuse: Option<Arc<dyn ReuseEvaluator>>,
        pool: Arc<dyn WorkerPool>,
        config: SelectorConfig,
    ) -> Self {
        assert!(
            config.transposition_mode != TranspositionMode::SharedSubtree || roots.is_some(),
            "SharedSubtree transposition mode requires a transposition roots map"
        );

        ParallelLeafSelector {
            ctx: Arc::new(SelectorContext {
                store,
                annotator,
                scorer,
                roots,
                reuse,
                pool,
                config,
            }),
        }
    }

    /// Returns a set of distinct leaf handles whose combined reservation
    /// equals `target_visits`; every leaf is freshly unvisited, terminal,
    /// or transposition-linked. Must be called with exclusive ownership of
    /// `selector` for the duration of this call.
    pub fn select_new_leaf_batchlet(
        &self,
        root: NodeHandle,
        target_visits: u32,
        v_loss_boost: f32,
        selector: SelectorId,
    ) -> Vec<NodeHandle> {
        let out = Arc::new(Mutex::new(Vec::with_capacity(self.ctx.config.leaf_list_capacity(target_visits))));
        let barrier = BatchBarrier::new();

        let span = debug_span!("select_new_leaf_batchlet", root = root.index(), target_visits, ?selector);
        let _entered = span.enter();

        gather(self.ctx.clone(), root, target_visits, selector, v_loss_boost, out.clone(), barrier.clone());

        barrier.wait();

        out.lock().unwrap().clone()
    }

    /// Clears the reuse-other-tree evaluator's cached state. Does not touch
    /// the node arena itself, which is the caller's to clear between
    /// searches.
    pub fn reset(&self) {
        if let Some(reuse) = &self.ctx.reuse {
            reuse.reset();
        }
    }

    pub fn shutdown(&self) -> Result<(), SelectorError> {
        self.ctx.pool.shutdown()
    }

    pub fn reuse_hits(&self) -> u64 {
        self.ctx.reuse.as_ref().map(|r| r.hits()).unwrap_or(0)
    }

    pub fn reuse_misses(&self) -> u64 {
        self.ctx.reuse.as_ref().map(|r| r.misses()).unwrap_or(0)
    }
}

/// Internal recursion. One call corresponds to exactly one unit already
/// accounted for on `barrier` — either the seed-of-1 for the root call, or
/// a unit added by this function's own caller just before dispatching to
/// a worker — and every return path calls `finish_one` exactly once,
/// except the master-swap tail call, which hands the same unit on to
/// `gather(m, ...)` without finishing it here.
fn gather(
    ctx: Arc<SelectorContext>,
    node: NodeHandle,
    k: u32,
    selector: SelectorId,
    v_loss_boost: f32,
    out: Arc<Mutex<Vec<NodeHandle>>>,
    barrier: Arc<BatchBarrier>,
) {
    if k == 0 {
        barrier.finish_one();
        return;
    }

    // Step 1: a deferred transposition owns no children yet.
    if node.is_deferred() {
        transposition::materialize_deferred_children(&node);
    }

    // Step 2: base cases.
    if node.n() == 0 || node.terminal() != Terminal::Unknown || node.is_transposition_linked() {
        visit_leaf(&ctx, &node, k, selector, &out);
        barrier.finish_one();
        return;
    }

    // Step 3: shared-subtree transposition arbitration.
    if ctx.config.transposition_mode == TranspositionMode::SharedSubtree {
        if let Some(roots) = ctx.roots.as_deref() {
            match transposition::arbitrate(&node, roots) {
                Arbitration::Continue => {}
                Arbitration::TreatAsLeaf { override_v } => {
                    node.set_override_v(Some(override_v));
                    visit_leaf(&ctx, &node, k, selector, &out);
                    barrier.finish_one();
                    return;
                }
                Arbitration::Abandon => {
                    let _span = debug_span!("shared_subtree_abandon", node = node.index(), k).entered();
                    if let Some(parent) = node.parent() {
                        virtual_loss::release_path_from(&ctx.store, parent.index(), selector, k as i64);
                    }
                    trace!("releasing reservation along abandoned path");
                    barrier.finish_one();
                    return;
                }
                Arbitration::SwapTo(m) => {
                    let _span = debug_span!("shared_subtree_master_swap", from = node.index(), to = m.index()).entered();
                    debug!("swapping in favor of existing master");
                    transposition::master_swap(&node, &m);
                    drop(_span);
                    gather(ctx, m, k, selector, v_loss_boost, out, barrier);
                    return;
                }
            }
        }
    }

    // Step 4: ensure annotated, compute the examination window.
    let _ = ensure_annotated(&ctx, &node);
    let window = node.num_policy_moves().min(node.num_children_visited() + k);

    if window == 0 {
        visit_leaf(&ctx, &node, k, selector, &out);
        barrier.finish_one();
        return;
    }
    node.widen_children_visited(window);

    // Step 5: PUCT visit distribution over the window.
    let slots = node.children_slice();
    let window = window as usize;
    let priors: Vec<f32> = slots[..window].iter().map(|s| s.prior).collect();
    let existing: Vec<Option<ChildStats>> = slots[..window]
        .iter()
        .map(|s| s.child.map(|c| ChildStats { n: node.handle_for(c).n(), w: node.handle_for(c).w() }))
        .collect();
    let in_flight: Vec<i64> = slots[..window]
        .iter()
        .map(|s| s.child.map(|c| node.handle_for(c).n_in_flight(selector)).unwrap_or(0))
        .collect();

    let counts = puct::distribute_visits(
        ctx.scorer.as_ref(),
        &priors,
        &existing,
        &in_flight,
        node.n(),
        k,
        v_loss_boost,
        ctx.config.cpuct_multiplier,
    );

    // Step 6: walk expanded children in index order.
    barrier.add_expected(window);
    for (offset, &count) in counts.iter().enumerate() {
        if count == 0 {
            barrier.finish_one();
            continue;
        }

        let child = node.create_child(offset as u32).expect("node carries a child descriptor by this point");
        virtual_loss::reserve(&ctx.store, node.index(), selector, count as i64);

        let dispatch = ctx.config.select_parallel_enabled && count >= ctx.config.select_parallel_threshold;
        if dispatch {
            let ctx = ctx.clone();
            let out = out.clone();
            let barrier = barrier.clone();
            ctx.pool.queue(Box::new(move || {
                // `gather` finishes its own barrier unit on every normal return
                // path; if it panics partway through, that unit is never
                // finished and `wait()` would block forever. Catch it here,
                // finish the unit ourselves, then re-raise so the pool's own
                // `catch_unwind` still logs the fault.
                let barrier_on_panic = barrier.clone();
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    gather(ctx, child, count, selector, v_loss_boost, out, barrier);
                }));
                if let Err(panic) = outcome {
                    barrier_on_panic.finish_one();
                    std::panic::resume_unwind(panic);
                }
            }));
        } else {
            gather(ctx.clone(), child, count, selector, v_loss_boost, out.clone(), barrier.clone());
        }
    }

    barrier.finish_one();
}

/// Reserve `k` on `node`; only the descent that observes a zero prior
/// value — the first to claim this node in the batchlet — emits it.
fn visit_leaf(ctx: &SelectorContext, node: &NodeHandle, k: u32, selector: SelectorId, out: &Mutex<Vec<NodeHandle>>) {
    let prior = virtual_loss::reserve(&ctx.store, node.index(), selector, k as i64);
    transposition::mark_visited_if_transposition_linked(node);

    if prior == 0 {
        let _ = ensure_annotated(ctx, node);
        out.lock().unwrap().push(node.clone());
    }
}

/// Like [`NodeHandle::ensure_annotated`], but first gives the reuse-other-tree
/// evaluator (if any) a chance to short-circuit the computation by borrowing
/// an annotation from elsewhere. Falls back to `ctx.annotator` on a miss, on
/// an incompatible-network-definition rejection, or when no evaluator is
/// configured.
fn ensure_annotated(ctx: &SelectorContext, node: &NodeHandle) -> Annotation {
    if let Some(existing) = node.annotation() {
        return existing;
    }

    if let Some(reuse) = ctx.reuse.as_deref() {
        match reuse.try_evaluate(node) {
            Ok(Some(annotation)) => {
                node.store().with_node(node.index(), |n| n.set_annotation_if_absent(annotation));
                return node.annotation().expect("annotation was just stored");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(node = node.index(), %err, "reuse evaluator rejected node, falling back to fresh annotation");
            }
        }
    }

    node.ensure_annotated(ctx.annotator.as_ref())
}
