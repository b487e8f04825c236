use thiserror::Error;

/// Boundary errors raised by the core. Tree-corruption invariants are not
/// represented here: they are fatal in debug builds via `debug_assert!`/
/// `assert!` rather than a recoverable `Result`, in the same vein as the
/// `assert!`-based invariant checks in `muzero/step.rs`.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// The reuse-other-tree evaluator probed a node and found the other
    /// tree's iterator context was built against an incompatible network
    /// definition.
    #[error("reuse-other-tree evaluator found an incompatible network definition")]
    IncompatibleReuse,

    /// The worker pool could not be torn down cleanly.
    #[error("worker pool failed to shut down: {0}")]
    PoolShutdown(String),
}
