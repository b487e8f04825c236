//! Parallel MCTS leaf selector: the component of a search engine that
//! descends a shared tree from a root and returns a batchlet of newly
//! selected leaves for external evaluation. Neural-network evaluation, move
//! generation, and persistence are external collaborators; this crate only
//! implements the selection/accounting core.

pub mod config;
pub mod error;
pub mod external;
pub mod handle;
pub mod ids;
pub mod pool;
pub mod puct;
pub mod selector;
pub mod store;
pub mod transposition;
pub mod virtual_loss;

pub use config::{SelectorConfig, TranspositionMode};
pub use error::SelectorError;
pub use external::{Annotator, NullReuseEvaluator, OtherTreeReuseEvaluator, ReuseCompatibility, ReuseEvaluator, TranspositionRoots};
pub use handle::NodeHandle;
pub use ids::{NodeIndex, SelectorId};
pub use pool::{BatchBarrier, CrossbeamWorkerPool, WorkerPool};
pub use puct::{ChildStats, PuctChildContext, PuctScorer, StandardPuctScorer};
pub use selector::ParallelLeafSelector;
pub use store::{Annotation, ChildSlotView, NodeStats, NodeStore, Terminal};
