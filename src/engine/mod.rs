//! Engine layer: everything that talks to the Computation Engine.
//!
//! - [`types`]: The engine boundary traits and the raw result tree.
//! - [`session`]: Lazy, single-flight initialization and queued evaluation.
//! - [`normalize`]: Flattening of raw result trees into named sequences.

pub mod normalize;
pub mod session;
pub mod types;

pub use normalize::{normalize, NormalizedResult};
pub use session::{EngineSession, SessionPhase, SessionStats};
pub use types::{
    ComputationEngine, EngineFactory, EngineFailure, JsonEngine, JsonEvaluator, RawResultTree,
    RawValue,
};
