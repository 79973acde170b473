//! # XStat: a marshaling layer for an embedded statistical runtime
//!
//! `xstat` lets a host application run psychometric and descriptive
//! procedures on an embedded statistical engine (an R runtime compiled to
//! WebAssembly, typically) without knowing anything about its program text or
//! result layout. It provides:
//!
//! - **Matrix serialization**: rectangular numeric datasets rendered as
//!   engine matrix literals, rejecting non-finite values and ragged input.
//! - **Closed procedure templates**: reliability (Cronbach's alpha), factor
//!   analysis, correlation and descriptive statistics, each declaring the
//!   named outputs it produces.
//! - **A lazily initialized engine session**: one engine per session,
//!   single-flight initialization shared by concurrent callers, retry after
//!   failure and a FIFO evaluation gate.
//! - **Result normalization**: engine result trees of varying wrapping depth
//!   flattened into name-addressable numeric sequences.
//! - **Typed result mappers**: immutable records with interpretation helpers
//!   (alpha and KMO ratings, weak items, significant pairs).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xstat::{Dataset, EngineFactory, EngineSession, SessionConfig, StatRunner};
//!
//! async fn alpha(factory: Arc<dyn EngineFactory>) -> xstat::StatResult<f64> {
//!     let session = Arc::new(EngineSession::new(factory, SessionConfig::default()));
//!     let runner = StatRunner::new(session);
//!     let dataset = Dataset::new(vec![
//!         vec![4.0, 5.0, 4.0],
//!         vec![3.0, 3.0, 4.0],
//!         vec![5.0, 4.0, 5.0],
//!     ])?;
//!     Ok(runner.run_reliability(&dataset).await?.alpha)
//! }
//! ```

pub mod api;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod mappers;
pub mod program;

pub use api::StatRunner;
pub use config::{EngineConfig, SessionConfig};
pub use dataset::Dataset;
pub use engine::{
    normalize, ComputationEngine, EngineFactory, EngineFailure, EngineSession, JsonEngine,
    JsonEvaluator, NormalizedResult, RawResultTree, RawValue, SessionPhase, SessionStats,
};
pub use error::{ErrorCode, ErrorContext, StatError, StatResult};
pub use mappers::{
    AlphaRating, CorrelationResult, DescriptiveResult, FactorAnalysisResult, KmoRating,
    ProcedureResult, ReliabilityResult, ResultMapper,
};
pub use program::{
    build_payload, serialize_matrix, Extraction, FactorAnalysisOptions, ProcedureKind,
    ProcedureRequest, ProgramPayload, Rotation,
};
