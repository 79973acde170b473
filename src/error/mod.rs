//! Error types for the marshaling layer.
//!
//! - [`StatError`]: Every failure a caller can observe, from request validation
//!   through engine initialization, evaluation and result mapping.
//! - [`ErrorContext`]: Structured error metadata (code, retryability, severity).

pub mod error_context;
pub mod stat_error;

pub use error_context::{ErrorCode, ErrorContext, ErrorRetryability, ErrorSeverity};
pub use stat_error::StatError;

/// Convenience alias for marshaling-layer results.
pub type StatResult<T> = Result<T, StatError>;
