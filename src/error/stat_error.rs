use thiserror::Error;

use super::error_context::{ErrorCode, ErrorContext};

/// Marshaling-layer errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatError {
    /// Malformed request, raised before any engine interaction.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A value could not be written as program text.
    #[error("Format error: {0}")]
    Format(String),
    /// Engine bootstrap or capability installation failed. The session stays retryable.
    #[error("Engine initialization failed: {0}")]
    Initialization(String),
    /// The engine raised while evaluating a program.
    #[error("Evaluation error in {procedure}: {message}")]
    Evaluation { procedure: String, message: String },
    /// Normalized output did not have the shape a mapper requires.
    #[error("Data shape error in {procedure}: {message}")]
    DataShape { procedure: String, message: String },
}

impl StatError {
    pub fn evaluation(procedure: impl Into<String>, message: impl Into<String>) -> Self {
        StatError::Evaluation {
            procedure: procedure.into(),
            message: message.into(),
        }
    }

    pub fn data_shape(procedure: impl Into<String>, message: impl Into<String>) -> Self {
        StatError::DataShape {
            procedure: procedure.into(),
            message: message.into(),
        }
    }

    /// Re-labels evaluation and shape errors with the procedure that produced them.
    pub fn with_procedure(self, procedure: impl Into<String>) -> Self {
        match self {
            StatError::Evaluation { message, .. } => StatError::evaluation(procedure, message),
            StatError::DataShape { message, .. } => StatError::data_shape(procedure, message),
            other => other,
        }
    }

    /// True for errors the caller can fix by correcting its input.
    pub fn is_validation(&self) -> bool {
        matches!(self, StatError::Validation(_) | StatError::Format(_))
    }

    pub fn procedure(&self) -> Option<&str> {
        match self {
            StatError::Evaluation { procedure, .. } | StatError::DataShape { procedure, .. } => {
                Some(procedure)
            }
            _ => None,
        }
    }

    pub fn context(&self) -> ErrorContext {
        let message = self.to_string();
        let ctx = match self {
            StatError::Validation(_) => {
                ErrorContext::non_retryable(ErrorCode::InputValidationError, message)
            }
            StatError::Format(_) => ErrorContext::non_retryable(ErrorCode::FormatError, message),
            StatError::Initialization(_) => {
                ErrorContext::retryable(ErrorCode::EngineInitializationError, message)
            }
            StatError::Evaluation { message: detail, .. } if detail.starts_with("timed out") => {
                ErrorContext::unknown(ErrorCode::EngineTimeout, message)
            }
            StatError::Evaluation { .. } => {
                ErrorContext::unknown(ErrorCode::EngineEvaluationError, message)
            }
            StatError::DataShape { .. } => {
                ErrorContext::non_retryable(ErrorCode::DataShapeError, message)
            }
        };
        match self.procedure() {
            Some(procedure) => ctx.with_procedure(procedure),
            None => ctx,
        }
    }
}
