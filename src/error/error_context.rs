use serde::{Deserialize, Serialize};

/// Error retryability marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorRetryability {
    Retryable,
    NonRetryable,
    Unknown,
}

/// Error severity marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Fatal,
}

/// Error classification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Request
    InputValidationError,
    FormatError,

    // Engine
    EngineInitializationError,
    EngineEvaluationError,
    EngineTimeout,

    // Result
    DataShapeError,
}

/// Structured error context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub retryability: ErrorRetryability,
    pub severity: ErrorSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ErrorContext {
    pub fn non_retryable(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorRetryability::NonRetryable, message)
    }

    pub fn retryable(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorRetryability::Retryable, message)
    }

    pub fn unknown(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorRetryability::Unknown, message)
    }

    fn new(code: ErrorCode, retryability: ErrorRetryability, message: impl Into<String>) -> Self {
        Self {
            code,
            retryability,
            severity: ErrorSeverity::Error,
            message: message.into(),
            procedure: None,
            metadata: None,
        }
    }

    pub fn with_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.procedure = Some(procedure.into());
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
