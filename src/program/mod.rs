//! Program text generation.
//!
//! - [`serializer`]: Dataset → R matrix literal.
//! - [`template`]: Procedure request → [`ProgramPayload`] with declared outputs.

pub mod serializer;
pub mod template;

pub use serializer::{serialize_matrix, serialize_rows};
pub use template::{
    build_payload, outputs, validate_request, Extraction, FactorAnalysisOptions, ProcedureKind,
    ProcedureParameters, ProcedureRequest, ProgramPayload, Rotation,
};
