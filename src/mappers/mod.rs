//! Procedure result mappers.
//!
//! Each mapper turns a [`NormalizedResult`] into one typed, immutable result
//! record. Mappers own all procedure-specific shape knowledge: which outputs
//! are scalars, which are per-variable sequences that must line up, and which
//! are column-major matrices.

pub mod correlation;
pub mod descriptive;
pub mod factor;
pub mod reliability;

use serde::Serialize;

use crate::dataset::default_column_name;
use crate::engine::NormalizedResult;
use crate::error::{StatError, StatResult};
use crate::program::ProcedureKind;

pub use correlation::{CorrelationMapper, CorrelationPair, CorrelationResult};
pub use descriptive::{ColumnSummary, DescriptiveMapper, DescriptiveResult};
pub use factor::{
    Communality, FactorAnalysisMapper, FactorAnalysisResult, FactorLoadings, FactorVariance,
    KmoRating,
};
pub use reliability::{AlphaRating, ItemTotalStatistics, ReliabilityMapper, ReliabilityResult};

/// Conventional two-sided significance level.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Maps normalized engine output for one procedure.
pub trait ResultMapper {
    type Output;

    const KIND: ProcedureKind;

    /// Every output name [`map`](Self::map) reads.
    fn required_outputs() -> &'static [&'static str];

    /// Build the typed record. `variables` names the dataset columns in order.
    fn map(result: &NormalizedResult, variables: &[String]) -> StatResult<Self::Output>;
}

/// Result of any supported procedure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "procedure", rename_all = "snake_case")]
pub enum ProcedureResult {
    Reliability(ReliabilityResult),
    FactorAnalysis(FactorAnalysisResult),
    Correlation(CorrelationResult),
    Descriptive(DescriptiveResult),
}

impl ProcedureResult {
    pub fn kind(&self) -> ProcedureKind {
        match self {
            ProcedureResult::Reliability(_) => ProcedureKind::Reliability,
            ProcedureResult::FactorAnalysis(_) => ProcedureKind::FactorAnalysis,
            ProcedureResult::Correlation(_) => ProcedureKind::Correlation,
            ProcedureResult::Descriptive(_) => ProcedureKind::Descriptive,
        }
    }
}

/// Required outputs of the mapper paired with `kind`.
pub fn required_outputs(kind: ProcedureKind) -> &'static [&'static str] {
    match kind {
        ProcedureKind::Reliability => ReliabilityMapper::required_outputs(),
        ProcedureKind::FactorAnalysis => FactorAnalysisMapper::required_outputs(),
        ProcedureKind::Correlation => CorrelationMapper::required_outputs(),
        ProcedureKind::Descriptive => DescriptiveMapper::required_outputs(),
    }
}

/// Dispatch to the mapper paired with `kind`.
pub fn map_procedure(
    kind: ProcedureKind,
    result: &NormalizedResult,
    variables: &[String],
) -> StatResult<ProcedureResult> {
    Ok(match kind {
        ProcedureKind::Reliability => {
            ProcedureResult::Reliability(ReliabilityMapper::map(result, variables)?)
        }
        ProcedureKind::FactorAnalysis => {
            ProcedureResult::FactorAnalysis(FactorAnalysisMapper::map(result, variables)?)
        }
        ProcedureKind::Correlation => {
            ProcedureResult::Correlation(CorrelationMapper::map(result, variables)?)
        }
        ProcedureKind::Descriptive => {
            ProcedureResult::Descriptive(DescriptiveMapper::map(result, variables)?)
        }
    })
}

// ================================
// Shared shape helpers
// ================================

pub(crate) fn shape_error(kind: ProcedureKind, message: String) -> StatError {
    tracing::warn!(procedure = %kind, error = %message, "engine output has unexpected shape");
    StatError::data_shape(kind.as_str(), message)
}

/// First value of a scalar output, or `default` when absent.
pub(crate) fn scalar_or(result: &NormalizedResult, name: &str, default: f64) -> f64 {
    result.scalar(name).unwrap_or(default)
}

/// A non-negative integral count output.
pub(crate) fn count(
    kind: ProcedureKind,
    result: &NormalizedResult,
    name: &str,
) -> StatResult<Option<usize>> {
    match result.scalar(name) {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as usize)),
        Some(v) => Err(shape_error(
            kind,
            format!("'{}' must be a non-negative integer, got {}", name, v),
        )),
    }
}

/// Number of per-variable rows: the engine's own count when reported, else the
/// variable names, else the first non-empty per-variable sequence.
pub(crate) fn resolve_rows(
    kind: ProcedureKind,
    reported: Option<(&str, usize)>,
    variables: &[String],
    result: &NormalizedResult,
    sequences: &[&str],
) -> StatResult<usize> {
    if let Some((name, rows)) = reported {
        if !variables.is_empty() && variables.len() != rows {
            return Err(shape_error(
                kind,
                format!(
                    "'{}' reports {} but the dataset has {} variables",
                    name,
                    rows,
                    variables.len()
                ),
            ));
        }
        return Ok(rows);
    }
    if !variables.is_empty() {
        return Ok(variables.len());
    }
    Ok(sequences
        .iter()
        .map(|name| result.values(name).len())
        .find(|len| *len > 0)
        .unwrap_or(0))
}

/// A per-row sequence: exactly `rows` long, or empty (defaults to zeros).
pub(crate) fn per_row(
    kind: ProcedureKind,
    result: &NormalizedResult,
    name: &str,
    rows: usize,
) -> StatResult<Vec<f64>> {
    let values = result.values(name);
    if values.is_empty() {
        return Ok(vec![0.0; rows]);
    }
    if values.len() != rows {
        return Err(shape_error(
            kind,
            format!("'{}' has {} values, expected {}", name, values.len(), rows),
        ));
    }
    Ok(values.to_vec())
}

/// A column-major `rows × cols` matrix split into rows. Empty when absent.
pub(crate) fn column_major(
    kind: ProcedureKind,
    result: &NormalizedResult,
    name: &str,
    rows: usize,
    cols: usize,
) -> StatResult<Vec<Vec<f64>>> {
    let values = result.values(name);
    if values.is_empty() {
        return Ok(Vec::new());
    }
    if rows.checked_mul(cols) != Some(values.len()) {
        return Err(shape_error(
            kind,
            format!(
                "'{}' has {} values, expected a {}x{} matrix",
                name,
                values.len(),
                rows,
                cols
            ),
        ));
    }
    Ok((0..rows)
        .map(|r| (0..cols).map(|c| values[c * rows + r]).collect())
        .collect())
}

pub(crate) fn variable_name(variables: &[String], index: usize) -> String {
    variables
        .get(index)
        .cloned()
        .unwrap_or_else(|| default_column_name(index))
}
