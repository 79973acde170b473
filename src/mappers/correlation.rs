use serde::Serialize;

use super::{column_major, count, resolve_rows, variable_name, ResultMapper, SIGNIFICANCE_LEVEL};
use crate::engine::NormalizedResult;
use crate::error::StatResult;
use crate::program::outputs::correlation::*;
use crate::program::ProcedureKind;

/// Pairwise Pearson correlations. Both matrices are square and symmetric,
/// indexed by `variables`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub variables: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
    pub p_values: Vec<Vec<f64>>,
    pub observations: Option<usize>,
}

/// One off-diagonal entry of the upper triangle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
    pub p_value: f64,
}

impl CorrelationPair {
    pub fn is_significant(&self) -> bool {
        self.p_value < SIGNIFICANCE_LEVEL
    }
}

impl CorrelationResult {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    fn entry(matrix: &[Vec<f64>], i: usize, j: usize) -> Option<f64> {
        matrix.get(i).and_then(|row| row.get(j)).copied()
    }

    pub fn coefficient(&self, a: &str, b: &str) -> Option<f64> {
        Self::entry(&self.coefficients, self.index_of(a)?, self.index_of(b)?)
    }

    pub fn p_value(&self, a: &str, b: &str) -> Option<f64> {
        Self::entry(&self.p_values, self.index_of(a)?, self.index_of(b)?)
    }

    pub fn is_significant(&self, a: &str, b: &str) -> bool {
        self.p_value(a, b).is_some_and(|p| p < SIGNIFICANCE_LEVEL)
    }

    /// Upper-triangle pairs in variable order.
    pub fn pairs(&self) -> Vec<CorrelationPair> {
        let n = self.variables.len();
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let Some(coefficient) = Self::entry(&self.coefficients, i, j) else {
                    continue;
                };
                pairs.push(CorrelationPair {
                    first: self.variables[i].clone(),
                    second: self.variables[j].clone(),
                    coefficient,
                    p_value: Self::entry(&self.p_values, i, j).unwrap_or(f64::NAN),
                });
            }
        }
        pairs
    }
}

pub struct CorrelationMapper;

impl ResultMapper for CorrelationMapper {
    type Output = CorrelationResult;

    const KIND: ProcedureKind = ProcedureKind::Correlation;

    fn required_outputs() -> &'static [&'static str] {
        &[CORRELATION, P_VALUES, N_COLS, N_OBS]
    }

    fn map(result: &NormalizedResult, variables: &[String]) -> StatResult<CorrelationResult> {
        let kind = Self::KIND;
        let n_cols = count(kind, result, N_COLS)?;
        let n = match (n_cols, variables.is_empty()) {
            (None, true) => {
                let cells = result.values(CORRELATION).len();
                (cells as f64).sqrt() as usize
            }
            _ => resolve_rows(kind, n_cols.map(|n| (N_COLS, n)), variables, result, &[])?,
        };

        Ok(CorrelationResult {
            variables: (0..n).map(|i| variable_name(variables, i)).collect(),
            coefficients: column_major(kind, result, CORRELATION, n, n)?,
            p_values: column_major(kind, result, P_VALUES, n, n)?,
            observations: count(kind, result, N_OBS)?,
        })
    }
}
