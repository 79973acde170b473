use serde::Serialize;

use super::{
    column_major, count, per_row, resolve_rows, scalar_or, shape_error, variable_name,
    ResultMapper, SIGNIFICANCE_LEVEL,
};
use crate::engine::NormalizedResult;
use crate::error::StatResult;
use crate::program::outputs::factor::*;
use crate::program::ProcedureKind;

/// Communality below which a variable is poorly explained by the factors.
pub const WEAK_COMMUNALITY: f64 = 0.4;

/// Minimum KMO for a dataset to be considered factorable.
pub const MIN_FACTORABLE_KMO: f64 = 0.6;

/// Kaiser's labels for the KMO measure of sampling adequacy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KmoRating {
    Marvelous,
    Meritorious,
    Middling,
    Mediocre,
    Unacceptable,
}

impl KmoRating {
    pub fn from_kmo(kmo: f64) -> Self {
        if kmo >= 0.9 {
            KmoRating::Marvelous
        } else if kmo >= 0.8 {
            KmoRating::Meritorious
        } else if kmo >= 0.7 {
            KmoRating::Middling
        } else if kmo >= MIN_FACTORABLE_KMO {
            KmoRating::Mediocre
        } else {
            KmoRating::Unacceptable
        }
    }
}

/// Loadings of one variable on every extracted factor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorLoadings {
    pub variable: String,
    pub loadings: Vec<f64>,
}

impl FactorLoadings {
    /// Index of the factor this variable loads on most strongly (by magnitude).
    pub fn primary_factor(&self) -> Option<usize> {
        self.loadings
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.is_nan())
            .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
            .map(|(i, _)| i)
    }
}

/// Variance explained by one factor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorVariance {
    pub ss_loadings: f64,
    pub proportion: f64,
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Communality {
    pub variable: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorAnalysisResult {
    pub kmo: f64,
    /// `None` when the engine could not run Bartlett's test.
    pub bartlett_p_value: Option<f64>,
    pub factor_count: usize,
    /// One entry per variable. Empty when the engine returned no loadings.
    pub loadings: Vec<FactorLoadings>,
    /// One entry per factor.
    pub variance: Vec<FactorVariance>,
    pub communalities: Vec<Communality>,
}

impl FactorAnalysisResult {
    pub fn kmo_rating(&self) -> KmoRating {
        KmoRating::from_kmo(self.kmo)
    }

    pub fn bartlett_significant(&self) -> bool {
        self.bartlett_p_value
            .is_some_and(|p| p < SIGNIFICANCE_LEVEL)
    }

    pub fn is_factorable(&self) -> bool {
        self.kmo >= MIN_FACTORABLE_KMO && self.bartlett_significant()
    }

    /// Share of total variance explained by all retained factors.
    pub fn total_variance_explained(&self) -> f64 {
        self.variance.last().map(|v| v.cumulative).unwrap_or(0.0)
    }

    pub fn weak_communalities(&self) -> Vec<&Communality> {
        self.communalities
            .iter()
            .filter(|c| c.value < WEAK_COMMUNALITY)
            .collect()
    }
}

pub struct FactorAnalysisMapper;

impl ResultMapper for FactorAnalysisMapper {
    type Output = FactorAnalysisResult;

    const KIND: ProcedureKind = ProcedureKind::FactorAnalysis;

    fn required_outputs() -> &'static [&'static str] {
        &[
            KMO,
            BARTLETT_P,
            N_FACTORS,
            N_VARS,
            LOADINGS,
            SS_LOADINGS,
            PROPORTION_VAR,
            CUMULATIVE_VAR,
            COMMUNALITIES,
        ]
    }

    fn map(result: &NormalizedResult, variables: &[String]) -> StatResult<FactorAnalysisResult> {
        let kind = Self::KIND;
        let n_vars = count(kind, result, N_VARS)?;
        let rows = resolve_rows(
            kind,
            n_vars.map(|n| (N_VARS, n)),
            variables,
            result,
            &[COMMUNALITIES],
        )?;

        let factor_count = match count(kind, result, N_FACTORS)? {
            Some(n) => n,
            None => infer_factor_count(kind, result, rows)?,
        };
        if factor_count > rows {
            return Err(shape_error(
                kind,
                format!(
                    "'{}' reports {} factors for {} variables",
                    N_FACTORS, factor_count, rows
                ),
            ));
        }

        let loadings = column_major(kind, result, LOADINGS, rows, factor_count)?
            .into_iter()
            .enumerate()
            .map(|(i, loadings)| FactorLoadings {
                variable: variable_name(variables, i),
                loadings,
            })
            .collect();

        let ss = per_row(kind, result, SS_LOADINGS, factor_count)?;
        let proportion = per_row(kind, result, PROPORTION_VAR, factor_count)?;
        let cumulative = if result.is_present(CUMULATIVE_VAR) {
            per_row(kind, result, CUMULATIVE_VAR, factor_count)?
        } else {
            running_sum(&proportion)
        };
        let variance = (0..factor_count)
            .map(|f| FactorVariance {
                ss_loadings: ss[f],
                proportion: proportion[f],
                cumulative: cumulative[f],
            })
            .collect();

        let communalities = per_row(kind, result, COMMUNALITIES, rows)?
            .into_iter()
            .enumerate()
            .map(|(i, value)| Communality {
                variable: variable_name(variables, i),
                value,
            })
            .collect();

        Ok(FactorAnalysisResult {
            kmo: scalar_or(result, KMO, 0.0),
            bartlett_p_value: result.scalar(BARTLETT_P).filter(|p| !p.is_nan()),
            factor_count,
            loadings,
            variance,
            communalities,
        })
    }
}

/// Recover the factor count from the loadings when the engine omits it.
fn infer_factor_count(
    kind: ProcedureKind,
    result: &NormalizedResult,
    rows: usize,
) -> StatResult<usize> {
    let per_factor = result.values(SS_LOADINGS).len();
    if per_factor > 0 {
        return Ok(per_factor);
    }
    let loadings = result.values(LOADINGS).len();
    if loadings == 0 {
        return Ok(0);
    }
    if rows == 0 || loadings % rows != 0 {
        return Err(shape_error(
            kind,
            format!(
                "'{}' has {} values, which does not divide into {} variables",
                LOADINGS, loadings, rows
            ),
        ));
    }
    Ok(loadings / rows)
}

fn running_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}
