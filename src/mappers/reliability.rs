use serde::Serialize;

use super::{count, per_row, resolve_rows, scalar_or, variable_name, ResultMapper};
use crate::engine::NormalizedResult;
use crate::error::StatResult;
use crate::program::outputs::reliability::*;
use crate::program::ProcedureKind;

/// Corrected item-total correlation below which an item is flagged.
pub const WEAK_ITEM_TOTAL_CORRELATION: f64 = 0.3;

/// Qualitative reading of Cronbach's alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaRating {
    Excellent,
    Good,
    Acceptable,
    Questionable,
    Poor,
}

impl AlphaRating {
    pub fn from_alpha(alpha: f64) -> Self {
        if alpha >= 0.9 {
            AlphaRating::Excellent
        } else if alpha >= 0.8 {
            AlphaRating::Good
        } else if alpha >= 0.7 {
            AlphaRating::Acceptable
        } else if alpha >= 0.6 {
            AlphaRating::Questionable
        } else {
            AlphaRating::Poor
        }
    }

    /// Whether the scale is reliable enough for further analysis.
    pub fn is_acceptable(&self) -> bool {
        matches!(
            self,
            AlphaRating::Excellent | AlphaRating::Good | AlphaRating::Acceptable
        )
    }
}

/// Item-total statistics for one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemTotalStatistics {
    pub name: String,
    pub scale_mean_if_deleted: f64,
    pub scale_variance_if_deleted: f64,
    pub corrected_item_total_correlation: f64,
    pub alpha_if_deleted: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReliabilityResult {
    pub alpha: f64,
    pub raw_alpha: f64,
    pub standardized_alpha: f64,
    /// `None` when the engine did not report an item count.
    pub item_count: Option<usize>,
    /// One row per item, in column order.
    pub items: Vec<ItemTotalStatistics>,
}

impl ReliabilityResult {
    pub fn rating(&self) -> AlphaRating {
        AlphaRating::from_alpha(self.alpha)
    }

    pub fn weak_items(&self) -> Vec<&ItemTotalStatistics> {
        self.items
            .iter()
            .filter(|item| item.corrected_item_total_correlation < WEAK_ITEM_TOTAL_CORRELATION)
            .collect()
    }

    /// Items whose removal would raise alpha.
    pub fn items_improving_alpha(&self) -> Vec<&ItemTotalStatistics> {
        self.items
            .iter()
            .filter(|item| item.alpha_if_deleted > self.alpha)
            .collect()
    }
}

pub struct ReliabilityMapper;

const PER_ITEM: [&str; 4] = [
    SCALE_MEAN_DELETED,
    SCALE_VAR_DELETED,
    CORRECTED_ITEM_TOTAL,
    ALPHA_IF_DELETED,
];

impl ResultMapper for ReliabilityMapper {
    type Output = ReliabilityResult;

    const KIND: ProcedureKind = ProcedureKind::Reliability;

    fn required_outputs() -> &'static [&'static str] {
        &[
            RAW_ALPHA,
            STD_ALPHA,
            N_ITEMS,
            SCALE_MEAN_DELETED,
            SCALE_VAR_DELETED,
            CORRECTED_ITEM_TOTAL,
            ALPHA_IF_DELETED,
        ]
    }

    fn map(result: &NormalizedResult, variables: &[String]) -> StatResult<ReliabilityResult> {
        let kind = Self::KIND;
        let raw_alpha = scalar_or(result, RAW_ALPHA, 0.0);
        let item_count = count(kind, result, N_ITEMS)?;
        let rows = resolve_rows(
            kind,
            item_count.map(|n| (N_ITEMS, n)),
            variables,
            result,
            &PER_ITEM,
        )?;

        let means = per_row(kind, result, SCALE_MEAN_DELETED, rows)?;
        let variances = per_row(kind, result, SCALE_VAR_DELETED, rows)?;
        let correlations = per_row(kind, result, CORRECTED_ITEM_TOTAL, rows)?;
        let alphas = per_row(kind, result, ALPHA_IF_DELETED, rows)?;

        let items = (0..rows)
            .map(|i| ItemTotalStatistics {
                name: variable_name(variables, i),
                scale_mean_if_deleted: means[i],
                scale_variance_if_deleted: variances[i],
                corrected_item_total_correlation: correlations[i],
                alpha_if_deleted: alphas[i],
            })
            .collect();

        Ok(ReliabilityResult {
            alpha: raw_alpha,
            raw_alpha,
            standardized_alpha: scalar_or(result, STD_ALPHA, 0.0),
            item_count,
            items,
        })
    }
}
