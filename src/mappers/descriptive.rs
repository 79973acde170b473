use serde::Serialize;

use super::{count, per_row, resolve_rows, variable_name, ResultMapper};
use crate::engine::NormalizedResult;
use crate::error::StatResult;
use crate::program::outputs::descriptive::*;
use crate::program::ProcedureKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl ColumnSummary {
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveResult {
    pub observations: Option<usize>,
    pub columns: Vec<ColumnSummary>,
}

impl DescriptiveResult {
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub struct DescriptiveMapper;

const PER_COLUMN: [&str; 5] = [MEAN, SD, MIN, MAX, MEDIAN];

impl ResultMapper for DescriptiveMapper {
    type Output = DescriptiveResult;

    const KIND: ProcedureKind = ProcedureKind::Descriptive;

    fn required_outputs() -> &'static [&'static str] {
        &[MEAN, SD, MIN, MAX, MEDIAN, N]
    }

    fn map(result: &NormalizedResult, variables: &[String]) -> StatResult<DescriptiveResult> {
        let kind = Self::KIND;
        let rows = resolve_rows(kind, None, variables, result, &PER_COLUMN)?;

        let mean = per_row(kind, result, MEAN, rows)?;
        let sd = per_row(kind, result, SD, rows)?;
        let min = per_row(kind, result, MIN, rows)?;
        let max = per_row(kind, result, MAX, rows)?;
        let median = per_row(kind, result, MEDIAN, rows)?;

        let columns = (0..rows)
            .map(|i| ColumnSummary {
                name: variable_name(variables, i),
                mean: mean[i],
                sd: sd[i],
                min: min[i],
                max: max[i],
                median: median[i],
            })
            .collect();

        Ok(DescriptiveResult {
            observations: count(kind, result, N)?,
            columns,
        })
    }
}
