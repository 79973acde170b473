//! Matrix serialization into R source text.

use std::fmt::Write as _;

use crate::dataset::Dataset;
use crate::error::{StatError, StatResult};

/// Serialize a dataset as a row-major R matrix literal.
///
/// The literal carries explicit `nrow`/`ncol` so the engine rebuilds the exact
/// layout: `matrix(c(1,2,3,4), nrow=2, ncol=2, byrow=TRUE)`.
pub fn serialize_matrix(dataset: &Dataset) -> StatResult<String> {
    serialize_rows(dataset.rows())
}

/// Serialize raw rows. Fails on empty, ragged or non-finite input instead of
/// emitting text the engine would misread.
pub fn serialize_rows(rows: &[Vec<f64>]) -> StatResult<String> {
    let ncol = rows.first().map(Vec::len).unwrap_or(0);
    if ncol == 0 {
        return Err(StatError::Format("matrix must have at least one row and one column".into()));
    }

    let mut out = String::with_capacity(rows.len() * ncol * 4 + 48);
    out.push_str("matrix(c(");
    for (r, row) in rows.iter().enumerate() {
        if row.len() != ncol {
            return Err(StatError::Format(format!(
                "row {} has {} values, expected {}",
                r + 1,
                row.len(),
                ncol
            )));
        }
        for (c, value) in row.iter().enumerate() {
            if r > 0 || c > 0 {
                out.push(',');
            }
            write_number(&mut out, *value, r, c)?;
        }
    }
    let _ = write!(out, "), nrow={}, ncol={}, byrow=TRUE)", rows.len(), ncol);
    Ok(out)
}

/// Shortest round-trip decimal; scientific notation outside a readable range.
/// `row` and `col` are zero-based and only used in the error.
fn write_number(out: &mut String, value: f64, row: usize, col: usize) -> StatResult<()> {
    if !value.is_finite() {
        return Err(StatError::Format(format!(
            "cannot serialize {} at row {}, column {}",
            value,
            row + 1,
            col + 1
        )));
    }
    let magnitude = value.abs();
    if magnitude == 0.0 {
        out.push('0');
    } else if (1e-5..1e15).contains(&magnitude) {
        let _ = write!(out, "{}", value);
    } else {
        let _ = write!(out, "{:e}", value);
    }
    Ok(())
}
