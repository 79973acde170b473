//! Rectangular numeric datasets handed to the engine.
//!
//! A [`Dataset`] is validated once at construction: at least one row and one
//! column, every row the same width, every value finite. Column order is
//! significant (each column is a named variable); row order is not.

use serde::Serialize;

use crate::error::{StatError, StatResult};

/// Default variable name for a zero-based column index (`VAR01`, `VAR02`, ...).
pub fn default_column_name(index: usize) -> String {
    format!("VAR{:02}", index + 1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Dataset {
    /// Build a dataset with default column names.
    pub fn new(rows: Vec<Vec<f64>>) -> StatResult<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let columns = (0..width).map(default_column_name).collect();
        Self::with_columns(columns, rows)
    }

    pub fn with_columns(columns: Vec<String>, rows: Vec<Vec<f64>>) -> StatResult<Self> {
        if rows.is_empty() {
            return Err(StatError::Validation("dataset has no rows".into()));
        }
        if columns.is_empty() {
            return Err(StatError::Validation("dataset has no columns".into()));
        }
        for (r, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(StatError::Validation(format!(
                    "row {} has {} values, expected {}",
                    r + 1,
                    row.len(),
                    columns.len()
                )));
            }
            if let Some(c) = row.iter().position(|v| !v.is_finite()) {
                return Err(StatError::Validation(format!(
                    "non-finite value {} at row {}, column '{}'",
                    row[c],
                    r + 1,
                    columns[c]
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a dataset from named columns of equal length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> StatResult<Self> {
        let height = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != height) {
            return Err(StatError::Validation(format!(
                "column '{}' has {} values, expected {}",
                name,
                values.len(),
                height
            )));
        }
        let rows = (0..height)
            .map(|r| columns.iter().map(|(_, values)| values[r]).collect())
            .collect();
        let names = columns.into_iter().map(|(name, _)| name).collect();
        Self::with_columns(names, rows)
    }

    /// Keep only the named variables, in the order given.
    pub fn select(&self, names: &[&str]) -> StatResult<Self> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| StatError::Validation(format!("unknown variable '{}'", name)))?;
            indices.push(idx);
        }
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect();
        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        Self::with_columns(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.columns.len() {
            return None;
        }
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    pub(crate) fn require_columns(&self, min: usize, procedure: &str) -> StatResult<()> {
        if self.column_count() < min {
            return Err(StatError::Validation(format!(
                "{} requires at least {} columns, got {}",
                procedure,
                min,
                self.column_count()
            )));
        }
        Ok(())
    }

    pub(crate) fn require_rows(&self, min: usize, procedure: &str) -> StatResult<()> {
        if self.row_count() < min {
            return Err(StatError::Validation(format!(
                "{} requires at least {} rows, got {}",
                procedure,
                min,
                self.row_count()
            )));
        }
        Ok(())
    }
}
