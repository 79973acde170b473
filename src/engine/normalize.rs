//! Result tree normalization.
//!
//! The engine nests and wraps its outputs differently across procedures and
//! versions. [`normalize`] looks every declared name up at the top level,
//! peels single-child wrappers and flattens what is left into `Vec<f64>`.
//! Absent names become empty sequences; deciding whether that is fatal is
//! left to the mappers.

use std::collections::HashMap;

use super::types::{RawResultTree, RawValue};

/// Declared output name → flat numeric sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedResult {
    declared: Vec<String>,
    values: HashMap<String, Vec<f64>>,
}

impl NormalizedResult {
    /// Ordered declared names.
    pub fn declared(&self) -> &[String] {
        &self.declared
    }

    /// Sequence for a declared name; empty when the engine omitted it.
    ///
    /// # Panics
    ///
    /// Panics if `name` was never declared: the template and the mapper
    /// reading it disagree, which no input can repair.
    pub fn values(&self, name: &str) -> &[f64] {
        match self.values.get(name) {
            Some(values) => values,
            None => panic!(
                "output '{}' was not declared by the program (declared: {:?})",
                name, self.declared
            ),
        }
    }

    /// First element of a declared sequence, if any.
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.values(name).first().copied()
    }

    pub fn is_present(&self, name: &str) -> bool {
        !self.values(name).is_empty()
    }
}

/// Flatten `tree` against the declared output names.
pub fn normalize(tree: &RawResultTree, declared: &[&str]) -> NormalizedResult {
    let root = unwrap_root(tree);
    let mut values = HashMap::with_capacity(declared.len());
    for name in declared {
        let sequence = match root.child(name) {
            Some(node) => flatten(unwrap_passthrough(node)),
            None => {
                tracing::debug!(output = %name, "declared output absent from engine result");
                Vec::new()
            }
        };
        values.insert((*name).to_string(), sequence);
    }
    NormalizedResult {
        declared: declared.iter().map(|n| (*n).to_string()).collect(),
        values,
    }
}

/// Descend through single-child lists that carry no sibling values.
fn unwrap_passthrough(mut node: &RawResultTree) -> &RawResultTree {
    while let RawResultTree::List { values, .. } = node {
        if values.len() != 1 {
            break;
        }
        node = &values[0];
    }
    node
}

/// Root wrappers are only peeled while unnamed; a named one-entry root is the
/// output collection itself.
fn unwrap_root(mut node: &RawResultTree) -> &RawResultTree {
    while let RawResultTree::List { values, names } = node {
        let named = names
            .as_ref()
            .is_some_and(|n| n.iter().any(|s| !s.is_empty()));
        if named || values.len() != 1 || !values[0].is_list() {
            break;
        }
        node = &values[0];
    }
    node
}

fn flatten(node: &RawResultTree) -> Vec<f64> {
    let mut out = Vec::new();
    flatten_into(node, &mut out);
    out
}

fn flatten_into(node: &RawResultTree, out: &mut Vec<f64>) {
    match node {
        RawResultTree::Vector { values, .. } => out.extend(values.iter().map(RawValue::to_f64)),
        RawResultTree::List { values, .. } => {
            for child in values {
                flatten_into(unwrap_passthrough(child), out);
            }
        }
    }
}
