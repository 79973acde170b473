use std::sync::Arc;

use serde_json::Value;

use crate::config::EngineConfig;

// ================================
// Engine boundary
// ================================

/// Failure reported by the engine boundary. Carries the engine's diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An embedded statistical runtime instance.
///
/// Implementations are assumed single-threaded internally; the session decides
/// whether evaluations are queued.
#[async_trait::async_trait]
pub trait ComputationEngine: Send + Sync {
    /// Bring the runtime up. Called once per instance.
    async fn bootstrap(&self) -> Result<(), EngineFailure>;

    /// Install capability packages, in order.
    async fn install_capabilities(&self, packages: &[String]) -> Result<(), EngineFailure>;

    /// Evaluate program text and return its result tree.
    async fn evaluate(&self, program: &str) -> Result<RawResultTree, EngineFailure>;
}

impl std::fmt::Debug for dyn ComputationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ComputationEngine")
    }
}

/// Creates engine instances for a session.
#[async_trait::async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(
        &self,
        config: &EngineConfig,
    ) -> Result<Arc<dyn ComputationEngine>, EngineFailure>;
}

/// A runtime whose results arrive in the JSON conversion shape
/// (`{"type": ..., "names": ..., "values": ...}`).
#[async_trait::async_trait]
pub trait JsonEvaluator: Send + Sync {
    async fn bootstrap(&self) -> Result<(), EngineFailure>;

    async fn install_capabilities(&self, packages: &[String]) -> Result<(), EngineFailure>;

    async fn evaluate_json(&self, program: &str) -> Result<Value, EngineFailure>;
}

/// Adapts a [`JsonEvaluator`] to [`ComputationEngine`].
pub struct JsonEngine<E> {
    inner: E,
}

impl<E: JsonEvaluator> JsonEngine<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<E: JsonEvaluator> ComputationEngine for JsonEngine<E> {
    async fn bootstrap(&self) -> Result<(), EngineFailure> {
        self.inner.bootstrap().await
    }

    async fn install_capabilities(&self, packages: &[String]) -> Result<(), EngineFailure> {
        self.inner.install_capabilities(packages).await
    }

    async fn evaluate(&self, program: &str) -> Result<RawResultTree, EngineFailure> {
        let value = self.inner.evaluate_json(program).await?;
        RawResultTree::from_json(&value)
            .map_err(|e| EngineFailure::new(format!("unreadable engine result: {}", e)))
    }
}

// ================================
// Result tree
// ================================

/// One element of an engine vector.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Bool(bool),
    Text(String),
    /// `NA`, `NULL` or a value with no numeric reading.
    Missing,
}

impl RawValue {
    pub fn to_f64(&self) -> f64 {
        match self {
            RawValue::Number(n) => *n,
            RawValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            RawValue::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            RawValue::Missing => f64::NAN,
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Missing),
            Value::Bool(b) => RawValue::Bool(*b),
            Value::String(s) => RawValue::Text(s.clone()),
            _ => RawValue::Missing,
        }
    }
}

/// The engine's dynamically shaped response.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResultTree {
    /// Name-indexed collection of child trees. `names` may be absent or shorter
    /// than `values`.
    List {
        names: Option<Vec<String>>,
        values: Vec<RawResultTree>,
    },
    /// Atomic vector: the leaf sequence.
    Vector {
        type_name: String,
        names: Option<Vec<String>>,
        values: Vec<RawValue>,
    },
}

impl RawResultTree {
    /// Named list in the given order.
    pub fn list<N: Into<String>>(entries: Vec<(N, RawResultTree)>) -> Self {
        let (names, values): (Vec<String>, Vec<RawResultTree>) =
            entries.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        RawResultTree::List {
            names: Some(names),
            values,
        }
    }

    /// Unnamed single-child wrapper.
    pub fn wrap(inner: RawResultTree) -> Self {
        RawResultTree::List {
            names: None,
            values: vec![inner],
        }
    }

    pub fn doubles(values: Vec<f64>) -> Self {
        RawResultTree::Vector {
            type_name: "double".to_string(),
            names: None,
            values: values.into_iter().map(RawValue::Number).collect(),
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self::doubles(vec![value])
    }

    pub fn is_list(&self) -> bool {
        matches!(self, RawResultTree::List { .. })
    }

    /// First child whose name matches. Vectors have no children.
    pub fn child(&self, name: &str) -> Option<&RawResultTree> {
        match self {
            RawResultTree::List {
                names: Some(names),
                values,
            } => names
                .iter()
                .position(|n| n == name)
                .and_then(|idx| values.get(idx)),
            _ => None,
        }
    }

    /// Parse the JSON conversion shape of an engine object.
    ///
    /// Tagged objects (`{"type": "list", "names": [...], "values": [...]}`) are
    /// read structurally. Untagged JSON is accepted too: arrays of scalars and
    /// bare scalars become double vectors, arrays of objects become unnamed
    /// lists and plain objects become named lists.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                Some(type_name) => Self::from_tagged(type_name, map),
                None => {
                    let mut names = Vec::with_capacity(map.len());
                    let mut values = Vec::with_capacity(map.len());
                    for (k, v) in map {
                        names.push(k.clone());
                        values.push(Self::from_json(v)?);
                    }
                    Ok(RawResultTree::List {
                        names: Some(names),
                        values,
                    })
                }
            },
            Value::Array(items) if items.iter().any(|v| v.is_object() || v.is_array()) => {
                let values = items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RawResultTree::List {
                    names: None,
                    values,
                })
            }
            Value::Array(items) => Ok(RawResultTree::Vector {
                type_name: "double".to_string(),
                names: None,
                values: items.iter().map(RawValue::from_json).collect(),
            }),
            Value::Null => Ok(RawResultTree::Vector {
                type_name: "null".to_string(),
                names: None,
                values: Vec::new(),
            }),
            scalar => Ok(RawResultTree::Vector {
                type_name: "double".to_string(),
                names: None,
                values: vec![RawValue::from_json(scalar)],
            }),
        }
    }

    fn from_tagged(type_name: &str, map: &serde_json::Map<String, Value>) -> Result<Self, String> {
        let names = match map.get("names") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|n| n.as_str().unwrap_or_default().to_string())
                    .collect(),
            ),
            Some(other) => return Err(format!("'names' must be an array, got {}", other)),
        };
        let items = match map.get("values") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        };

        if type_name == "list" || type_name == "pairlist" {
            let values = items
                .iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(RawResultTree::List { names, values });
        }

        Ok(RawResultTree::Vector {
            type_name: type_name.to_string(),
            names,
            values: items.iter().map(RawValue::from_json).collect(),
        })
    }
}
