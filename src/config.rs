//! Engine and session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StatError, StatResult};

/// Settings handed to [`EngineFactory::create`](crate::engine::EngineFactory::create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_service_worker_url")]
    pub service_worker_url: String,
}

fn default_base_url() -> String {
    "/webr/".to_string()
}

fn default_service_worker_url() -> String {
    "/webr-serviceworker.js".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            base_url: default_base_url(),
            service_worker_url: default_service_worker_url(),
        }
    }
}

/// Engine session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Capability packages installed once, in order, during initialization.
    #[serde(default = "default_capability_packages")]
    pub capability_packages: Vec<String>,
    /// Queue evaluations through one gate instead of issuing them concurrently.
    #[serde(default = "default_serialize_evaluations")]
    pub serialize_evaluations: bool,
    /// Upper bound for a single evaluation. `None` waits indefinitely. A timed
    /// out program keeps the evaluation gate until the engine returns.
    #[serde(default)]
    pub evaluation_timeout_secs: Option<u64>,
}

fn default_capability_packages() -> Vec<String> {
    vec!["psych".to_string(), "lavaan".to_string(), "corrplot".to_string()]
}

fn default_serialize_evaluations() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            engine: EngineConfig::default(),
            capability_packages: default_capability_packages(),
            serialize_evaluations: default_serialize_evaluations(),
            evaluation_timeout_secs: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> StatResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| StatError::Validation(format!("invalid session config: {}", e)))
    }

    pub fn evaluation_timeout(&self) -> Option<Duration> {
        self.evaluation_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
