//! Engine session lifecycle.
//!
//! ```text
//! Uninitialized ──acquire──▶ Initializing ──ok──▶ Ready
//!                               │    ▲
//!                             error  └──acquire── Failed
//!                               ▼
//!                             Failed
//! ```
//!
//! The first caller to find the session `Uninitialized` or `Failed` claims an
//! attempt and runs create → bootstrap → install. Everyone else arriving while
//! that attempt is in flight waits on the state channel and shares its outcome.
//! `Ready` is permanent; `Failed` is retried by the next `acquire()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::types::{ComputationEngine, EngineFactory, RawResultTree};
use crate::config::SessionConfig;
use crate::error::{StatError, StatResult};
use crate::program::ProgramPayload;

/// Procedure label for evaluations of free-form program text.
const PROGRAM_LABEL: &str = "program";

static GLOBAL_SESSION: OnceLock<Arc<EngineSession>> = OnceLock::new();

#[derive(Clone)]
enum SessionState {
    Uninitialized,
    Initializing { attempt: u64 },
    Ready { engine: Arc<dyn ComputationEngine> },
    Failed { attempt: u64, message: String },
}

/// Observable session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// Session counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub initialization_attempts: u64,
    pub evaluations: u64,
    pub failed_evaluations: u64,
}

/// Owns the single engine instance and serializes access to it.
pub struct EngineSession {
    factory: Arc<dyn EngineFactory>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    attempts: AtomicU64,
    last_failure: Mutex<Option<(u64, String)>>,
    evaluation_gate: Arc<tokio::sync::Mutex<()>>,
    evaluations: AtomicU64,
    failed_evaluations: AtomicU64,
}

impl EngineSession {
    pub fn new(factory: Arc<dyn EngineFactory>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            factory,
            config,
            state,
            attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
            evaluation_gate: Arc::new(tokio::sync::Mutex::new(())),
            evaluations: AtomicU64::new(0),
            failed_evaluations: AtomicU64::new(0),
        }
    }

    /// Install the process-wide session. The first install wins; the installed
    /// session is returned either way.
    pub fn install_global(session: Arc<EngineSession>) -> Arc<EngineSession> {
        GLOBAL_SESSION.get_or_init(|| session).clone()
    }

    pub fn global() -> Option<Arc<EngineSession>> {
        GLOBAL_SESSION.get().cloned()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        match &*self.state.borrow() {
            SessionState::Uninitialized => SessionPhase::Uninitialized,
            SessionState::Initializing { .. } => SessionPhase::Initializing,
            SessionState::Ready { .. } => SessionPhase::Ready,
            SessionState::Failed { .. } => SessionPhase::Failed,
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            initialization_attempts: self.attempts.load(Ordering::SeqCst),
            evaluations: self.evaluations.load(Ordering::SeqCst),
            failed_evaluations: self.failed_evaluations.load(Ordering::SeqCst),
        }
    }

    /// Return the ready engine, initializing it or waiting for an in-flight
    /// initialization as needed.
    pub async fn acquire(&self) -> StatResult<Arc<dyn ComputationEngine>> {
        if let SessionState::Ready { engine } = &*self.state.borrow() {
            return Ok(engine.clone());
        }

        let mut rx = self.state.subscribe();
        let mut ready = None;
        let mut claimed = None;
        let mut waiting_on = None;
        self.state.send_if_modified(|state| match state {
            SessionState::Ready { engine } => {
                ready = Some(engine.clone());
                false
            }
            SessionState::Initializing { attempt } => {
                waiting_on = Some(*attempt);
                false
            }
            SessionState::Uninitialized | SessionState::Failed { .. } => {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                *state = SessionState::Initializing { attempt };
                claimed = Some(attempt);
                true
            }
        });

        if let Some(engine) = ready {
            return Ok(engine);
        }
        if let Some(attempt) = claimed {
            return self.initialize(attempt).await;
        }
        let attempt = waiting_on.unwrap_or_default();
        tracing::debug!(attempt, "waiting for engine initialization in flight");

        let outcome = rx
            .wait_for(|state| {
                !matches!(state, SessionState::Initializing { attempt: a } if *a == attempt)
            })
            .await
            .map(|state| state.clone());
        match outcome {
            Ok(SessionState::Ready { engine }) => Ok(engine),
            Ok(SessionState::Failed { attempt: a, message }) if a == attempt => {
                Err(StatError::Initialization(message))
            }
            // The attempt failed and a newer one has already started.
            Ok(_) => Err(StatError::Initialization(self.failure_message(attempt))),
            Err(_) => Err(StatError::Initialization("engine session was dropped".into())),
        }
    }

    /// Evaluate program text on the ready engine.
    ///
    /// With a timeout configured the engine call runs on its own task. A call
    /// that times out keeps the evaluation gate until the engine returns, so
    /// the next queued program never overlaps it.
    pub async fn evaluate(&self, program: &str) -> StatResult<RawResultTree> {
        let engine = self.acquire().await?;

        let permit = if self.config.serialize_evaluations {
            Some(self.evaluation_gate.clone().lock_owned().await)
        } else {
            None
        };

        self.evaluations.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        tracing::debug!(program_bytes = program.len(), "evaluating program");

        let outcome = match self.config.evaluation_timeout() {
            Some(limit) => {
                let program = program.to_string();
                let mut task = tokio::spawn(async move {
                    let result = engine.evaluate(&program).await;
                    drop(permit);
                    result
                });
                match tokio::time::timeout(limit, &mut task).await {
                    Ok(Ok(result)) => result.map_err(|e| e.message),
                    Ok(Err(join_error)) => Err(format!("evaluation task failed: {}", join_error)),
                    Err(_) => {
                        tracing::warn!(
                            timeout_secs = limit.as_secs(),
                            "evaluation timed out; gate stays held until the engine returns"
                        );
                        Err(format!("timed out after {}s", limit.as_secs()))
                    }
                }
            }
            None => {
                let result = engine.evaluate(program).await.map_err(|e| e.message);
                drop(permit);
                result
            }
        };

        match outcome {
            Ok(tree) => {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "evaluation finished");
                Ok(tree)
            }
            Err(message) => {
                self.failed_evaluations.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(error = %message, "evaluation failed");
                Err(StatError::evaluation(PROGRAM_LABEL, message))
            }
        }
    }

    /// Evaluate a procedure payload, labelling errors with its procedure.
    pub async fn evaluate_payload(&self, payload: &ProgramPayload) -> StatResult<RawResultTree> {
        self.evaluate(payload.program())
            .await
            .map_err(|e| e.with_procedure(payload.kind().as_str()))
    }

    async fn initialize(&self, attempt: u64) -> StatResult<Arc<dyn ComputationEngine>> {
        let mut guard = AttemptGuard {
            session: self,
            attempt,
            armed: true,
        };
        tracing::info!(attempt, "initializing computation engine");

        let result = self.run_initialization().await;
        guard.armed = false;

        match result {
            Ok(engine) => {
                self.state.send_replace(SessionState::Ready {
                    engine: engine.clone(),
                });
                tracing::info!(attempt, "computation engine ready");
                Ok(engine)
            }
            Err(message) => {
                tracing::error!(attempt, error = %message, "computation engine initialization failed");
                self.publish_failure(attempt, message.clone());
                Err(StatError::Initialization(message))
            }
        }
    }

    async fn run_initialization(&self) -> Result<Arc<dyn ComputationEngine>, String> {
        let engine = self
            .factory
            .create(&self.config.engine)
            .await
            .map_err(|e| format!("engine creation failed: {}", e))?;
        engine
            .bootstrap()
            .await
            .map_err(|e| format!("engine bootstrap failed: {}", e))?;

        let packages = &self.config.capability_packages;
        if !packages.is_empty() {
            tracing::info!(packages = ?packages, "installing capability packages");
            engine.install_capabilities(packages).await.map_err(|e| {
                format!(
                    "installing packages [{}] failed: {}",
                    packages.join(", "),
                    e
                )
            })?;
        }
        Ok(engine)
    }

    fn publish_failure(&self, attempt: u64, message: String) {
        *self.last_failure.lock() = Some((attempt, message.clone()));
        self.state
            .send_replace(SessionState::Failed { attempt, message });
    }

    fn failure_message(&self, attempt: u64) -> String {
        match &*self.last_failure.lock() {
            Some((a, message)) if *a == attempt => message.clone(),
            _ => format!("initialization attempt {} failed", attempt),
        }
    }
}

/// Publishes `Failed` if the claiming caller is dropped mid-initialization, so
/// waiters are released and the next `acquire()` retries.
struct AttemptGuard<'a> {
    session: &'a EngineSession,
    attempt: u64,
    armed: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session
                .publish_failure(self.attempt, "initialization was cancelled".to_string());
        }
    }
}
