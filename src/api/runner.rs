//! Procedure runner.
//!
//! [`StatRunner`] is the caller-facing entry point. Each run validates the
//! dataset, renders the procedure program, evaluates it on the shared
//! [`EngineSession`], normalizes the returned tree and maps it into a typed
//! result record.

use std::sync::Arc;
use std::time::Instant;

use crate::dataset::Dataset;
use crate::engine::{normalize, EngineSession};
use crate::error::{StatError, StatResult};
use crate::mappers::{
    map_procedure, CorrelationResult, DescriptiveResult, FactorAnalysisResult, ProcedureResult,
    ReliabilityResult,
};
use crate::program::{build_payload, FactorAnalysisOptions, ProcedureRequest};

/// Runs statistical procedures on a shared engine session.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct StatRunner {
    session: Arc<EngineSession>,
}

impl StatRunner {
    pub fn new(session: Arc<EngineSession>) -> Self {
        Self { session }
    }

    /// Runner over the process-wide session installed with
    /// [`EngineSession::install_global`].
    pub fn from_global() -> StatResult<Self> {
        EngineSession::global().map(Self::new).ok_or_else(|| {
            StatError::Initialization("no global engine session has been installed".into())
        })
    }

    pub fn session(&self) -> &Arc<EngineSession> {
        &self.session
    }

    /// Run any procedure request.
    ///
    /// Validation and formatting errors are raised before the engine is
    /// touched, so an invalid request never triggers initialization.
    pub async fn run(&self, request: &ProcedureRequest) -> StatResult<ProcedureResult> {
        let kind = request.kind();
        let payload = build_payload(request).inspect_err(|e| {
            tracing::debug!(procedure = %kind, error = %e, "procedure request rejected");
        })?;

        let started = Instant::now();
        tracing::debug!(
            procedure = %kind,
            rows = request.dataset().row_count(),
            columns = request.dataset().column_count(),
            "running procedure"
        );

        let tree = self.session.evaluate_payload(&payload).await?;
        let normalized = normalize(&tree, payload.outputs());
        let result = map_procedure(kind, &normalized, request.dataset().columns())
            .map_err(|e| e.with_procedure(kind.as_str()))?;

        tracing::info!(
            procedure = %kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "procedure completed"
        );
        Ok(result)
    }

    /// Cronbach's alpha with item-total statistics.
    pub async fn run_reliability(&self, dataset: &Dataset) -> StatResult<ReliabilityResult> {
        match self.run(&ProcedureRequest::reliability(dataset.clone())).await? {
            ProcedureResult::Reliability(result) => Ok(result),
            other => Err(unexpected_result("reliability", &other)),
        }
    }

    /// Exploratory factor analysis with the default rotation and extraction.
    pub async fn run_factor_analysis(
        &self,
        dataset: &Dataset,
        factor_count: u32,
    ) -> StatResult<FactorAnalysisResult> {
        self.run_factor_analysis_with(dataset, FactorAnalysisOptions::new(factor_count))
            .await
    }

    pub async fn run_factor_analysis_with(
        &self,
        dataset: &Dataset,
        options: FactorAnalysisOptions,
    ) -> StatResult<FactorAnalysisResult> {
        let request = ProcedureRequest::factor_analysis(dataset.clone(), options);
        match self.run(&request).await? {
            ProcedureResult::FactorAnalysis(result) => Ok(result),
            other => Err(unexpected_result("factor_analysis", &other)),
        }
    }

    /// Pairwise Pearson correlations with two-sided p-values.
    pub async fn run_correlation(&self, dataset: &Dataset) -> StatResult<CorrelationResult> {
        match self.run(&ProcedureRequest::correlation(dataset.clone())).await? {
            ProcedureResult::Correlation(result) => Ok(result),
            other => Err(unexpected_result("correlation", &other)),
        }
    }

    pub async fn run_descriptive_statistics(
        &self,
        dataset: &Dataset,
    ) -> StatResult<DescriptiveResult> {
        match self.run(&ProcedureRequest::descriptive(dataset.clone())).await? {
            ProcedureResult::Descriptive(result) => Ok(result),
            other => Err(unexpected_result("descriptive", &other)),
        }
    }
}

fn unexpected_result(expected: &str, actual: &ProcedureResult) -> StatError {
    StatError::data_shape(
        expected,
        format!("mapper produced a {} result", actual.kind()),
    )
}
