use std::sync::Arc;

use serde_json::json;

use xstat::program::outputs::reliability::*;
use xstat::error::ErrorRetryability;
use xstat::{
    ComputationEngine, Dataset, EngineConfig, EngineFactory, EngineFailure, EngineSession,
    JsonEngine, JsonEvaluator, ProcedureRequest, ProcedureResult, RawResultTree, SessionConfig,
    SessionPhase, StatError, StatRunner,
};

use super::helpers::{likert_items, runner_with, ScriptedFactory};

fn reliability_tree(alpha_if_deleted: Vec<f64>) -> RawResultTree {
    RawResultTree::list(vec![
        (RAW_ALPHA, RawResultTree::scalar(0.82)),
        (STD_ALPHA, RawResultTree::wrap(RawResultTree::scalar(0.83))),
        (N_ITEMS, RawResultTree::scalar(3.0)),
        (SCALE_MEAN_DELETED, RawResultTree::doubles(vec![7.2, 7.2, 7.6])),
        (SCALE_VAR_DELETED, RawResultTree::doubles(vec![3.7, 3.2, 5.3])),
        (CORRECTED_ITEM_TOTAL, RawResultTree::doubles(vec![0.79, 0.68, 0.61])),
        (ALPHA_IF_DELETED, RawResultTree::wrap(RawResultTree::doubles(alpha_if_deleted))),
    ])
}

#[tokio::test]
async fn test_reliability_scenario() {
    let (runner, log) = runner_with(ScriptedFactory::returning(reliability_tree(vec![
        0.70, 0.78, 0.85,
    ])));

    let result = runner.run_reliability(&likert_items()).await.unwrap();
    assert_eq!(result.alpha, 0.82);
    assert_eq!(result.standardized_alpha, 0.83);
    assert_eq!(result.item_count, Some(3));
    let names: Vec<&str> = result.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["q1", "q2", "q3"]);
    assert_eq!(result.items[0].alpha_if_deleted, 0.70);
    assert_eq!(result.items[2].alpha_if_deleted, 0.85);
    assert_eq!(result.items_improving_alpha().len(), 1);
    assert!(result.weak_items().is_empty());

    let program = log.last_program().unwrap();
    assert!(program.contains("alpha(data"));
    assert!(program.contains("matrix(c(4,5,4,3,3,4,5,4,5,2,2,3,4,4,4), nrow=5, ncol=3, byrow=TRUE)"));
}

#[tokio::test]
async fn test_shape_mismatch_scenario() {
    let (runner, _log) =
        runner_with(ScriptedFactory::returning(reliability_tree(vec![0.70, 0.78])));

    let err = runner.run_reliability(&likert_items()).await.unwrap_err();
    match &err {
        StatError::DataShape { procedure, message } => {
            assert_eq!(procedure, "reliability");
            assert!(message.contains(ALPHA_IF_DELETED), "{}", message);
        }
        other => panic!("expected data shape error, got {:?}", other),
    }
    assert_eq!(runner.session().phase(), SessionPhase::Ready);
}

#[tokio::test]
async fn test_engine_failure_scenario() {
    let (runner, log) = runner_with(ScriptedFactory::new(|_| {
        Err(EngineFailure::new(
            "Error in alpha(data): data must have non-zero variance",
        ))
    }));

    let err = runner.run_reliability(&likert_items()).await.unwrap_err();
    assert_eq!(
        err,
        StatError::evaluation(
            "reliability",
            "Error in alpha(data): data must have non-zero variance"
        )
    );
    assert_eq!(runner.session().phase(), SessionPhase::Ready);

    // The session stays usable and is not re-initialized.
    let _ = runner.run_reliability(&likert_items()).await;
    assert_eq!(log.creates(), 1);
    assert_eq!(log.evaluations(), 2);
}

#[tokio::test]
async fn test_validation_fails_before_engine_is_touched() {
    let (runner, log) = runner_with(ScriptedFactory::returning(RawResultTree::list(
        Vec::<(&str, RawResultTree)>::new(),
    )));

    let err = runner
        .run_factor_analysis(&likert_items(), 3)
        .await
        .unwrap_err();
    assert!(err.is_validation(), "{:?}", err);

    let single = Dataset::new(vec![vec![1.0], vec![2.0]]).unwrap();
    assert!(runner.run_correlation(&single).await.unwrap_err().is_validation());

    assert_eq!(log.creates(), 0);
    assert_eq!(log.evaluations(), 0);
    assert_eq!(runner.session().phase(), SessionPhase::Uninitialized);
}

#[tokio::test]
async fn test_initialization_failure_surfaces_per_call() {
    let factory = ScriptedFactory::returning(reliability_tree(vec![0.70, 0.78, 0.85]))
        .failing_bootstraps(1);
    let (runner, log) = runner_with(factory);

    let err = runner.run_reliability(&likert_items()).await.unwrap_err();
    assert!(matches!(err, StatError::Initialization(_)));
    assert_eq!(err.context().retryability, ErrorRetryability::Retryable);

    assert!(runner.run_reliability(&likert_items()).await.is_ok());
    assert_eq!(log.creates(), 2);
}

#[tokio::test]
async fn test_run_dispatches_by_kind() {
    let tree = RawResultTree::list(vec![
        ("mean", RawResultTree::doubles(vec![3.6, 3.6, 4.0])),
        ("sd", RawResultTree::doubles(vec![1.14, 1.14, 0.71])),
        ("min", RawResultTree::doubles(vec![2.0, 2.0, 3.0])),
        ("max", RawResultTree::doubles(vec![5.0, 5.0, 5.0])),
        ("median", RawResultTree::doubles(vec![4.0, 4.0, 4.0])),
        ("n", RawResultTree::scalar(5.0)),
    ]);
    let (runner, _log) = runner_with(ScriptedFactory::returning(tree));

    let request = ProcedureRequest::descriptive(likert_items());
    match runner.run(&request).await.unwrap() {
        ProcedureResult::Descriptive(result) => {
            assert_eq!(result.observations, Some(5));
            assert_eq!(result.columns[2].name, "q3");
            assert_eq!(result.columns[2].mean, 4.0);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

// ================================
// JSON engine end to end
// ================================

struct WebRStyleEngine;

#[async_trait::async_trait]
impl JsonEvaluator for WebRStyleEngine {
    async fn bootstrap(&self) -> Result<(), EngineFailure> {
        Ok(())
    }

    async fn install_capabilities(&self, _packages: &[String]) -> Result<(), EngineFailure> {
        Ok(())
    }

    async fn evaluate_json(&self, program: &str) -> Result<serde_json::Value, EngineFailure> {
        if !program.contains("cor(data") {
            return Err(EngineFailure::new("unsupported program"));
        }
        Ok(json!({
            "type": "list",
            "names": ["correlation", "p_values", "n_cols", "n_obs"],
            "values": [
                {"type": "double", "values": [1.0, 0.9, 0.9, 1.0]},
                {"type": "double", "values": [0.0, 0.037, 0.037, 0.0]},
                {"type": "list", "names": null, "values": [{"type": "integer", "values": [2]}]},
                {"type": "integer", "values": [5]}
            ]
        }))
    }
}

struct WebRStyleFactory;

#[async_trait::async_trait]
impl EngineFactory for WebRStyleFactory {
    async fn create(
        &self,
        _config: &EngineConfig,
    ) -> Result<Arc<dyn ComputationEngine>, EngineFailure> {
        Ok(Arc::new(JsonEngine::new(WebRStyleEngine)))
    }
}

#[tokio::test]
async fn test_correlation_through_json_engine() {
    let session = Arc::new(EngineSession::new(
        Arc::new(WebRStyleFactory),
        SessionConfig::default(),
    ));
    let runner = StatRunner::new(session);
    let dataset = Dataset::from_columns(vec![
        ("x".to_string(), vec![1.0, 2.0, 3.0, 4.0, 5.0]),
        ("y".to_string(), vec![2.0, 2.5, 3.5, 4.0, 5.5]),
    ])
    .unwrap();

    let result = runner.run_correlation(&dataset).await.unwrap();
    assert_eq!(result.variables, vec!["x", "y"]);
    assert_eq!(result.coefficient("x", "y"), Some(0.9));
    assert!(result.is_significant("y", "x"));
    assert_eq!(result.observations, Some(5));

    let err = runner.run_descriptive_statistics(&dataset).await.unwrap_err();
    assert_eq!(err, StatError::evaluation("descriptive", "unsupported program"));
}
