use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use xstat::{
    ComputationEngine, EngineConfig, EngineFactory, EngineFailure, EngineSession, RawResultTree,
    SessionConfig, SessionPhase, StatError,
};

use super::helpers::{with_timeout, ScriptedFactory};

fn session(factory: Arc<ScriptedFactory>) -> Arc<EngineSession> {
    Arc::new(EngineSession::new(factory, SessionConfig::default()))
}

fn ok_factory() -> ScriptedFactory {
    ScriptedFactory::returning(RawResultTree::list(vec![("n", RawResultTree::scalar(1.0))]))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_bootstraps_once() {
    let factory = Arc::new(ok_factory());
    let session = session(factory.clone());

    let acquires = (0..32).map(|_| {
        let session = session.clone();
        tokio::spawn(async move { session.acquire().await })
    });
    let engines = with_timeout(
        "concurrent acquire",
        Duration::from_secs(5),
        futures::future::join_all(acquires),
    )
    .await;

    let engines: Vec<_> = engines
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    for engine in &engines[1..] {
        assert!(Arc::ptr_eq(&engines[0], engine));
    }
    assert_eq!(factory.log.creates(), 1);
    assert_eq!(factory.log.bootstraps(), 1);
    assert_eq!(factory.log.installs(), 1);
    assert_eq!(session.phase(), SessionPhase::Ready);
}

#[tokio::test]
async fn test_capability_packages_installed_in_order() {
    let factory = Arc::new(ok_factory());
    let session = session(factory.clone());
    session.acquire().await.unwrap();
    assert_eq!(
        *factory.log.installed.lock(),
        vec!["psych".to_string(), "lavaan".to_string(), "corrplot".to_string()]
    );
}

#[tokio::test]
async fn test_failed_initialization_is_retried_by_next_acquire() {
    let factory = Arc::new(ok_factory().failing_bootstraps(2));
    let session = session(factory.clone());

    for attempt in 1..=2 {
        let err = session.acquire().await.unwrap_err();
        assert!(
            matches!(err, StatError::Initialization(ref m) if m.contains("failed to fetch runtime binary")),
            "attempt {}: {:?}",
            attempt,
            err
        );
        assert_eq!(session.phase(), SessionPhase::Failed);
    }

    session.acquire().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Ready);
    assert_eq!(factory.log.creates(), 3);
    assert_eq!(factory.log.installs(), 1);
    assert_eq!(session.stats().initialization_attempts, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_waiters_share_one_failure() {
    let factory = Arc::new(ok_factory().failing_bootstraps(1));
    let session = session(factory.clone());

    let acquires = (0..8).map(|_| {
        let session = session.clone();
        tokio::spawn(async move { session.acquire().await })
    });
    let outcomes = futures::future::join_all(acquires).await;

    let failures = outcomes
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(|outcome| matches!(outcome, Err(StatError::Initialization(_))))
        .count();
    assert!(failures >= 1);
    // Late arrivals may start a second, successful attempt; never more.
    assert!(factory.log.bootstraps() <= 2);
}

/// Records how many evaluations overlap.
#[derive(Default)]
struct OverlapTracker {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct SlowEngine {
    tracker: Arc<OverlapTracker>,
}

#[async_trait::async_trait]
impl ComputationEngine for SlowEngine {
    async fn bootstrap(&self) -> Result<(), EngineFailure> {
        Ok(())
    }

    async fn install_capabilities(&self, _packages: &[String]) -> Result<(), EngineFailure> {
        Ok(())
    }

    async fn evaluate(&self, _program: &str) -> Result<RawResultTree, EngineFailure> {
        let now = self.tracker.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RawResultTree::list(vec![("n", RawResultTree::scalar(1.0))]))
    }
}

struct SlowFactory {
    tracker: Arc<OverlapTracker>,
}

#[async_trait::async_trait]
impl EngineFactory for SlowFactory {
    async fn create(
        &self,
        _config: &EngineConfig,
    ) -> Result<Arc<dyn ComputationEngine>, EngineFailure> {
        Ok(Arc::new(SlowEngine {
            tracker: self.tracker.clone(),
        }))
    }
}

async fn max_overlap(serialize_evaluations: bool) -> usize {
    let tracker = Arc::new(OverlapTracker::default());
    let config = SessionConfig {
        serialize_evaluations,
        ..SessionConfig::default()
    };
    let session = Arc::new(EngineSession::new(
        Arc::new(SlowFactory {
            tracker: tracker.clone(),
        }),
        config,
    ));
    session.acquire().await.unwrap();

    let evaluations = (0..6).map(|_| {
        let session = session.clone();
        tokio::spawn(async move { session.evaluate("list(n = 1)").await })
    });
    for joined in futures::future::join_all(evaluations).await {
        assert!(joined.unwrap().is_ok());
    }
    assert_eq!(tracker.in_flight.load(Ordering::SeqCst), 0);
    tracker.max_in_flight.load(Ordering::SeqCst)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_allows_one_evaluation_at_a_time() {
    let overlap = with_timeout("gated evaluations", Duration::from_secs(5), max_overlap(true)).await;
    assert_eq!(overlap, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ungated_evaluations_overlap() {
    let overlap =
        with_timeout("ungated evaluations", Duration::from_secs(5), max_overlap(false)).await;
    assert!(overlap > 1, "expected overlapping evaluations, saw {}", overlap);
}

#[tokio::test]
async fn test_evaluate_counts_calls() {
    let factory = Arc::new(ok_factory());
    let session = session(factory.clone());

    let (a, b, c) = tokio::join!(
        session.evaluate("list(n = 1)"),
        session.evaluate("list(n = 1)"),
        session.evaluate("list(n = 1)"),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(factory.log.evaluations(), 3);
    assert_eq!(factory.log.bootstraps(), 1);
    assert_eq!(session.stats().evaluations, 3);
}
