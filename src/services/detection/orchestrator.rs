// Engine Orchestrator
// Fans one sample out to the local analyzer and every remote engine, then joins them all.
// A failing or slow engine only ever costs its own slot.

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::metadata_analyzer::{self, MetadataPolicy};
use crate::models::{EngineResult, ImageSample};
use crate::services::config_store::AppConfig;
use crate::services::providers::{build_remote_engines, RemoteEngine};

pub const ENGINE_UNAVAILABLE_MESSAGE: &str = "Engine unavailable (timeout or connection error)";

pub struct EngineOrchestrator {
    remote_engines: Vec<Arc<dyn RemoteEngine>>,
    engine_timeout: Duration,
    metadata_policy: MetadataPolicy,
}

impl EngineOrchestrator {
    pub fn new(
        remote_engines: Vec<Arc<dyn RemoteEngine>>,
        engine_timeout: Duration,
        metadata_policy: MetadataPolicy,
    ) -> Self {
        Self {
            remote_engines,
            engine_timeout,
            metadata_policy,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            build_remote_engines(config),
            Duration::from_secs(config.detection.engine_timeout_secs),
            config.detection.metadata.clone(),
        )
    }

    /// Orchestrator with no remote engines; only the metadata analyzer runs.
    pub fn local_only(metadata_policy: MetadataPolicy) -> Self {
        Self::new(Vec::new(), Duration::from_secs(0), metadata_policy)
    }

    /// Number of result slots per run (remote engines plus the local analyzer)
    pub fn engine_count(&self) -> usize {
        self.remote_engines.len() + 1
    }

    pub fn engine_ids(&self) -> Vec<&'static str> {
        self.remote_engines
            .iter()
            .map(|e| e.descriptor().id)
            .chain(std::iter::once(metadata_analyzer::METADATA_ENGINE.id))
            .collect()
    }

    /// Run every engine to completion. Results come back in fixed order:
    /// remote engines as configured, then the metadata analyzer.
    pub async fn run(&self, sample: &ImageSample) -> Vec<EngineResult> {
        let remote = join_all(
            self.remote_engines
                .iter()
                .map(|engine| self.run_remote(engine.as_ref(), sample)),
        );
        let local = async { metadata_analyzer::analyze_with_policy(sample, &self.metadata_policy) };

        let (mut results, metadata) = tokio::join!(remote, local);
        results.push(metadata);
        results
    }

    async fn run_remote(&self, engine: &dyn RemoteEngine, sample: &ImageSample) -> EngineResult {
        let descriptor = engine.descriptor();
        let start = Instant::now();

        // Dropping the future on timeout aborts the in-flight request.
        match tokio::time::timeout(self.engine_timeout, engine.score(sample)).await {
            Ok(Ok(score)) => {
                info!(
                    "[ORCHESTRATOR] {} ok ai={:.2} human={:.2} latency_ms={}",
                    descriptor.id,
                    score.ai_score,
                    score.human_score,
                    start.elapsed().as_millis()
                );
                EngineResult::scored(descriptor, score)
            }
            Ok(Err(e)) => {
                warn!("[ORCHESTRATOR] {} failed: {}", descriptor.id, e);
                EngineResult::unavailable(descriptor, ENGINE_UNAVAILABLE_MESSAGE)
            }
            Err(_) => {
                warn!(
                    "[ORCHESTRATOR] {} timeout ({}s)",
                    descriptor.id,
                    self.engine_timeout.as_secs()
                );
                EngineResult::unavailable(descriptor, ENGINE_UNAVAILABLE_MESSAGE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngineDescriptor, EngineScore, EngineVerdict};
    use crate::services::providers::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Score(f64),
        Fail,
        Hang,
    }

    struct MockEngine {
        descriptor: EngineDescriptor,
        delay: Duration,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockEngine {
        fn new(id: &'static str, delay_secs: u64, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                descriptor: EngineDescriptor {
                    name: id,
                    id,
                    architecture: "Mock",
                    weight: 1.0,
                },
                delay: Duration::from_secs(delay_secs),
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RemoteEngine for MockEngine {
        fn descriptor(&self) -> &EngineDescriptor {
            &self.descriptor
        }

        async fn score(&self, _sample: &ImageSample) -> Result<EngineScore, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.behavior {
                Behavior::Score(ai) => Ok(EngineScore {
                    ai_score: ai,
                    human_score: 100.0 - ai,
                    verdict: EngineVerdict::from_scores(ai, 100.0 - ai),
                    details: None,
                }),
                Behavior::Fail => Err(ProviderError::MissingApiKey),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProviderError::MissingApiKey)
                }
            }
        }
    }

    fn dyn_engine(engine: Arc<MockEngine>) -> Arc<dyn RemoteEngine> {
        engine
    }

    fn sample() -> ImageSample {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(b"Midjourney");
        ImageSample::new(bytes, "image/jpeg")
    }

    fn orchestrator(engines: Vec<Arc<dyn RemoteEngine>>) -> EngineOrchestrator {
        EngineOrchestrator::new(engines, Duration::from_secs(20), MetadataPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_is_fixed_regardless_of_completion() {
        let slow = MockEngine::new("mock/slow", 5, Behavior::Score(90.0));
        let fast = MockEngine::new("mock/fast", 0, Behavior::Score(10.0));
        let results = orchestrator(vec![dyn_engine(slow), dyn_engine(fast)]).run(&sample()).await;

        let ids: Vec<&str> = results.iter().map(|r| r.model_id.as_str()).collect();
        assert_eq!(ids, vec!["mock/slow", "mock/fast", "local/metadata"]);
        assert_eq!(results[0].ai_score, 90.0);
        assert_eq!(results[1].ai_score, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated() {
        let failing = MockEngine::new("mock/failing", 0, Behavior::Fail);
        let healthy = MockEngine::new("mock/healthy", 1, Behavior::Score(75.0));
        let results = orchestrator(vec![dyn_engine(failing), dyn_engine(healthy)])
            .run(&sample())
            .await;

        assert_eq!(results[0].verdict, EngineVerdict::Error);
        assert_eq!(results[0].weight, 0.0);
        assert_eq!(results[0].error.as_deref(), Some(ENGINE_UNAVAILABLE_MESSAGE));
        assert_eq!(results[1].verdict, EngineVerdict::Ai);
        assert_eq!(results[2].verdict, EngineVerdict::Ai);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_engine_times_out_without_blocking_siblings() {
        let hanging = MockEngine::new("mock/hanging", 0, Behavior::Hang);
        let healthy = MockEngine::new("mock/healthy", 2, Behavior::Score(30.0));
        let start = tokio::time::Instant::now();

        let results = orchestrator(vec![dyn_engine(hanging.clone()), dyn_engine(healthy)])
            .run(&sample())
            .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
        assert_eq!(results[0].verdict, EngineVerdict::Error);
        assert_eq!(results[1].verdict, EngineVerdict::Human);
        // No retries
        assert_eq!(hanging.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_only_runs_metadata_analyzer() {
        let orchestrator = EngineOrchestrator::local_only(MetadataPolicy::default());
        let results = orchestrator.run(&sample()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(orchestrator.engine_count(), 1);
        assert_eq!(results[0].model_id, "local/metadata");
        assert_eq!(results[0].verdict, EngineVerdict::Ai);
    }

    #[test]
    fn test_engine_ids_follow_result_order() {
        let a = MockEngine::new("mock/a", 0, Behavior::Fail);
        let b = MockEngine::new("mock/b", 0, Behavior::Fail);
        let orchestrator = orchestrator(vec![dyn_engine(a), dyn_engine(b)]);
        assert_eq!(orchestrator.engine_ids(), vec!["mock/a", "mock/b", "local/metadata"]);
        assert_eq!(orchestrator.engine_count(), 3);
    }
}
