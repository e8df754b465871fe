// Detection Pipeline
// Validator -> Orchestrator -> Aggregator -> Assembler for one uploaded image

use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::aggregation::{aggregate_results, AggregationError};
use super::assembler::assemble_response;
use super::orchestrator::EngineOrchestrator;
use super::validator::{validate_upload, ValidationError};
use crate::models::{DetectResponse, EnsembleThresholds, ImageSample};
use crate::services::config_store::AppConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Unavailable(#[from] AggregationError),
}

pub struct DetectionService {
    orchestrator: EngineOrchestrator,
    max_upload_bytes: usize,
    thresholds: EnsembleThresholds,
}

impl DetectionService {
    pub fn new(
        orchestrator: EngineOrchestrator,
        max_upload_bytes: usize,
        thresholds: EnsembleThresholds,
    ) -> Self {
        Self {
            orchestrator,
            max_upload_bytes,
            thresholds,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            EngineOrchestrator::from_config(config),
            config.detection.max_upload_bytes,
            config.detection.ensemble.clone(),
        )
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn engine_ids(&self) -> Vec<&'static str> {
        self.orchestrator.engine_ids()
    }

    /// Validate, score and fuse one upload.
    pub async fn detect(
        &self,
        bytes: Vec<u8>,
        media_type: &str,
    ) -> Result<DetectResponse, DetectionError> {
        validate_upload(media_type, bytes.len(), self.max_upload_bytes)?;

        let request_id = Uuid::new_v4();
        let sample = ImageSample::new(bytes, media_type);
        info!(
            "[DETECT] request_id={} media_type={} bytes={} engines={}",
            request_id,
            sample.media_type(),
            sample.len(),
            self.orchestrator.engine_count()
        );

        let start = Instant::now();
        let results = self.orchestrator.run(&sample).await;
        let analysis_time = start.elapsed().as_millis() as u64;

        let ensemble = aggregate_results(&results, &self.thresholds).map_err(|e| {
            warn!("[DETECT] request_id={} {}", request_id, e);
            e
        })?;

        info!(
            "[DETECT] request_id={} verdict={:?} ai={:.2} confidence={:.2} ok={}/{} ms={}",
            request_id,
            ensemble.verdict,
            ensemble.ai_score,
            ensemble.confidence,
            ensemble.successful_models,
            ensemble.total_models,
            analysis_time
        );

        Ok(assemble_response(&ensemble, &results, analysis_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngineDescriptor, EngineScore, EngineVerdict, FinalVerdict};
    use crate::services::detection::metadata_analyzer::MetadataPolicy;
    use crate::services::detection::orchestrator::ENGINE_UNAVAILABLE_MESSAGE;
    use crate::services::detection::validator::MAX_UPLOAD_BYTES;
    use crate::services::providers::{ProviderError, RemoteEngine};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct RefusingEngine {
        descriptor: EngineDescriptor,
    }

    #[async_trait]
    impl RemoteEngine for RefusingEngine {
        fn descriptor(&self) -> &EngineDescriptor {
            &self.descriptor
        }

        async fn score(&self, _sample: &ImageSample) -> Result<EngineScore, ProviderError> {
            Err(ProviderError::ApiError {
                status: 502,
                message: "bad gateway".to_string(),
            })
        }
    }

    fn midjourney_jpeg() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(b"Midjourney");
        bytes.resize(4096, 0);
        bytes
    }

    fn local_service() -> DetectionService {
        DetectionService::new(
            EngineOrchestrator::local_only(MetadataPolicy::default()),
            MAX_UPLOAD_BYTES,
            EnsembleThresholds::default(),
        )
    }

    #[tokio::test]
    async fn test_rejects_before_running_engines() {
        let service = local_service();
        let err = service.detect(vec![1, 2, 3], "image/tiff").await.unwrap_err();
        assert!(matches!(
            err,
            DetectionError::Invalid(ValidationError::UnsupportedType(_))
        ));

        let err = service
            .detect(vec![0; MAX_UPLOAD_BYTES + 1], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DetectionError::Invalid(ValidationError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_local_only_detection() {
        let response = local_service()
            .detect(midjourney_jpeg(), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(response.verdict, FinalVerdict::Ai);
        assert_eq!(response.ai_score, 80.0);
        assert_eq!(response.human_score, 20.0);
        // Single voter always earns the agreement bonus
        assert_eq!(response.confidence, 82.0);
        assert_eq!(response.models_used, 1);
        assert_eq!(response.ensemble.majority_agreement, 100.0);
        assert_eq!(response.models[0].verdict, EngineVerdict::Ai);
    }

    #[tokio::test]
    async fn test_failed_remote_engine_is_reported_alongside_analyzer() {
        let remote: Arc<dyn RemoteEngine> = Arc::new(RefusingEngine {
            descriptor: EngineDescriptor {
                name: "Refusing Engine",
                id: "mock/refusing",
                architecture: "Mock",
                weight: 1.0,
            },
        });
        let orchestrator = EngineOrchestrator::new(
            vec![remote],
            Duration::from_secs(5),
            MetadataPolicy::default(),
        );
        let service = DetectionService::new(
            orchestrator,
            MAX_UPLOAD_BYTES,
            EnsembleThresholds::default(),
        );

        let response = service.detect(midjourney_jpeg(), "image/jpeg").await.unwrap();

        assert_eq!(response.models.len(), 2);
        let failed = &response.models[0];
        assert_eq!(failed.model_id, "mock/refusing");
        assert_eq!(failed.verdict, EngineVerdict::Error);
        assert_eq!(failed.error.as_deref(), Some(ENGINE_UNAVAILABLE_MESSAGE));
        assert_eq!(response.models[1].model_id, "local/metadata");

        // The failed engine carries no weight, so the analyzer alone decides
        assert_eq!(response.ensemble.total_models, 2);
        assert_eq!(response.ensemble.successful_models, 1);
        assert_eq!(response.models_used, 1);
        assert_eq!(response.ai_score, 80.0);
        assert_eq!(response.verdict, FinalVerdict::Ai);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ensemble"]["totalModels"], 2);
        assert_eq!(json["ensemble"]["successfulModels"], 1);
        assert_eq!(json["models"][0]["verdict"], "error");
    }

    #[test]
    fn test_error_messages_pass_through() {
        let err: DetectionError = AggregationError::AllEnginesUnavailable.into();
        assert_eq!(
            err.to_string(),
            "All detection services are currently unavailable."
        );
        let err: DetectionError = ValidationError::MissingFile.into();
        assert_eq!(err.to_string(), "No image file provided");
    }
}
