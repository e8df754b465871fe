// Response Assembler
// Maps the ensemble and per-engine results onto the external response contract.
// All rounding happens here, once.

use super::aggregation::ENSEMBLE_METHOD;
use crate::models::{DetectResponse, EngineResult, EnsembleResult, EnsembleSummary, ModelEntry};

/// Round to two decimal places for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn model_entry(result: &EngineResult) -> ModelEntry {
    ModelEntry {
        model: result.model.clone(),
        model_id: result.model_id.clone(),
        architecture: result.architecture.clone(),
        ai_score: round2(result.ai_score),
        human_score: round2(result.human_score),
        verdict: result.verdict,
        error: result.error.clone(),
        details: result.details.clone(),
    }
}

pub fn assemble_response(
    ensemble: &EnsembleResult,
    results: &[EngineResult],
    analysis_time_ms: u64,
) -> DetectResponse {
    DetectResponse {
        verdict: ensemble.verdict,
        confidence: round2(ensemble.confidence),
        ai_score: round2(ensemble.ai_score),
        human_score: round2(ensemble.human_score),
        models: results.iter().map(model_entry).collect(),
        ensemble: EnsembleSummary {
            method: ENSEMBLE_METHOD.to_string(),
            total_models: ensemble.total_models,
            successful_models: ensemble.successful_models,
            ai_votes: ensemble.ai_votes,
            human_votes: ensemble.human_votes,
            majority_agreement: (ensemble.agreement * 100.0).round(),
            consensus_level: ensemble.consensus,
        },
        analysis_time: analysis_time_ms,
        models_used: ensemble.successful_models,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConsensusLevel, EngineDescriptor, EngineScore, EngineVerdict, FinalVerdict};

    const ENGINE: EngineDescriptor = EngineDescriptor {
        name: "Sightengine GenAI",
        id: "sightengine/genai",
        architecture: "Commercial AI Generator Detector",
        weight: 1.0,
    };

    #[test]
    fn test_round2() {
        assert_eq!(round2(73.846153), 73.85);
        assert_eq!(round2(26.153846), 26.15);
        assert_eq!(round2(99.9), 99.9);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_assemble_response() {
        let results = vec![
            EngineResult::scored(
                &ENGINE,
                EngineScore {
                    ai_score: 93.456,
                    human_score: 6.544,
                    verdict: EngineVerdict::Ai,
                    details: None,
                },
            ),
            EngineResult::unavailable(&ENGINE, "Engine unavailable (timeout or connection error)"),
        ];
        let ensemble = EnsembleResult {
            ai_score: 73.846153,
            human_score: 26.153847,
            verdict: FinalVerdict::Ai,
            confidence: 75.846153,
            total_models: 2,
            successful_models: 1,
            ai_votes: 1,
            human_votes: 0,
            agreement: 2.0 / 3.0,
            consensus: ConsensusLevel::Moderate,
        };

        let response = assemble_response(&ensemble, &results, 1234);
        assert_eq!(response.ai_score, 73.85);
        assert_eq!(response.human_score, 26.15);
        assert_eq!(response.confidence, 75.85);
        assert_eq!(response.ensemble.majority_agreement, 67.0);
        assert_eq!(response.ensemble.method, "weighted_average_vote");
        assert_eq!(response.models_used, 1);
        assert_eq!(response.analysis_time, 1234);
        assert_eq!(response.models[0].ai_score, 93.46);
        assert_eq!(response.models[1].verdict, EngineVerdict::Error);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["verdict"], "ai");
        assert_eq!(json["ensemble"]["consensusLevel"], "moderate");
        assert_eq!(json["ensemble"]["totalModels"], 2);
        assert_eq!(json["analysisTime"], 1234);
        assert_eq!(json["modelsUsed"], 1);
        assert!(json["models"][0].get("error").is_none());
        assert_eq!(
            json["models"][1]["error"],
            "Engine unavailable (timeout or connection error)"
        );
    }
}
