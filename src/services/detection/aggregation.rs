// Aggregation Logic
// Fuses per-engine results into one ensemble verdict

use thiserror::Error;

use crate::models::{
    ConsensusLevel, EngineResult, EngineVerdict, EnsembleResult, EnsembleThresholds, FinalVerdict,
};

pub const ENSEMBLE_METHOD: &str = "weighted_average_vote";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("All detection services are currently unavailable.")]
    AllEnginesUnavailable,
}

/// Aggregate engine results into the ensemble outcome.
/// Error results carry no weight and cast no vote.
pub fn aggregate_results(
    results: &[EngineResult],
    thresholds: &EnsembleThresholds,
) -> Result<EnsembleResult, AggregationError> {
    let successful: Vec<&EngineResult> = results.iter().filter(|r| r.is_success()).collect();
    if successful.is_empty() {
        return Err(AggregationError::AllEnginesUnavailable);
    }

    // Weighted average of AI scores
    let total_weight: f64 = successful.iter().map(|r| r.effective_weight()).sum();
    let combined_ai = if total_weight > 0.0 {
        successful
            .iter()
            .map(|r| r.ai_score * r.effective_weight())
            .sum::<f64>()
            / total_weight
    } else {
        0.0
    };
    let combined_human = 100.0 - combined_ai;

    // Majority vote
    let ai_votes = successful.iter().filter(|r| r.verdict == EngineVerdict::Ai).count();
    let human_votes = successful.iter().filter(|r| r.verdict == EngineVerdict::Human).count();
    let agreement = majority_agreement(ai_votes, human_votes);

    Ok(EnsembleResult {
        ai_score: combined_ai,
        human_score: combined_human,
        verdict: decide_verdict(combined_ai, combined_human, agreement, thresholds),
        confidence: confidence_score(combined_ai, combined_human, agreement, thresholds),
        total_models: results.len(),
        successful_models: successful.len(),
        ai_votes,
        human_votes,
        agreement,
        consensus: consensus_level(agreement, thresholds),
    })
}

pub fn majority_agreement(ai_votes: usize, human_votes: usize) -> f64 {
    let total = ai_votes + human_votes;
    if total == 0 {
        return 0.0;
    }
    ai_votes.max(human_votes) as f64 / total as f64
}

/// A close score is only uncertain when the engines also disagree.
pub fn decide_verdict(
    combined_ai: f64,
    combined_human: f64,
    agreement: f64,
    thresholds: &EnsembleThresholds,
) -> FinalVerdict {
    let close = (combined_ai - combined_human).abs() < thresholds.uncertainty_gap;
    if close && agreement < thresholds.uncertainty_agreement {
        FinalVerdict::Uncertain
    } else if combined_ai > combined_human {
        FinalVerdict::Ai
    } else {
        FinalVerdict::Human
    }
}

// NOTE: a lone voting engine always has agreement 1.0 and so always earns the bonus.
pub fn confidence_score(
    combined_ai: f64,
    combined_human: f64,
    agreement: f64,
    thresholds: &EnsembleThresholds,
) -> f64 {
    let bonus = if agreement > thresholds.bonus_agreement {
        thresholds.agreement_bonus
    } else {
        0.0
    };
    (combined_ai.max(combined_human) + bonus).min(thresholds.confidence_cap)
}

pub fn consensus_level(agreement: f64, thresholds: &EnsembleThresholds) -> ConsensusLevel {
    if agreement >= thresholds.strong_consensus {
        ConsensusLevel::Strong
    } else if agreement >= thresholds.moderate_consensus {
        ConsensusLevel::Moderate
    } else {
        ConsensusLevel::Weak
    }
}
