// RealCheck Data Models
// Engine results, ensemble outcome and the HTTP response contract

use serde::{Deserialize, Serialize};

// ============ Image Sample ============

/// Immutable upload handed to every engine for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSample {
    bytes: Vec<u8>,
    media_type: String,
}

impl ImageSample {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ============ Engine Results ============

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineVerdict {
    Ai,
    Human,
    Error,
}

impl EngineVerdict {
    /// Binary verdict from a pair of scores; ties go to human.
    pub fn from_scores(ai_score: f64, human_score: f64) -> Self {
        if ai_score > human_score {
            Self::Ai
        } else {
            Self::Human
        }
    }
}

/// Constant identity of a scoring engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineDescriptor {
    pub name: &'static str,
    pub id: &'static str,
    pub architecture: &'static str,
    /// Fusion weight in 0.0..=1.0
    pub weight: f64,
}

/// Successful output of a single engine, before it is tagged with its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineScore {
    pub ai_score: f64,
    pub human_score: f64,
    pub verdict: EngineVerdict,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineResult {
    pub model: String,
    pub model_id: String,
    pub architecture: String,
    pub weight: f64,
    pub ai_score: f64,
    pub human_score: f64,
    pub verdict: EngineVerdict,
    pub error: Option<String>,
    pub details: Option<String>,
}

impl EngineResult {
    pub fn scored(descriptor: &EngineDescriptor, score: EngineScore) -> Self {
        Self {
            model: descriptor.name.to_string(),
            model_id: descriptor.id.to_string(),
            architecture: descriptor.architecture.to_string(),
            weight: descriptor.weight,
            ai_score: score.ai_score,
            human_score: score.human_score,
            verdict: score.verdict,
            error: None,
            details: score.details,
        }
    }

    /// Zero-weight placeholder for an engine that could not produce a score.
    pub fn unavailable(descriptor: &EngineDescriptor, message: impl Into<String>) -> Self {
        Self {
            model: descriptor.name.to_string(),
            model_id: descriptor.id.to_string(),
            architecture: descriptor.architecture.to_string(),
            weight: 0.0,
            ai_score: 0.0,
            human_score: 0.0,
            verdict: EngineVerdict::Error,
            error: Some(message.into()),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict != EngineVerdict::Error
    }

    /// Weight used during fusion; error results never contribute.
    pub fn effective_weight(&self) -> f64 {
        if self.is_success() {
            self.weight
        } else {
            0.0
        }
    }
}

// ============ Ensemble ============

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalVerdict {
    Ai,
    Human,
    Uncertain,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusLevel {
    Strong,
    Moderate,
    Weak,
}

/// Tunable constants of the ensemble decision rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleThresholds {
    /// Score gap below which a result may be called uncertain
    #[serde(default = "default_uncertainty_gap")]
    pub uncertainty_gap: f64,
    /// Agreement below which a close result is called uncertain
    #[serde(default = "default_uncertainty_agreement")]
    pub uncertainty_agreement: f64,
    /// Agreement strictly above which the confidence bonus is added
    #[serde(default = "default_bonus_agreement")]
    pub bonus_agreement: f64,
    #[serde(default = "default_agreement_bonus")]
    pub agreement_bonus: f64,
    #[serde(default = "default_confidence_cap")]
    pub confidence_cap: f64,
    #[serde(default = "default_strong_consensus")]
    pub strong_consensus: f64,
    #[serde(default = "default_moderate_consensus")]
    pub moderate_consensus: f64,
}

fn default_uncertainty_gap() -> f64 { 10.0 }
fn default_uncertainty_agreement() -> f64 { 0.7 }
fn default_bonus_agreement() -> f64 { 0.8 }
fn default_agreement_bonus() -> f64 { 2.0 }
fn default_confidence_cap() -> f64 { 99.9 }
fn default_strong_consensus() -> f64 { 0.8 }
fn default_moderate_consensus() -> f64 { 0.6 }

impl Default for EnsembleThresholds {
    fn default() -> Self {
        Self {
            uncertainty_gap: default_uncertainty_gap(),
            uncertainty_agreement: default_uncertainty_agreement(),
            bonus_agreement: default_bonus_agreement(),
            agreement_bonus: default_agreement_bonus(),
            confidence_cap: default_confidence_cap(),
            strong_consensus: default_strong_consensus(),
            moderate_consensus: default_moderate_consensus(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleResult {
    pub ai_score: f64,
    pub human_score: f64,
    pub verdict: FinalVerdict,
    pub confidence: f64,
    pub total_models: usize,
    pub successful_models: usize,
    pub ai_votes: usize,
    pub human_votes: usize,
    /// Majority agreement ratio in 0.0..=1.0
    pub agreement: f64,
    pub consensus: ConsensusLevel,
}

// ============ Detection Response ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub model: String,
    pub model_id: String,
    pub architecture: String,
    pub ai_score: f64,
    pub human_score: f64,
    pub verdict: EngineVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleSummary {
    pub method: String,
    pub total_models: usize,
    pub successful_models: usize,
    pub ai_votes: usize,
    pub human_votes: usize,
    /// Agreement as a whole percentage (0-100)
    pub majority_agreement: f64,
    pub consensus_level: ConsensusLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub verdict: FinalVerdict,
    pub confidence: f64,
    pub ai_score: f64,
    pub human_score: f64,
    pub models: Vec<ModelEntry>,
    pub ensemble: EnsembleSummary,
    /// Milliseconds spent in the engines
    pub analysis_time: u64,
    pub models_used: usize,
}
