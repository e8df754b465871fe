// Remote Engine Adapters
// Capability-typed clients for the external scoring services.
// Every adapter parses its payload strictly and reports any deviation as an error.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::config_store::AppConfig;
use crate::models::{EngineDescriptor, EngineScore, EngineVerdict, ImageSample};

const SIGHTENGINE_DEFAULT_URL: &str = "https://api.sightengine.com/1.0/check.json";
const HF_CLASSIFIER_DEFAULT_URL: &str =
    "https://api-inference.huggingface.co/models/Ateeqq/ai-vs-human-image-detector";

/// Confidence assigned to the named side when the classifier only returns a best label
const BARE_LABEL_CONFIDENCE: f64 = 0.99;

pub const SIGHTENGINE_ENGINE: EngineDescriptor = EngineDescriptor {
    name: "Sightengine GenAI",
    id: "sightengine/genai",
    architecture: "Commercial AI Generator Detector",
    weight: 1.0,
};

pub const HF_CLASSIFIER_ENGINE: EngineDescriptor = EngineDescriptor {
    name: "Ateeqq AI Detector",
    id: "ateeqq/ai-vs-human",
    architecture: "Hugging Face Space (ViT/CNN)",
    weight: 0.9,
};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

/// An external scoring service the orchestrator can fan out to.
#[async_trait]
pub trait RemoteEngine: Send + Sync {
    fn descriptor(&self) -> &EngineDescriptor;

    async fn score(&self, sample: &ImageSample) -> Result<EngineScore, ProviderError>;
}

fn build_client(timeout: Duration) -> Client {
    match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            // The orchestrator's own timeout still bounds each call
            warn!("[PROVIDERS] HTTP client build failed, using defaults: {}", e);
            Client::new()
        }
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(response.text().await?)
}

fn check_probability(value: f64, what: &str) -> Result<f64, ProviderError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ProviderError::MalformedResponse(format!(
            "{} out of range: {}",
            what, value
        )))
    }
}

// ============ Sightengine GenAI ============

#[derive(Debug, Clone)]
pub struct SightengineCredentials {
    pub api_user: String,
    pub api_secret: String,
}

#[derive(Debug, Deserialize)]
struct SightengineResponse {
    status: String,
    #[serde(rename = "type")]
    kind: Option<SightengineType>,
}

#[derive(Debug, Deserialize)]
struct SightengineType {
    ai_generated: Option<f64>,
}

/// Parse a `check.json` body into a score. Anything but a successful genai verdict is an error.
pub fn parse_sightengine_payload(body: &str) -> Result<EngineScore, ProviderError> {
    let data: SightengineResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::JsonError(e.to_string()))?;

    if data.status != "success" {
        return Err(ProviderError::MalformedResponse(format!(
            "status {}",
            data.status
        )));
    }

    let probability = data
        .kind
        .and_then(|t| t.ai_generated)
        .ok_or_else(|| ProviderError::MalformedResponse("missing type.ai_generated".to_string()))?;
    let probability = check_probability(probability, "ai_generated")?;

    let ai_score = probability * 100.0;
    Ok(EngineScore {
        ai_score,
        human_score: (1.0 - probability) * 100.0,
        verdict: if ai_score > 50.0 {
            EngineVerdict::Ai
        } else {
            EngineVerdict::Human
        },
        details: None,
    })
}

pub struct SightengineClient {
    client: Client,
    url: String,
    credentials: Option<SightengineCredentials>,
}

impl SightengineClient {
    pub fn new(
        url: String,
        credentials: Option<SightengineCredentials>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: build_client(timeout),
            url,
            credentials,
        }
    }
}

#[async_trait]
impl RemoteEngine for SightengineClient {
    fn descriptor(&self) -> &EngineDescriptor {
        &SIGHTENGINE_ENGINE
    }

    async fn score(&self, sample: &ImageSample) -> Result<EngineScore, ProviderError> {
        let credentials = self.credentials.as_ref().ok_or(ProviderError::MissingApiKey)?;

        let media = Part::bytes(sample.bytes().to_vec())
            .file_name("image.jpg")
            .mime_str(sample.media_type())?;
        let form = Form::new()
            .part("media", media)
            .text("models", "genai")
            .text("api_user", credentials.api_user.clone())
            .text("api_secret", credentials.api_secret.clone());

        let start = Instant::now();
        let response = self.client.post(&self.url).multipart(form).send().await?;
        let body = read_success_body(response).await?;
        debug!(
            "[PROVIDERS] Sightengine responded in {}ms",
            start.elapsed().as_millis()
        );

        parse_sightengine_payload(&body)
    }
}

// ============ Hosted vision classifier ============

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct LabelConfidence {
    label: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct LabelPrediction {
    label: Option<String>,
    confidences: Option<Vec<LabelConfidence>>,
}

/// Accepted classifier payload shapes; anything else fails to deserialize.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifierPayload {
    /// `[{"label": "ai", "score": 0.93}, ...]`
    Scores(Vec<LabelScore>),
    /// `{"label": "ai", "confidences": [{"label": "ai", "confidence": 0.93}, ...]}`
    Prediction(LabelPrediction),
}

fn is_ai_label(label: &str) -> bool {
    label.to_lowercase().contains("ai")
}

fn is_human_label(label: &str) -> bool {
    label.to_lowercase().contains("hum")
}

fn pick_pair<'a, I>(entries: I) -> Result<(f64, f64), ProviderError>
where
    I: Iterator<Item = (&'a str, f64)> + Clone,
{
    let ai = entries.clone().find(|(label, _)| is_ai_label(label)).map(|(_, c)| c);
    let human = entries.clone().find(|(label, _)| is_human_label(label)).map(|(_, c)| c);
    if ai.is_none() && human.is_none() {
        return Err(ProviderError::MalformedResponse(
            "no ai/human labels in classifier output".to_string(),
        ));
    }
    Ok((
        check_probability(ai.unwrap_or(0.0), "ai confidence")?,
        check_probability(human.unwrap_or(0.0), "human confidence")?,
    ))
}

/// Parse a classifier response into a normalized score pair.
pub fn parse_classifier_payload(body: &str) -> Result<EngineScore, ProviderError> {
    let payload: ClassifierPayload =
        serde_json::from_str(body).map_err(|e| ProviderError::JsonError(e.to_string()))?;

    let (ai, human) = match payload {
        ClassifierPayload::Scores(scores) => {
            pick_pair(scores.iter().map(|s| (s.label.as_str(), s.score)))?
        }
        ClassifierPayload::Prediction(LabelPrediction {
            confidences: Some(confidences),
            ..
        }) if !confidences.is_empty() => {
            pick_pair(confidences.iter().map(|c| (c.label.as_str(), c.confidence)))?
        }
        ClassifierPayload::Prediction(LabelPrediction {
            label: Some(label), ..
        }) => {
            if is_ai_label(&label) {
                (BARE_LABEL_CONFIDENCE, 0.0)
            } else {
                (0.0, BARE_LABEL_CONFIDENCE)
            }
        }
        ClassifierPayload::Prediction(_) => {
            return Err(ProviderError::MalformedResponse(
                "prediction carries neither label nor confidences".to_string(),
            ))
        }
    };

    let total = ai + human;
    if total <= 0.0 {
        return Err(ProviderError::MalformedResponse(
            "classifier confidences sum to zero".to_string(),
        ));
    }

    let ai_score = ai / total * 100.0;
    let human_score = human / total * 100.0;
    Ok(EngineScore {
        ai_score,
        human_score,
        verdict: EngineVerdict::from_scores(ai_score, human_score),
        details: None,
    })
}

pub struct HuggingFaceClient {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(url: String, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            url,
            token,
        }
    }
}

#[async_trait]
impl RemoteEngine for HuggingFaceClient {
    fn descriptor(&self) -> &EngineDescriptor {
        &HF_CLASSIFIER_ENGINE
    }

    async fn score(&self, sample: &ImageSample) -> Result<EngineScore, ProviderError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", sample.media_type())
            .body(sample.bytes().to_vec());
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let start = Instant::now();
        let response = request.send().await?;
        let body = read_success_body(response).await?;
        debug!(
            "[PROVIDERS] classifier responded in {}ms",
            start.elapsed().as_millis()
        );

        parse_classifier_payload(&body)
    }
}

// ============ Credentials & construction ============

/// Get a credential from environment or config file
pub fn get_api_key(name: &str, config: &AppConfig) -> Option<String> {
    let env_keys = match name {
        "sightengine_user" => vec!["SIGHTENGINE_API_USER", "REALCHECK_SIGHTENGINE_API_USER"],
        "sightengine_secret" => vec!["SIGHTENGINE_API_SECRET", "REALCHECK_SIGHTENGINE_API_SECRET"],
        "huggingface" => vec!["HF_API_TOKEN", "REALCHECK_HF_API_TOKEN"],
        _ => vec![],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    config
        .api_keys
        .get(name)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

fn resolve_url(config: &AppConfig, engine_id: &str, env_key: &str, default: &str) -> String {
    config
        .engines
        .get(engine_id)
        .and_then(|e| e.base_url.clone())
        .or_else(|| env::var(env_key).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| default.to_string())
}

/// Build the configured remote engines, in their fixed ensemble order.
pub fn build_remote_engines(config: &AppConfig) -> Vec<Arc<dyn RemoteEngine>> {
    let timeout = Duration::from_secs(config.detection.engine_timeout_secs);
    let mut engines: Vec<Arc<dyn RemoteEngine>> = Vec::new();

    if config.engine_enabled(SIGHTENGINE_ENGINE.id) {
        let credentials = match (
            get_api_key("sightengine_user", config),
            get_api_key("sightengine_secret", config),
        ) {
            (Some(api_user), Some(api_secret)) => Some(SightengineCredentials {
                api_user,
                api_secret,
            }),
            _ => None,
        };
        let url = resolve_url(
            config,
            SIGHTENGINE_ENGINE.id,
            "SIGHTENGINE_API_URL",
            SIGHTENGINE_DEFAULT_URL,
        );
        engines.push(Arc::new(SightengineClient::new(url, credentials, timeout)));
    }

    if config.engine_enabled(HF_CLASSIFIER_ENGINE.id) {
        let url = resolve_url(
            config,
            HF_CLASSIFIER_ENGINE.id,
            "HF_INFERENCE_URL",
            HF_CLASSIFIER_DEFAULT_URL,
        );
        let token = get_api_key("huggingface", config);
        engines.push(Arc::new(HuggingFaceClient::new(url, token, timeout)));
    }

    engines
}
