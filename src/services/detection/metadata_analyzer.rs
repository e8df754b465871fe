// Metadata Analyzer
// Local heuristic engine: scores raw image bytes for AI-generation signals.
// Deterministic and offline; every signal is a named rule with a fixed point value.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{EngineDescriptor, EngineResult, EngineScore, EngineVerdict, ImageSample};

pub const METADATA_ENGINE: EngineDescriptor = EngineDescriptor {
    name: "Metadata Analyzer",
    id: "local/metadata",
    architecture: "Local Heuristic Engine",
    weight: 0.3,
};

const NO_SIGNAL_DETAIL: &str = "No strong AI indicators in metadata";
const EXIF_TAG: &[u8] = b"Exif";

/// Tool identifiers and parameter-block tokens written by generative image pipelines.
/// Scanned in order; only the first hit counts.
pub const AI_TOOL_MARKERS: &[&str] = &[
    "DALL",
    "Midjourney",
    "Stable Diffusion",
    "ComfyUI",
    "A1111",
    "NovelAI",
    "nai_generated",
    "dreamstudio",
    "invoke-ai",
    "sd-metadata",
    "Dream Studio",
    "Flux",
    "SDXL",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Other,
}

/// Identify the container from its leading magic bytes.
pub fn sniff_format(bytes: &[u8]) -> ImageFormat {
    match bytes {
        [0xFF, 0xD8, ..] => ImageFormat::Jpeg,
        [0x89, 0x50, ..] => ImageFormat::Png,
        _ => ImageFormat::Other,
    }
}

/// Scan windows, bands and caps used by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataPolicy {
    pub exif_scan_bytes: usize,
    pub marker_scan_bytes: usize,
    pub entropy_window_bytes: usize,
    /// Exclusive lower bound of the flagged entropy band
    pub entropy_band_low: f64,
    /// Exclusive upper bound; anything above is ordinary compressed data
    pub entropy_band_high: f64,
    pub size_band_min: usize,
    pub size_band_max: usize,
    pub max_ai_score: i32,
    /// Below this AI score a non-JPEG file gets its human score capped
    pub low_signal_ai_score: f64,
    pub non_jpeg_human_cap: f64,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            exif_scan_bytes: 2_000,
            marker_scan_bytes: 15_000,
            entropy_window_bytes: 20_000,
            entropy_band_low: 7.5,
            entropy_band_high: 7.95,
            size_band_min: 200_000,
            size_band_max: 800_000,
            max_ai_score: 99,
            low_signal_ai_score: 10.0,
            non_jpeg_human_cap: 80.0,
        }
    }
}

/// Facts extracted from the sample once, shared by every rule.
#[derive(Debug, Clone)]
struct ImageProbe {
    format: ImageFormat,
    len: usize,
    has_exif: bool,
    /// Lower-cased best-effort ASCII view of the header window
    header_text: String,
    entropy: f64,
}

impl ImageProbe {
    fn new(bytes: &[u8], policy: &MetadataPolicy) -> Self {
        let format = sniff_format(bytes);
        let exif_window = &bytes[..bytes.len().min(policy.exif_scan_bytes)];
        let has_exif = format == ImageFormat::Jpeg
            && exif_window.windows(EXIF_TAG.len()).any(|w| w == EXIF_TAG);

        Self {
            format,
            len: bytes.len(),
            has_exif,
            header_text: decode_header_text(bytes, policy.marker_scan_bytes),
            entropy: shannon_entropy(&bytes[..bytes.len().min(policy.entropy_window_bytes)]),
        }
    }
}

/// Decode up to `limit` bytes as lower-cased Latin-1; never fails on non-ASCII input.
fn decode_header_text(bytes: &[u8], limit: usize) -> String {
    bytes[..bytes.len().min(limit)]
        .iter()
        .map(|b| b.to_ascii_lowercase() as char)
        .collect()
}

/// Shannon entropy (bits per byte) of the byte-value histogram.
pub fn shannon_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut freq = [0usize; 256];
    for &b in bytes {
        freq[b as usize] += 1;
    }

    let size = bytes.len() as f64;
    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / size;
            -p * p.log2()
        })
        .sum()
}

/// First marker from the vocabulary present in already lower-cased text.
pub fn find_tool_marker(lowered_text: &str) -> Option<&'static str> {
    AI_TOOL_MARKERS
        .iter()
        .copied()
        .find(|marker| lowered_text.contains(&marker.to_lowercase()))
}

/// One triggered heuristic observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub id: &'static str,
    pub points: i32,
    pub description: String,
}

struct SignalRule {
    id: &'static str,
    points: i32,
    detect: fn(&ImageProbe, &MetadataPolicy) -> Option<String>,
}

/// Scoring table, evaluated in order. The first triggered rule supplies the detail string.
const SIGNAL_RULES: &[SignalRule] = &[
    SignalRule {
        id: "missing_exif",
        points: 20,
        detect: detect_missing_exif,
    },
    SignalRule {
        id: "tool_marker",
        points: 60,
        detect: detect_tool_marker,
    },
    SignalRule {
        id: "sd_parameters",
        points: 55,
        detect: detect_sd_parameters,
    },
    SignalRule {
        id: "prompt_metadata",
        points: 50,
        detect: detect_prompt_metadata,
    },
    SignalRule {
        id: "entropy_band",
        points: 8,
        detect: detect_entropy_band,
    },
    SignalRule {
        id: "jpeg_size_band",
        points: 5,
        detect: detect_jpeg_size_band,
    },
];

fn detect_missing_exif(probe: &ImageProbe, _: &MetadataPolicy) -> Option<String> {
    (probe.format == ImageFormat::Jpeg && !probe.has_exif)
        .then(|| "No EXIF metadata (common in AI images)".to_string())
}

fn detect_tool_marker(probe: &ImageProbe, _: &MetadataPolicy) -> Option<String> {
    find_tool_marker(&probe.header_text)
        .map(|marker| format!("AI tool marker found: \"{}\"", marker))
}

fn detect_sd_parameters(probe: &ImageProbe, _: &MetadataPolicy) -> Option<String> {
    let text = &probe.header_text;
    (probe.format == ImageFormat::Png
        && text.contains("parameters")
        && (text.contains("steps") || text.contains("sampler")))
    .then(|| "Stable Diffusion parameters detected".to_string())
}

fn detect_prompt_metadata(probe: &ImageProbe, _: &MetadataPolicy) -> Option<String> {
    let text = &probe.header_text;
    (probe.format == ImageFormat::Png && text.contains("prompt") && text.contains("negative"))
        .then(|| "AI prompt metadata found".to_string())
}

fn detect_entropy_band(probe: &ImageProbe, policy: &MetadataPolicy) -> Option<String> {
    (probe.entropy > policy.entropy_band_low && probe.entropy < policy.entropy_band_high)
        .then(|| format!("High entropy ({:.2}) suggests AI processing", probe.entropy))
}

fn detect_jpeg_size_band(probe: &ImageProbe, policy: &MetadataPolicy) -> Option<String> {
    (probe.format == ImageFormat::Jpeg
        && probe.len > policy.size_band_min
        && probe.len < policy.size_band_max)
        .then(|| "File size typical of generated JPEG output".to_string())
}

/// Full analyzer output, before it is flattened into an engine result.
#[derive(Debug, Clone)]
pub(crate) struct MetadataReport {
    pub format: ImageFormat,
    pub has_exif: bool,
    pub entropy: f64,
    pub signals: Vec<Signal>,
    pub ai_score: f64,
    pub human_score: f64,
}

pub(crate) fn inspect(bytes: &[u8], policy: &MetadataPolicy) -> MetadataReport {
    let probe = ImageProbe::new(bytes, policy);

    let signals: Vec<Signal> = SIGNAL_RULES
        .iter()
        .filter_map(|rule| {
            (rule.detect)(&probe, policy).map(|description| Signal {
                id: rule.id,
                points: rule.points,
                description,
            })
        })
        .collect();

    let ai_signals: i32 = signals.iter().map(|s| s.points).sum();
    let ai_score = ai_signals.min(policy.max_ai_score) as f64;
    let mut human_score = 100.0 - ai_score;

    // Missing EXIF means nothing outside JPEG, so a clean non-JPEG is not strong human evidence.
    if ai_score < policy.low_signal_ai_score && probe.format != ImageFormat::Jpeg {
        human_score = policy.non_jpeg_human_cap;
    }

    MetadataReport {
        format: probe.format,
        has_exif: probe.has_exif,
        entropy: probe.entropy,
        signals,
        ai_score,
        human_score,
    }
}

/// Analyze with the reference policy.
pub fn analyze(sample: &ImageSample) -> EngineResult {
    analyze_with_policy(sample, &MetadataPolicy::default())
}

pub fn analyze_with_policy(sample: &ImageSample, policy: &MetadataPolicy) -> EngineResult {
    let report = inspect(sample.bytes(), policy);
    debug!(
        "[METADATA] format={:?} exif={} entropy={:.3} signals={:?} ai={}",
        report.format,
        report.has_exif,
        report.entropy,
        report.signals.iter().map(|s| s.id).collect::<Vec<_>>(),
        report.ai_score
    );

    let details = report
        .signals
        .first()
        .map(|s| s.description.clone())
        .unwrap_or_else(|| NO_SIGNAL_DETAIL.to_string());

    EngineResult::scored(
        &METADATA_ENGINE,
        EngineScore {
            ai_score: report.ai_score,
            human_score: report.human_score,
            verdict: EngineVerdict::from_scores(report.ai_score, report.human_score),
            details: Some(details),
        },
    )
}
