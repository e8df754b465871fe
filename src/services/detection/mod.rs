// Detection Module
// Image authenticity detection organized into pipeline stages:
// - validator: Rejects bad uploads before any engine runs
// - metadata_analyzer: Local byte-level heuristics (no network)
// - orchestrator: Runs every engine concurrently and collects one result each
// - aggregation: Fuses engine results into the ensemble verdict
// - assembler: Shapes the external response
// - pipeline: Ties the stages together for one request

pub mod validator;
pub mod metadata_analyzer;
pub mod orchestrator;
pub mod aggregation;
pub mod assembler;
pub mod pipeline;

// Re-export commonly used items
pub use validator::{media_type_for_extension, validate_upload, ValidationError, MAX_UPLOAD_BYTES};
pub use metadata_analyzer::{analyze, analyze_with_policy, MetadataPolicy, METADATA_ENGINE};
pub use orchestrator::{EngineOrchestrator, ENGINE_UNAVAILABLE_MESSAGE};
pub use aggregation::{aggregate_results, AggregationError, ENSEMBLE_METHOD};
pub use assembler::assemble_response;
pub use pipeline::{DetectionError, DetectionService};
