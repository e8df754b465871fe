// RealCheck Core Services

pub mod config_store;
pub mod providers;
pub mod detection;

pub use config_store::*;
pub use providers::*;

pub use detection::{
    aggregate_results,
    analyze,
    assemble_response,
    DetectionError,
    DetectionService,
    EngineOrchestrator,
    MetadataPolicy,
};
