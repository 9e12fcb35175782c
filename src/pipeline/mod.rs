//! Sample processing pipeline.
//!
//! Wires the six quantification stages together for one sample and fans a
//! batch of samples across worker threads. Each sample's intermediate
//! tables are private to its worker; the reference context is shared
//! read-only. A sample either completes every stage or fails as a whole,
//! and one sample's failure never aborts its siblings.

pub mod processor;

pub use processor::{run_samples, SampleInput, SampleOutput, SampleProcessor};

use thiserror::Error;

use crate::config::ConfigError;
use crate::ingest::IngestError;
use crate::pathways::StructureParseError;
use crate::reference::ReferenceError;

/// Error taxonomy for the engine. Structural input problems are fatal for
/// the affected sample only; configuration problems are fatal before any
/// sample is processed. Empty evidence and orphan reaction evidence are not
/// errors: they produce zero tables and the UNINTEGRATED row respectively.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("structural input error: {0}")]
    StructuralInput(String),

    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("reference data error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestError> for EngineError {
    fn from(err: IngestError) -> Self {
        EngineError::StructuralInput(err.to_string())
    }
}

impl From<StructureParseError> for EngineError {
    fn from(err: StructureParseError) -> Self {
        EngineError::StructuralInput(err.to_string())
    }
}
