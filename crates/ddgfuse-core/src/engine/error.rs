use thiserror::Error;

use crate::core::ensemble::error::ConfigurationError;
use crate::core::io::pdb::PdbError;
use crate::core::models::structure::DomainError;
use crate::plugins::error::{AnalyzeError, BuildError, ModelError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No chain in the structure matches the {target} sequence")]
    DomainNotFound { target: &'static str },

    #[error("Domain extraction failed: {0}")]
    Domain(#[from] DomainError),

    #[error("Plugin '{plugin}' failed to build: {source}")]
    Build {
        plugin: &'static str,
        source: BuildError,
    },

    #[error("Analysis of mutation '{mutation}' failed: {source}")]
    Analyze {
        mutation: String,
        source: AnalyzeError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("Failed to read structure '{path}': {source}")]
    Structure { path: String, source: PdbError },

    #[error("Stability and affinity results are misaligned: {reason}")]
    MisalignedResults { reason: String },

    #[error("Plugin '{plugin}' has no {capability} capability")]
    MissingCapability {
        plugin: String,
        capability: &'static str,
    },
}
