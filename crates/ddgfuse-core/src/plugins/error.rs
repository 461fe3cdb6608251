use crate::core::models::mutation::ParseMutationError;
use thiserror::Error;

/// Error type returned by model backends.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to load model for plugin '{plugin}' on {device}: {source}")]
    Load {
        plugin: &'static str,
        device: String,
        source: BackendError,
    },
    #[error("Model of plugin '{plugin}' failed: {source}")]
    Forward {
        plugin: &'static str,
        source: BackendError,
    },
    #[error("Model of plugin '{plugin}' returned malformed output: {reason}")]
    MalformedOutput { plugin: &'static str, reason: String },
    #[error("Model handle does not belong to plugin '{plugin}'")]
    WrongHandle { plugin: &'static str },
    #[error("Model of plugin '{plugin}' is unusable after a panic in another thread")]
    Poisoned { plugin: &'static str },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Sequence mismatch: expected '{expected}', found '{found}'")]
    SequenceMismatch { expected: String, found: String },
    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),
    #[error("Structure contains no residues")]
    EmptyStructure,
    #[error("No template chain '{chain_id}' in the built structure")]
    MissingTemplate { chain_id: char },
    #[error("Model unavailable: {0}")]
    MissingModel(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Invalid mutation: {0}")]
    ParseMutation(#[from] ParseMutationError),
    #[error("Mutation {mutation} declares wild-type '{declared}', but the residue is '{found}'")]
    WildTypeMismatch {
        mutation: String,
        declared: char,
        found: char,
    },
    #[error("Mutation {mutation} is outside the sequence of length {length}")]
    PositionOutOfRange { mutation: String, length: usize },
    #[error("Residue '{residue}' is not supported by plugin '{plugin}'")]
    UnsupportedResidue { plugin: &'static str, residue: char },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("No build data of the expected kind for plugin '{plugin}'")]
    MissingData { plugin: &'static str },
}
