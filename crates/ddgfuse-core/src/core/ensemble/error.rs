use crate::core::features::coi::Coi;
use crate::core::features::record::FeatureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON parsing error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Problems with trained artifacts, settings, or feature layout.
///
/// These are never recoverable per mutation: they indicate that the inputs do
/// not fit the models the pipeline was configured with.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Duplicate feature key '{0}'")]
    DuplicateFeature(String),

    #[error("Required artifact not found: {path}")]
    MissingArtifact { path: String },

    #[error("Failed to load artifact: {0}")]
    Artifact(#[from] ArtifactLoadError),

    #[error("Invalid artifact '{path}': {reason}")]
    InvalidArtifact { path: String, reason: String },

    #[error("Feature columns do not match the {coi} model: {reason}")]
    ColumnMismatch { coi: Coi, reason: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error(
        "PCA transform for '{stem}' has {available} components, but {requested} were requested"
    )]
    NotEnoughComponents {
        stem: String,
        available: usize,
        requested: usize,
    },
}

impl From<FeatureError> for ConfigurationError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::DuplicateKey(key) => ConfigurationError::DuplicateFeature(key),
            shape @ FeatureError::ShapeMismatch { .. } => {
                ConfigurationError::ShapeMismatch(shape.to_string())
            }
        }
    }
}

pub(crate) fn path_string(path: &std::path::Path) -> String {
    path.to_string_lossy().to_string()
}
