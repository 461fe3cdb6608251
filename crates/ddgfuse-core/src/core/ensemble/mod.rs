//! Cross-validated ensemble scoring.
//!
//! Each COI has its own [`artifacts::EnsembleModelSet`]: K folds, each made of
//! one PCA transform per vector feature and one boosted-tree regressor. The
//! [`scorer::EnsembleScorer`] expands vector features into principal
//! components, evaluates every fold and averages the results.

pub mod artifacts;
pub mod booster;
pub mod error;
pub mod pca;
pub mod scorer;

pub use artifacts::{ArtifactLayout, ArtifactStore, EnsembleModelSet, Fold};
pub use error::{ArtifactLoadError, ConfigurationError};
pub use scorer::EnsembleScorer;
