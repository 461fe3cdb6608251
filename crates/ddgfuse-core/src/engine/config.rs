use crate::core::ensemble::error::{ArtifactLoadError, ConfigurationError, path_string};
use crate::core::ensemble::scorer::DEFAULT_N_COMPONENTS;
use crate::plugins::device::Device;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONTACT_CUTOFF: f64 = 12.0;

fn default_n_components() -> usize {
    DEFAULT_N_COMPONENTS
}

fn default_true() -> bool {
    true
}

fn default_contact_cutoff() -> f64 {
    DEFAULT_CONTACT_CUTOFF
}

/// Settings of a [`Predictor`](super::predictor::Predictor) session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictorConfig {
    /// Root of the trained `pca/` and `lgb/` artifact directories.
    pub artifacts_dir: PathBuf,
    #[serde(default)]
    pub device: Device,
    /// Principal components kept per PCA-compressed feature.
    #[serde(default = "default_n_components")]
    pub n_components: usize,
    /// Reject feature columns the ensemble was not trained on.
    #[serde(default = "default_true")]
    pub strict_columns: bool,
    #[serde(default = "default_true")]
    pub remove_heteroatoms: bool,
    /// Residue contact distance in Angstroms.
    #[serde(default = "default_contact_cutoff")]
    pub contact_cutoff: f64,
}

impl PredictorConfig {
    /// Reads a TOML configuration file.
    ///
    /// A relative `artifacts_dir` is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| ArtifactLoadError::Io {
            path: path_string(path),
            source: e,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ArtifactLoadError::Toml {
            path: path_string(path),
            source: e,
        })?;
        if config.artifacts_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.artifacts_dir = parent.join(&config.artifacts_dir);
            }
        }
        Ok(config)
    }
}

#[derive(Default)]
pub struct PredictorConfigBuilder {
    artifacts_dir: Option<PathBuf>,
    device: Option<Device>,
    n_components: Option<usize>,
    strict_columns: Option<bool>,
    remove_heteroatoms: Option<bool>,
    contact_cutoff: Option<f64>,
}

impl PredictorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(path.into());
        self
    }
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }
    pub fn n_components(mut self, n: usize) -> Self {
        self.n_components = Some(n);
        self
    }
    pub fn strict_columns(mut self, strict: bool) -> Self {
        self.strict_columns = Some(strict);
        self
    }
    pub fn remove_heteroatoms(mut self, remove: bool) -> Self {
        self.remove_heteroatoms = Some(remove);
        self
    }
    pub fn contact_cutoff(mut self, cutoff: f64) -> Self {
        self.contact_cutoff = Some(cutoff);
        self
    }

    pub fn build(self) -> Result<PredictorConfig, ConfigurationError> {
        Ok(PredictorConfig {
            artifacts_dir: self
                .artifacts_dir
                .ok_or(ConfigurationError::MissingParameter("artifacts_dir"))?,
            device: self.device.unwrap_or_default(),
            n_components: self.n_components.unwrap_or(DEFAULT_N_COMPONENTS),
            strict_columns: self.strict_columns.unwrap_or(true),
            remove_heteroatoms: self.remove_heteroatoms.unwrap_or(true),
            contact_cutoff: self.contact_cutoff.unwrap_or(DEFAULT_CONTACT_CUTOFF),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn builder_applies_defaults() {
        let config = PredictorConfigBuilder::new()
            .artifacts_dir("/models")
            .build()
            .unwrap();
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.n_components, 10);
        assert!(config.strict_columns);
        assert!(config.remove_heteroatoms);
        assert_eq!(config.contact_cutoff, 12.0);
    }

    #[test]
    fn builder_requires_artifacts_dir() {
        let result = PredictorConfigBuilder::new().n_components(3).build();
        assert!(matches!(
            result,
            Err(ConfigurationError::MissingParameter("artifacts_dir"))
        ));
    }

    #[test]
    fn load_reads_toml_and_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ddgfuse.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            artifacts_dir = "data"
            device = "cuda:1"
            n_components = 5
            strict_columns = false
            "#
        )
        .unwrap();

        let config = PredictorConfig::load(&path).unwrap();
        assert_eq!(config.artifacts_dir, dir.path().join("data"));
        assert_eq!(config.device, Device::Cuda(1));
        assert_eq!(config.n_components, 5);
        assert!(!config.strict_columns);
        assert!(config.remove_heteroatoms);
        assert_eq!(config.contact_cutoff, DEFAULT_CONTACT_CUTOFF);
    }

    #[test]
    fn load_reports_io_and_parse_errors() {
        let dir = tempdir().unwrap();
        let missing = PredictorConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(
            missing,
            Err(ConfigurationError::Artifact(ArtifactLoadError::Io { .. }))
        ));

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "artifacts_dir = [1, 2]\nunknown = true\n").unwrap();
        assert!(matches!(
            PredictorConfig::load(&path),
            Err(ConfigurationError::Artifact(ArtifactLoadError::Toml { .. }))
        ));
    }
}
