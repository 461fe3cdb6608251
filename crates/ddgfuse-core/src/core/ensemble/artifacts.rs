use super::booster::BoostedTreeModel;
use super::error::{ArtifactLoadError, ConfigurationError, path_string};
use super::pca::PcaTransform;
use crate::core::features::coi::Coi;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigurationError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ConfigurationError::MissingArtifact {
                path: path_string(path),
            }
        } else {
            ArtifactLoadError::Io {
                path: path_string(path),
                source: e,
            }
            .into()
        }
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ArtifactLoadError::Json {
            path: path_string(path),
            source: e,
        }
        .into()
    })
}

/// File locations of the trained artifacts under one root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pca_dir(&self) -> PathBuf {
        self.root.join("pca")
    }

    pub fn lgb_dir(&self) -> PathBuf {
        self.root.join("lgb")
    }

    pub fn pca_columns(&self, coi: Coi) -> PathBuf {
        self.pca_dir().join(format!("pca-columns-{}.json", coi))
    }

    pub fn pca_model(&self, coi: Coi, fold: usize, stem: &str) -> PathBuf {
        self.pca_dir().join(format!("pca-{}-{}-{}.json", coi, fold, stem))
    }

    pub fn feature_columns(&self, coi: Coi) -> PathBuf {
        self.lgb_dir().join(format!("feature-columns-{}.json", coi))
    }

    pub fn booster(&self, coi: Coi, fold: usize) -> PathBuf {
        self.lgb_dir().join(format!("lgb-{}-{}.json", coi, fold))
    }

    /// Finds the fold indices that have a booster for `coi`, sorted numerically.
    ///
    /// Fold indices must form the contiguous range `0..K` with `K >= 1`.
    pub fn discover_folds(&self, coi: Coi) -> Result<Vec<usize>, ConfigurationError> {
        let dir = self.lgb_dir();
        let entries = fs::read_dir(&dir).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ConfigurationError::MissingArtifact {
                    path: path_string(&dir),
                }
            } else {
                ArtifactLoadError::Io {
                    path: path_string(&dir),
                    source: e,
                }
                .into()
            }
        })?;

        let prefix = format!("lgb-{}-", coi);
        let mut folds = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArtifactLoadError::Io {
                path: path_string(&dir),
                source: e,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let fold = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|index| index.parse::<usize>().ok());
            if let Some(fold) = fold {
                folds.push(fold);
            }
        }
        folds.sort_unstable();

        if folds.is_empty() {
            return Err(ConfigurationError::MissingArtifact {
                path: path_string(&self.booster(coi, 0)),
            });
        }
        if let Some((expected, _)) = folds.iter().enumerate().find(|(i, fold)| i != *fold) {
            return Err(ConfigurationError::InvalidArtifact {
                path: path_string(&dir),
                reason: format!(
                    "{} fold indices are not contiguous: expected fold {}, found {:?}",
                    coi, expected, folds
                ),
            });
        }
        Ok(folds)
    }
}

/// One cross-validation fold: a PCA transform per stem plus a booster.
#[derive(Debug, Clone)]
pub struct Fold {
    pub index: usize,
    pub pca_models: BTreeMap<String, PcaTransform>,
    pub booster: BoostedTreeModel,
}

/// The trained models for one COI.
#[derive(Debug, Clone)]
pub struct EnsembleModelSet {
    pub coi: Coi,
    /// Ordered input columns expected by every fold's booster.
    pub feature_columns: Vec<String>,
    /// Ordered vector-feature stems compressed by PCA before scoring.
    pub pca_stems: Vec<String>,
    pub folds: Vec<Fold>,
}

impl EnsembleModelSet {
    pub fn new(
        coi: Coi,
        feature_columns: Vec<String>,
        pca_stems: Vec<String>,
        folds: Vec<Fold>,
    ) -> Result<Self, ConfigurationError> {
        if folds.is_empty() {
            return Err(ConfigurationError::ShapeMismatch(format!(
                "the {} model set has no folds",
                coi
            )));
        }
        for fold in &folds {
            if fold.booster.feature_names() != feature_columns.as_slice() {
                return Err(ConfigurationError::ColumnMismatch {
                    coi,
                    reason: format!(
                        "booster of fold {} was trained on {} columns that differ from the {} persisted columns",
                        fold.index,
                        fold.booster.feature_names().len(),
                        feature_columns.len()
                    ),
                });
            }
            if let Some(stem) = pca_stems.iter().find(|s| !fold.pca_models.contains_key(*s)) {
                return Err(ConfigurationError::MissingArtifact {
                    path: format!("PCA transform '{}' for {} fold {}", stem, coi, fold.index),
                });
            }
        }
        Ok(Self {
            coi,
            feature_columns,
            pca_stems,
            folds,
        })
    }

    pub fn load(layout: &ArtifactLayout, coi: Coi) -> Result<Self, ConfigurationError> {
        let feature_columns: Vec<String> = read_json(&layout.feature_columns(coi))?;
        let pca_stems: Vec<String> = read_json(&layout.pca_columns(coi))?;
        let fold_indices = layout.discover_folds(coi)?;

        let mut folds = Vec::with_capacity(fold_indices.len());
        for index in fold_indices {
            let booster = BoostedTreeModel::load(&layout.booster(coi, index))?;
            let mut pca_models = BTreeMap::new();
            for stem in &pca_stems {
                let transform = PcaTransform::load(&layout.pca_model(coi, index, stem))?;
                pca_models.insert(stem.clone(), transform);
            }
            debug!(coi = %coi, fold = index, trees = booster.num_trees(), "Loaded fold.");
            folds.push(Fold {
                index,
                pca_models,
                booster,
            });
        }

        let set = Self::new(coi, feature_columns, pca_stems, folds)?;
        info!(
            coi = %coi,
            folds = set.folds.len(),
            columns = set.feature_columns.len(),
            "Loaded ensemble model set."
        );
        Ok(set)
    }
}

/// Lazily loaded model sets, one per COI.
///
/// A set is read from disk on its first request and cached afterwards, so a
/// session that only scores stability never touches the interface artifacts.
#[derive(Debug)]
pub struct ArtifactStore {
    layout: ArtifactLayout,
    core: OnceLock<EnsembleModelSet>,
    interface: OnceLock<EnsembleModelSet>,
}

impl ArtifactStore {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self {
            layout,
            core: OnceLock::new(),
            interface: OnceLock::new(),
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn slot(&self, coi: Coi) -> &OnceLock<EnsembleModelSet> {
        match coi {
            Coi::Core => &self.core,
            Coi::Interface => &self.interface,
        }
    }

    pub fn is_loaded(&self, coi: Coi) -> bool {
        self.slot(coi).get().is_some()
    }

    pub fn get(&self, coi: Coi) -> Result<&EnsembleModelSet, ConfigurationError> {
        let slot = self.slot(coi);
        if let Some(set) = slot.get() {
            return Ok(set);
        }
        let set = EnsembleModelSet::load(&self.layout, coi)?;
        Ok(slot.get_or_init(|| set))
    }
}
