use super::artifacts::{EnsembleModelSet, Fold};
use super::error::ConfigurationError;
use crate::core::features::record::{FeatureRecord, FeatureValue};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

pub const DEFAULT_N_COMPONENTS: usize = 10;

/// Name of the `index`-th principal component column derived from `stem`.
pub fn pc_column(stem: &str, index: usize) -> String {
    format!("{}_{}_pc", stem, index)
}

// Where a principal-component column comes from: (stem position, component).
type PcSlots = HashMap<String, (usize, usize)>;

/// Scores feature records with a cross-validated PCA + boosted-tree ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleScorer {
    n_components: usize,
    strict_columns: bool,
}

impl Default for EnsembleScorer {
    fn default() -> Self {
        Self::new(DEFAULT_N_COMPONENTS, true)
    }
}

impl EnsembleScorer {
    pub fn new(n_components: usize, strict_columns: bool) -> Self {
        Self {
            n_components,
            strict_columns,
        }
    }

    /// Returns one prediction per record: the mean of every fold's prediction.
    ///
    /// `pca_columns` lists the vector features the records offer for PCA
    /// compression. Every persisted stem must be among them; offered columns
    /// the model does not know are rejected in strict mode.
    ///
    /// Folds are evaluated in parallel; the mean is accumulated in fold order.
    pub fn score(
        &self,
        models: &EnsembleModelSet,
        records: &[FeatureRecord],
        pca_columns: &[String],
    ) -> Result<Vec<f64>, ConfigurationError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        self.check_pca_columns(models, pca_columns)?;
        let pc_slots = self.pc_slots(models);
        let base_rows = self.assemble_scalar_rows(models, records, &pc_slots)?;
        let stacked = models
            .pca_stems
            .iter()
            .map(|stem| stack_vectors(models, stem, records))
            .collect::<Result<Vec<_>, _>>()?;

        let fold_predictions = models
            .folds
            .par_iter()
            .map(|fold| self.predict_fold(models, fold, &stacked, &base_rows, &pc_slots))
            .collect::<Result<Vec<_>, _>>()?;

        let n_folds = fold_predictions.len() as f64;
        let mut means = vec![0.0; records.len()];
        for predictions in &fold_predictions {
            for (mean, value) in means.iter_mut().zip(predictions) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= n_folds;
        }
        debug!(
            coi = %models.coi,
            mutations = records.len(),
            folds = fold_predictions.len(),
            "Scored feature records."
        );
        Ok(means)
    }

    fn check_pca_columns(
        &self,
        models: &EnsembleModelSet,
        pca_columns: &[String],
    ) -> Result<(), ConfigurationError> {
        let offered: BTreeSet<&str> = pca_columns.iter().map(String::as_str).collect();
        let persisted: BTreeSet<&str> = models.pca_stems.iter().map(String::as_str).collect();

        let missing: Vec<&str> = persisted.difference(&offered).copied().collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::ColumnMismatch {
                coi: models.coi,
                reason: format!("PCA features {:?} were not synthesized", missing),
            });
        }
        let extra: Vec<&str> = offered.difference(&persisted).copied().collect();
        self.check_extra_columns(models, &extra)
    }

    fn pc_slots(&self, models: &EnsembleModelSet) -> PcSlots {
        models
            .pca_stems
            .iter()
            .enumerate()
            .flat_map(|(stem_idx, stem)| {
                (0..self.n_components).map(move |i| (pc_column(stem, i), (stem_idx, i)))
            })
            .collect()
    }

    /// Lays out every record in persisted column order, leaving zeros where
    /// principal components go, and checks the available column set.
    fn assemble_scalar_rows(
        &self,
        models: &EnsembleModelSet,
        records: &[FeatureRecord],
        pc_slots: &PcSlots,
    ) -> Result<Vec<Vec<f64>>, ConfigurationError> {
        let persisted: HashSet<&str> = models.feature_columns.iter().map(String::as_str).collect();
        let stems: HashSet<&str> = models.pca_stems.iter().map(String::as_str).collect();

        let mut unused_pcs: Vec<&str> = pc_slots
            .keys()
            .map(String::as_str)
            .filter(|column| !persisted.contains(column))
            .collect();
        unused_pcs.sort_unstable();
        self.check_extra_columns(models, &unused_pcs)?;

        let mut rows = Vec::with_capacity(records.len());
        for (record_idx, record) in records.iter().enumerate() {
            let mut row = Vec::with_capacity(models.feature_columns.len());
            for column in &models.feature_columns {
                if pc_slots.contains_key(column) {
                    row.push(0.0);
                    continue;
                }
                match record.get(column) {
                    Some(FeatureValue::Scalar(value)) => row.push(*value),
                    Some(FeatureValue::Vector(_)) => {
                        return Err(ConfigurationError::ColumnMismatch {
                            coi: models.coi,
                            reason: format!(
                                "column '{}' of record {} is a vector, expected a scalar",
                                column, record_idx
                            ),
                        });
                    }
                    None => {
                        return Err(ConfigurationError::ColumnMismatch {
                            coi: models.coi,
                            reason: format!("record {} is missing column '{}'", record_idx, column),
                        });
                    }
                }
            }

            let extra: Vec<&str> = record
                .iter()
                .filter(|(key, value)| {
                    if value.is_vector() {
                        !stems.contains(key)
                    } else {
                        !persisted.contains(key)
                    }
                })
                .map(|(key, _)| key)
                .collect();
            self.check_extra_columns(models, &extra)?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn check_extra_columns(
        &self,
        models: &EnsembleModelSet,
        extra: &[&str],
    ) -> Result<(), ConfigurationError> {
        if extra.is_empty() {
            return Ok(());
        }
        if self.strict_columns {
            return Err(ConfigurationError::ColumnMismatch {
                coi: models.coi,
                reason: format!("unexpected columns {:?}", extra),
            });
        }
        debug!(coi = %models.coi, ignored = ?extra, "Ignoring columns unknown to the model.");
        Ok(())
    }

    fn predict_fold(
        &self,
        models: &EnsembleModelSet,
        fold: &Fold,
        stacked: &[DMatrix<f64>],
        base_rows: &[Vec<f64>],
        pc_slots: &PcSlots,
    ) -> Result<Vec<f64>, ConfigurationError> {
        let mut projected = Vec::with_capacity(stacked.len());
        for (stem, data) in models.pca_stems.iter().zip(stacked) {
            let transform =
                fold.pca_models
                    .get(stem)
                    .ok_or_else(|| ConfigurationError::MissingArtifact {
                        path: format!("PCA transform '{}' for fold {}", stem, fold.index),
                    })?;
            let out = transform
                .transform(data, self.n_components)
                .map_err(|e| match e {
                    ConfigurationError::NotEnoughComponents {
                        available,
                        requested,
                        ..
                    } => ConfigurationError::NotEnoughComponents {
                        stem: stem.clone(),
                        available,
                        requested,
                    },
                    ConfigurationError::ShapeMismatch(reason) => {
                        ConfigurationError::ShapeMismatch(format!("'{}': {}", stem, reason))
                    }
                    other => other,
                })?;
            projected.push(out);
        }

        let slots: Vec<(usize, usize, usize)> = models
            .feature_columns
            .iter()
            .enumerate()
            .filter_map(|(col, name)| {
                pc_slots
                    .get(name)
                    .map(|&(stem_idx, component)| (col, stem_idx, component))
            })
            .collect();

        let rows: Vec<Vec<f64>> = base_rows
            .iter()
            .enumerate()
            .map(|(r, base)| {
                let mut row = base.clone();
                for &(col, stem_idx, component) in &slots {
                    row[col] = projected[stem_idx][(r, component)];
                }
                row
            })
            .collect();
        fold.booster.predict(&rows)
    }
}

/// Stacks the vector feature `stem` of every record into an `n × d` matrix.
fn stack_vectors(
    models: &EnsembleModelSet,
    stem: &str,
    records: &[FeatureRecord],
) -> Result<DMatrix<f64>, ConfigurationError> {
    let mut vectors = Vec::with_capacity(records.len());
    for (record_idx, record) in records.iter().enumerate() {
        match record.get(stem) {
            Some(FeatureValue::Vector(v)) => vectors.push(v.as_slice()),
            Some(FeatureValue::Scalar(_)) | None => {
                return Err(ConfigurationError::ColumnMismatch {
                    coi: models.coi,
                    reason: format!(
                        "PCA feature '{}' is missing or not a vector in record {}",
                        stem, record_idx
                    ),
                });
            }
        }
    }
    let dim = vectors[0].len();
    if let Some(bad) = vectors.iter().position(|v| v.len() != dim) {
        return Err(ConfigurationError::ShapeMismatch(format!(
            "PCA feature '{}' has length {} in record {} but {} in record 0",
            stem,
            vectors[bad].len(),
            bad,
            dim
        )));
    }
    Ok(DMatrix::from_row_iterator(
        vectors.len(),
        dim,
        vectors.into_iter().flatten().copied(),
    ))
}
