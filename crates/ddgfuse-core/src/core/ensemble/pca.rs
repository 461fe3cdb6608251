use super::artifacts::read_json;
use super::error::ConfigurationError;
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct PcaArtifact {
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
    #[serde(default)]
    explained_variance: Option<Vec<f64>>,
    #[serde(default)]
    whiten: bool,
}

/// A fitted linear PCA projection.
///
/// `transform` computes `(x - mean) · componentsᵀ`, optionally dividing each
/// output column by the square root of its explained variance (whitening).
#[derive(Debug, Clone, PartialEq)]
pub struct PcaTransform {
    mean: DVector<f64>,
    // c × d, one principal axis per row.
    components: DMatrix<f64>,
    whitening_scale: Option<DVector<f64>>,
}

impl PcaTransform {
    pub fn new(mean: Vec<f64>, components: Vec<Vec<f64>>) -> Result<Self, ConfigurationError> {
        let dim = mean.len();
        if dim == 0 {
            return Err(ConfigurationError::ShapeMismatch(
                "PCA mean vector is empty".into(),
            ));
        }
        if let Some((axis, row)) = components.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(ConfigurationError::ShapeMismatch(format!(
                "PCA component {} has length {}, expected {}",
                axis,
                row.len(),
                dim
            )));
        }
        let n_components = components.len();
        let components = DMatrix::from_row_iterator(
            n_components,
            dim,
            components.into_iter().flatten(),
        );
        Ok(Self {
            mean: DVector::from_vec(mean),
            components,
            whitening_scale: None,
        })
    }

    pub fn with_whitening(mut self, explained_variance: &[f64]) -> Result<Self, ConfigurationError> {
        if explained_variance.len() != self.n_components() {
            return Err(ConfigurationError::ShapeMismatch(format!(
                "PCA explained variance has length {}, expected {}",
                explained_variance.len(),
                self.n_components()
            )));
        }
        if explained_variance.iter().any(|v| *v <= 0.0) {
            return Err(ConfigurationError::ShapeMismatch(
                "PCA explained variance must be positive for whitening".into(),
            ));
        }
        self.whitening_scale = Some(DVector::from_iterator(
            explained_variance.len(),
            explained_variance.iter().map(|v| v.sqrt()),
        ));
        Ok(self)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let artifact: PcaArtifact = read_json(path)?;
        let transform = Self::new(artifact.mean, artifact.components)?;
        match (artifact.whiten, artifact.explained_variance) {
            (false, _) => Ok(transform),
            (true, Some(variance)) => transform.with_whitening(&variance),
            (true, None) => Err(ConfigurationError::InvalidArtifact {
                path: path.to_string_lossy().to_string(),
                reason: "whitening requires 'explained_variance'".into(),
            }),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.mean.len()
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Projects an `n × d` matrix onto the first `n_components` axes.
    pub fn transform(
        &self,
        data: &DMatrix<f64>,
        n_components: usize,
    ) -> Result<DMatrix<f64>, ConfigurationError> {
        if data.ncols() != self.input_dim() {
            return Err(ConfigurationError::ShapeMismatch(format!(
                "PCA input has {} columns, expected {}",
                data.ncols(),
                self.input_dim()
            )));
        }
        if n_components > self.n_components() {
            return Err(ConfigurationError::NotEnoughComponents {
                stem: String::new(),
                available: self.n_components(),
                requested: n_components,
            });
        }

        let mut centered = data.clone();
        for (j, mean) in self.mean.iter().enumerate() {
            centered.column_mut(j).add_scalar_mut(-mean);
        }
        let axes = self.components.rows(0, n_components).transpose();
        let mut projected = centered * axes;

        if let Some(scale) = &self.whitening_scale {
            for j in 0..n_components {
                let mut column = projected.column_mut(j);
                column /= scale[j];
            }
        }
        Ok(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn axis_aligned() -> PcaTransform {
        PcaTransform::new(
            vec![1.0, 2.0, 3.0],
            vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]],
        )
        .unwrap()
    }

    #[test]
    fn transform_centers_and_projects() {
        let pca = axis_aligned();
        let data = DMatrix::from_row_slice(2, 3, &[2.0, 5.0, 3.0, 0.0, 2.0, 7.0]);
        let out = pca.transform(&data, 2).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out[(0, 0)], 1.0);
        assert_eq!(out[(0, 1)], 0.0);
        assert_eq!(out[(1, 0)], -1.0);
        assert_eq!(out[(1, 1)], 4.0);
    }

    #[test]
    fn transform_can_use_fewer_components() {
        let pca = axis_aligned();
        let data = DMatrix::from_row_slice(1, 3, &[2.0, 5.0, 3.0]);
        assert_eq!(pca.transform(&data, 1).unwrap().shape(), (1, 1));
    }

    #[test]
    fn transform_rejects_too_many_components_and_wrong_width() {
        let pca = axis_aligned();
        let data = DMatrix::from_row_slice(1, 3, &[2.0, 5.0, 3.0]);
        assert!(matches!(
            pca.transform(&data, 3),
            Err(ConfigurationError::NotEnoughComponents {
                available: 2,
                requested: 3,
                ..
            })
        ));
        let narrow = DMatrix::from_row_slice(1, 2, &[2.0, 5.0]);
        assert!(matches!(
            pca.transform(&narrow, 1),
            Err(ConfigurationError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn whitening_divides_by_component_standard_deviation() {
        let pca = axis_aligned().with_whitening(&[4.0, 16.0]).unwrap();
        let data = DMatrix::from_row_slice(1, 3, &[3.0, 0.0, 7.0]);
        let out = pca.transform(&data, 2).unwrap();
        assert_eq!(out[(0, 0)], 1.0);
        assert_eq!(out[(0, 1)], 1.0);
    }

    #[test]
    fn new_rejects_ragged_components() {
        assert!(PcaTransform::new(vec![0.0, 0.0], vec![vec![1.0]]).is_err());
    }

    #[test]
    fn load_reads_json_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pca.json");
        fs::write(
            &path,
            r#"{"mean": [0.0, 0.0], "components": [[0.0, 1.0]], "explained_variance": [0.25], "whiten": true}"#,
        )
        .unwrap();
        let pca = PcaTransform::load(&path).unwrap();
        assert_eq!(pca.input_dim(), 2);
        assert_eq!(pca.n_components(), 1);
        let out = pca
            .transform(&DMatrix::from_row_slice(1, 2, &[9.0, 1.0]), 1)
            .unwrap();
        assert_eq!(out[(0, 0)], 2.0);
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            PcaTransform::load(&dir.path().join("absent.json")),
            Err(ConfigurationError::MissingArtifact { .. })
        ));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"mean\": [").unwrap();
        assert!(matches!(
            PcaTransform::load(&path),
            Err(ConfigurationError::Artifact(_))
        ));
    }
}
