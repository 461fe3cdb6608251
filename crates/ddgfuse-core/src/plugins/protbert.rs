use super::{
    AnalyzeError, BackendError, BuildError, Device, FeaturePlugin, ModelError, ModelHandle,
    ModelLoader, MutationAnalyzer, PluginData, SequenceBuilder, SequenceInputs,
};
use crate::core::features::record::{FeatureRecord, FeatureValue};
use crate::core::models::mutation::Mutation;
use crate::core::utils::identifiers::{UNKNOWN_RESIDUE_MARKER, is_standard_amino_acid};
use nalgebra::DMatrix;
use std::sync::Arc;
use tracing::trace;

pub const PROTBERT: &str = "protbert";

/// A protein language model backend.
pub trait LanguageModel: Send {
    /// Ranked `(residue, probability)` candidates for the masked `position`
    /// (0-based) of `sequence`. Residues absent from the list have negligible
    /// probability.
    fn fill_mask(&mut self, sequence: &str, position: usize)
    -> Result<Vec<(char, f64)>, BackendError>;

    /// Per-residue embeddings, one row per residue of `sequence`.
    fn embed(&mut self, sequence: &str) -> Result<DMatrix<f64>, BackendError>;
}

/// The sequence a [`ProtBert`] build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtBertData {
    pub sequence: String,
}

/// Sequence-only plugin backed by a masked protein language model.
///
/// Emits `score_wt`/`score_mut` (masked-position probabilities of the two
/// residues) and residue-level and protein-level embeddings of the wild-type
/// and mutant sequences.
pub struct ProtBert<L> {
    loader: ModelLoader<L>,
}

impl<L: LanguageModel + 'static> ProtBert<L> {
    pub fn new(loader: impl Fn(Device) -> Result<L, BackendError> + Send + Sync + 'static) -> Self {
        Self {
            loader: Box::new(loader),
        }
    }

    fn forward_error(source: BackendError) -> ModelError {
        ModelError::Forward {
            plugin: PROTBERT,
            source,
        }
    }

    fn embed(model: &mut L, sequence: &str) -> Result<DMatrix<f64>, AnalyzeError> {
        let embedding = model.embed(sequence).map_err(Self::forward_error)?;
        let length = sequence.chars().count();
        if embedding.nrows() != length || embedding.ncols() == 0 {
            return Err(ModelError::MalformedOutput {
                plugin: PROTBERT,
                reason: format!(
                    "embedding of shape {}x{} for a sequence of length {}",
                    embedding.nrows(),
                    embedding.ncols(),
                    length
                ),
            }
            .into());
        }
        Ok(embedding)
    }
}

fn row_vector(matrix: &DMatrix<f64>, row: usize) -> Vec<f64> {
    matrix.row(row).iter().copied().collect()
}

fn column_means(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.row_mean().iter().copied().collect()
}

impl<L: LanguageModel + 'static> FeaturePlugin for ProtBert<L> {
    fn name(&self) -> &'static str {
        PROTBERT
    }

    fn load_model(&self, device: Device) -> Result<ModelHandle, ModelError> {
        let model = (self.loader)(device).map_err(|source| ModelError::Load {
            plugin: PROTBERT,
            device: device.to_string(),
            source,
        })?;
        Ok(ModelHandle::new(PROTBERT, device, model))
    }

    fn as_sequence_builder(&self) -> Option<&dyn SequenceBuilder> {
        Some(self)
    }

    fn as_mutation_analyzer(&self) -> Option<&dyn MutationAnalyzer> {
        Some(self)
    }
}

impl<L: LanguageModel + 'static> SequenceBuilder for ProtBert<L> {
    fn build_from_sequence(
        &self,
        _model: &ModelHandle,
        inputs: &SequenceInputs<'_>,
    ) -> Result<PluginData, BuildError> {
        let sequence = inputs.expected_sequence();
        if sequence.is_empty() {
            return Err(BuildError::InvalidSequence("sequence is empty".into()));
        }
        if let Some(bad) = sequence
            .chars()
            .find(|&c| !is_standard_amino_acid(c) && c != UNKNOWN_RESIDUE_MARKER)
        {
            return Err(BuildError::InvalidSequence(format!(
                "unexpected residue code '{}'",
                bad
            )));
        }
        Ok(Arc::new(ProtBertData { sequence }))
    }
}

impl<L: LanguageModel + 'static> MutationAnalyzer for ProtBert<L> {
    fn analyze_mutation(
        &self,
        model: &ModelHandle,
        mutation: &Mutation,
        data: &PluginData,
    ) -> Result<FeatureRecord, AnalyzeError> {
        let data = data
            .downcast_ref::<ProtBertData>()
            .ok_or(AnalyzeError::MissingData { plugin: PROTBERT })?;

        let residues: Vec<char> = data.sequence.chars().collect();
        let idx = mutation.index();
        let found = *residues
            .get(idx)
            .ok_or_else(|| AnalyzeError::PositionOutOfRange {
                mutation: mutation.to_string(),
                length: residues.len(),
            })?;
        if found != mutation.residue_wt {
            return Err(AnalyzeError::WildTypeMismatch {
                mutation: mutation.to_string(),
                declared: mutation.residue_wt,
                found,
            });
        }

        let mut mutant = residues.clone();
        mutant[idx] = mutation.residue_mut;
        let mutant: String = mutant.into_iter().collect();

        let mut lm = model.lock::<L>()?;
        let candidates = lm
            .fill_mask(&data.sequence, idx)
            .map_err(Self::forward_error)?;
        let probability = |residue: char| {
            candidates
                .iter()
                .find(|(candidate, _)| *candidate == residue)
                .map_or(0.0, |(_, p)| *p)
        };
        let score_wt = probability(mutation.residue_wt);
        let score_mut = probability(mutation.residue_mut);

        let embedding_wt = Self::embed(&mut lm, &data.sequence)?;
        let embedding_mut = Self::embed(&mut lm, &mutant)?;
        drop(lm);
        trace!(mutation = %mutation, score_wt, score_mut, "ProtBert scores.");

        let mut features = FeatureRecord::new();
        let entries: [(&str, FeatureValue); 6] = [
            ("score_wt", score_wt.into()),
            ("score_mut", score_mut.into()),
            ("features_residue_wt", row_vector(&embedding_wt, idx).into()),
            ("features_protein_wt", column_means(&embedding_wt).into()),
            ("features_residue_mut", row_vector(&embedding_mut, idx).into()),
            ("features_protein_mut", column_means(&embedding_mut).into()),
        ];
        for (name, value) in entries {
            features
                .insert(name, value)
                .map_err(|e| ModelError::MalformedOutput {
                    plugin: PROTBERT,
                    reason: e.to_string(),
                })?;
        }
        Ok(features)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockLanguageModel, plugin};
    use super::*;

    fn build(sequence: &str, ligand: Option<&str>) -> (ProtBert<MockLanguageModel>, ModelHandle, PluginData) {
        let plugin = plugin();
        let model = plugin.load_model(Device::Cpu).unwrap();
        let data = plugin
            .build_from_sequence(
                &model,
                &SequenceInputs {
                    protein_sequence: sequence,
                    ligand_sequence: ligand,
                    remove_heteroatoms: true,
                },
            )
            .unwrap();
        (plugin, model, data)
    }

    #[test]
    fn build_concatenates_ligand_and_drops_unknowns() {
        let (_, _, data) = build("MVXL", Some("GS"));
        assert_eq!(data.downcast_ref::<ProtBertData>().unwrap().sequence, "MVLGS");
    }

    #[test]
    fn build_rejects_non_residue_characters() {
        let plugin = plugin();
        let model = plugin.load_model(Device::Cpu).unwrap();
        let result = plugin.build_from_sequence(
            &model,
            &SequenceInputs {
                protein_sequence: "MV1L",
                ligand_sequence: None,
                remove_heteroatoms: true,
            },
        );
        assert!(matches!(result, Err(BuildError::InvalidSequence(_))));
    }

    #[test]
    fn analyze_accepts_matching_wild_type() {
        let (plugin, model, data) = build("MVLSPADKT", None);
        let mutation: Mutation = "A_M1A".parse().unwrap();
        let features = plugin.analyze_mutation(&model, &mutation, &data).unwrap();

        let keys: Vec<&str> = features.keys().collect();
        assert_eq!(
            keys,
            [
                "score_wt",
                "score_mut",
                "features_residue_wt",
                "features_protein_wt",
                "features_residue_mut",
                "features_protein_mut",
            ]
        );
        assert_eq!(features.get("score_wt").unwrap().as_scalar(), Some(0.6));
        assert_eq!(features.get("score_mut").unwrap().as_scalar(), Some(0.3));
        assert_eq!(
            features.get("features_residue_wt").unwrap().as_vector(),
            Some(&[0.0, 'M' as u32 as f64][..])
        );
        assert_eq!(
            features.get("features_residue_mut").unwrap().as_vector(),
            Some(&[0.0, 'A' as u32 as f64][..])
        );
        let protein_wt = features.get("features_protein_wt").unwrap().as_vector().unwrap();
        assert_eq!(protein_wt.len(), 2);
        assert!((protein_wt[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn analyze_rejects_wrong_wild_type() {
        let (plugin, model, data) = build("MVLSPADKT", None);
        let mutation: Mutation = "A_V1A".parse().unwrap();
        let err = plugin.analyze_mutation(&model, &mutation, &data).unwrap_err();
        assert!(matches!(
            err,
            AnalyzeError::WildTypeMismatch {
                declared: 'V',
                found: 'M',
                ..
            }
        ));
        // Validation happens before any forward pass.
        assert_eq!(model.lock::<MockLanguageModel>().unwrap().calls, 0);
    }

    #[test]
    fn analyze_rejects_positions_past_the_end() {
        let (plugin, model, data) = build("MVL", None);
        let mutation: Mutation = "L4A".parse().unwrap();
        assert!(matches!(
            plugin.analyze_mutation(&model, &mutation, &data),
            Err(AnalyzeError::PositionOutOfRange { length: 3, .. })
        ));
    }

    #[test]
    fn residues_missing_from_the_mask_distribution_score_zero() {
        let (plugin, model, data) = build("MVL", None);
        let mutation: Mutation = "V2W".parse().unwrap();
        let features = plugin.analyze_mutation(&model, &mutation, &data).unwrap();
        assert_eq!(features.get("score_mut").unwrap().as_scalar(), Some(0.0));
    }

    #[test]
    fn analyze_requires_protbert_data() {
        let (plugin, model, _) = build("MVL", None);
        let foreign: PluginData = Arc::new(42_u32);
        let mutation: Mutation = "M1A".parse().unwrap();
        assert!(matches!(
            plugin.analyze_mutation(&model, &mutation, &foreign),
            Err(AnalyzeError::MissingData { plugin: PROTBERT })
        ));
    }

    #[test]
    fn loader_failures_become_model_errors() {
        let plugin: ProtBert<MockLanguageModel> = ProtBert::new(|device| {
            Err(format!("no weights for {}", device).into())
        });
        let err = plugin.load_model(Device::Cuda(1)).unwrap_err();
        assert!(err.to_string().contains("cuda:1"));
    }
}
