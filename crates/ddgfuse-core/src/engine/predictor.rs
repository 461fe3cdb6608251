use super::config::PredictorConfig;
use super::context::BuildContext;
use super::domain::match_domains;
use super::error::PipelineError;
use super::extract::{MutationFeatures, extract};
use crate::core::ensemble::artifacts::{ArtifactLayout, ArtifactStore};
use crate::core::ensemble::error::ConfigurationError;
use crate::core::ensemble::scorer::EnsembleScorer;
use crate::core::features::coi::Coi;
use crate::core::features::delta::synthesize_deltas;
use crate::core::features::record::FeatureRecord;
use crate::core::models::domain::DomainTarget;
use crate::core::models::mutation::Mutation;
use crate::core::models::structure::Structure;
use crate::plugins::error::AnalyzeError;
use crate::plugins::{FeaturePlugin, PluginData, PluginSlot, SequenceInputs, StructureInputs};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, trace};

/// Entry point of the prediction pipeline.
///
/// A predictor owns the registered plugins with their loaded models and the
/// trained ensemble artifacts. It is built once and reused for any number of
/// structures.
#[derive(Debug)]
pub struct Predictor {
    config: PredictorConfig,
    plugins: Vec<PluginSlot>,
    artifacts: ArtifactStore,
    scorer: EnsembleScorer,
}

impl Predictor {
    /// Loads every plugin's model on the configured device and the core
    /// ensemble. The interface ensemble is loaded on first use.
    #[instrument(skip_all, name = "predictor_init")]
    pub fn new(
        config: PredictorConfig,
        plugins: Vec<Box<dyn FeaturePlugin>>,
    ) -> Result<Self, PipelineError> {
        let plugins: Vec<PluginSlot> = plugins.into_iter().map(PluginSlot::new).collect();
        for slot in &plugins {
            slot.load(config.device)?;
        }

        let artifacts = ArtifactStore::new(ArtifactLayout::new(&config.artifacts_dir));
        artifacts.get(Coi::Core)?;

        let scorer = EnsembleScorer::new(config.n_components, config.strict_columns);
        info!(
            plugins = plugins.len(),
            device = %config.device,
            artifacts = %config.artifacts_dir.display(),
            "Predictor ready."
        );
        Ok(Self {
            config,
            plugins,
            artifacts,
            scorer,
        })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn plugins(&self) -> &[PluginSlot] {
        &self.plugins
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Prepares every plugin for analyzing mutations of `protein_sequence`.
    ///
    /// With a ligand sequence the context describes the protein-ligand
    /// interface, otherwise the protein alone.
    #[instrument(skip_all, name = "build_context", fields(ligand = ligand_sequence.is_some()))]
    pub fn build(
        &self,
        structure: &Structure,
        protein_sequence: &str,
        ligand_sequence: Option<&str>,
        remove_heteroatoms: bool,
    ) -> Result<BuildContext, PipelineError> {
        let domains = match_domains(
            structure,
            protein_sequence,
            ligand_sequence,
            remove_heteroatoms,
        );
        let protein_domain = domains
            .protein
            .ok_or(PipelineError::DomainNotFound { target: "protein" })?;
        if ligand_sequence.is_some() && domains.ligand.is_none() {
            return Err(PipelineError::DomainNotFound { target: "ligand" });
        }

        let mut domain_defs = vec![protein_domain];
        domain_defs.extend(domains.ligand);
        let extracted = structure.extract_domains(&domain_defs, remove_heteroatoms)?;

        let sequence = SequenceInputs {
            protein_sequence,
            ligand_sequence,
            remove_heteroatoms,
        };
        let structure_inputs = StructureInputs {
            structure: &extracted,
            sequence,
            contact_cutoff: self.config.contact_cutoff,
        };

        let mut plugin_data: BTreeMap<&'static str, PluginData> = BTreeMap::new();
        for slot in &self.plugins {
            let plugin = slot.plugin();
            let model = slot.load(self.config.device)?;
            let built = if let Some(builder) = plugin.as_structure_builder() {
                builder.build_from_structure(model, &structure_inputs)
            } else if let Some(builder) = plugin.as_sequence_builder() {
                builder.build_from_sequence(model, &sequence)
            } else {
                continue;
            };
            let data = built.map_err(|source| PipelineError::Build {
                plugin: slot.name(),
                source,
            })?;
            debug!(plugin = slot.name(), "Plugin build finished.");
            plugin_data.insert(slot.name(), data);
        }

        Ok(BuildContext::new(
            protein_domain,
            domains.ligand,
            plugin_data,
        ))
    }

    /// Parses `mutation` (chain `A` when none is given) and collects every
    /// plugin's features for it.
    pub fn analyze_mutation(
        &self,
        mutation: &str,
        context: &BuildContext,
    ) -> Result<MutationFeatures, PipelineError> {
        let parsed = parse_mutation(mutation)?;
        extract(&parsed, context, &self.plugins, self.config.device)
    }

    /// Predicts one ΔΔG value per mutation.
    ///
    /// Without `affinity` the stability (core) ensemble is used. With it, the
    /// two lists must describe the same mutations in the same order; each pair
    /// is merged and scored by the interface ensemble.
    #[instrument(skip_all, name = "predict_mutation_effect", fields(mutations = stability.len()))]
    pub fn predict_mutation_effect(
        &self,
        stability: &[MutationFeatures],
        affinity: Option<&[MutationFeatures]>,
    ) -> Result<Vec<f64>, PipelineError> {
        let merged: Vec<FeatureRecord> = match affinity {
            None => stability.iter().map(|m| m.features.clone()).collect(),
            Some(affinity) => {
                check_alignment(
                    stability.iter().map(|m| m.mutation),
                    affinity.iter().map(|m| m.mutation),
                )?;
                stability
                    .iter()
                    .zip(affinity)
                    .map(|(s, a)| -> Result<FeatureRecord, ConfigurationError> {
                        let mut record = s.features.clone();
                        record.merge(a.features.clone())?;
                        Ok(record)
                    })
                    .collect::<Result<_, _>>()?
            }
        };

        let coi = Coi::for_ligand(affinity.is_some());
        let mut records = Vec::with_capacity(merged.len());
        let mut pca_columns = BTreeSet::new();
        for record in &merged {
            let synthesized = synthesize_deltas(record).map_err(ConfigurationError::from)?;
            trace!(pca_eligible = ?synthesized.pca_columns, "Synthesized delta features.");
            pca_columns.extend(synthesized.pca_columns);
            records.push(synthesized.record);
        }
        let pca_columns: Vec<String> = pca_columns.into_iter().collect();

        let models = self.artifacts.get(coi)?;
        Ok(self.scorer.score(models, &records, &pca_columns)?)
    }

    /// Applies `mutations` to the structure built by the first plugin that can
    /// mutate.
    pub fn mutate(
        &self,
        mutations: &[&str],
        context: &BuildContext,
    ) -> Result<Structure, PipelineError> {
        let parsed = mutations
            .iter()
            .map(|m| parse_mutation(m))
            .collect::<Result<Vec<_>, _>>()?;
        let (slot, mutator) = self
            .plugins
            .iter()
            .find_map(|slot| slot.plugin().as_mutator().map(|m| (slot, m)))
            .ok_or(PipelineError::MissingCapability {
                plugin: "any".into(),
                capability: "mutator",
            })?;
        let data = context.data(slot.name()).ok_or_else(|| PipelineError::Analyze {
            mutation: mutations.join(","),
            source: AnalyzeError::MissingData {
                plugin: slot.name(),
            },
        })?;
        mutator
            .mutate(&parsed, data)
            .map_err(|source| PipelineError::Analyze {
                mutation: mutations.join(","),
                source,
            })
    }

    /// Threads `targets` onto the template chains built by the first plugin
    /// that can model homology.
    pub fn create_model(
        &self,
        targets: &[DomainTarget],
        context: &BuildContext,
    ) -> Result<Structure, PipelineError> {
        let (slot, modeler) = self
            .plugins
            .iter()
            .find_map(|slot| slot.plugin().as_homology_modeler().map(|m| (slot, m)))
            .ok_or(PipelineError::MissingCapability {
                plugin: "any".into(),
                capability: "homology modeler",
            })?;
        let data = context
            .data(slot.name())
            .ok_or(PipelineError::MissingCapability {
                plugin: slot.name().into(),
                capability: "structure builder",
            })?;
        modeler
            .create_model(targets, data)
            .map_err(|source| PipelineError::Build {
                plugin: slot.name(),
                source,
            })
    }
}

fn parse_mutation(mutation: &str) -> Result<Mutation, PipelineError> {
    mutation.parse().map_err(|e| PipelineError::Analyze {
        mutation: mutation.to_string(),
        source: AnalyzeError::ParseMutation(e),
    })
}

/// Checks that two mutation lists have equal length and agree index by index.
pub(crate) fn check_alignment(
    left: impl ExactSizeIterator<Item = Mutation>,
    right: impl ExactSizeIterator<Item = Mutation>,
) -> Result<(), PipelineError> {
    if left.len() != right.len() {
        return Err(PipelineError::MisalignedResults {
            reason: format!("{} stability vs {} affinity results", left.len(), right.len()),
        });
    }
    for (idx, (l, r)) in left.zip(right).enumerate() {
        if l != r {
            return Err(PipelineError::MisalignedResults {
                reason: format!("position {} holds '{}' and '{}'", idx, l, r),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::core::ensemble::artifacts::fixtures::write_model_set;
    use crate::engine::config::PredictorConfigBuilder;
    use crate::plugins::{protbert, proteinsolver};
    use std::path::Path;

    /// Scalar columns and PCA stems that the mock plugins yield after delta
    /// synthesis for `coi`. An interface record also carries the core
    /// features of the stability pass and their core→interface changes.
    pub(crate) fn mock_columns(coi: Coi) -> (Vec<String>, Vec<String>) {
        let segments: &[&str] = match coi {
            Coi::Core => &["core"],
            Coi::Interface => &["core", "interface", "core2interface"],
        };
        let mut scalars = Vec::new();
        let mut stems = Vec::new();
        for segment in segments {
            let scores: &[&str] = if *segment == "core2interface" {
                &["score_wt", "score_change"]
            } else {
                &["score_wt", "score_mut", "score_change"]
            };
            for plugin in ["protbert", "proteinsolver"] {
                scalars.extend(scores.iter().map(|s| format!("{plugin}_{segment}_{s}")));
            }
            for level in ["residue", "protein"] {
                for suffix in ["wt", "change"] {
                    stems.push(format!("protbert_{segment}_features_{level}_{suffix}"));
                }
            }
        }
        (scalars, stems)
    }

    /// Writes a two-fold ensemble for `coi` over every column the mock
    /// plugins produce. It splits on the second principal component of
    /// `protbert_<coi>_features_residue_change`.
    ///
    /// Mutations to a residue with a lower character code than the wild type
    /// predict 0.5, others 10.5.
    pub(crate) fn write_ensemble(root: &Path, coi: Coi) {
        let (scalars, stems) = mock_columns(coi);
        write_ensemble_with(root, coi, &scalars, &stems);
    }

    pub(crate) fn write_ensemble_with(root: &Path, coi: Coi, scalars: &[String], stems: &[String]) {
        let scalars: Vec<&str> = scalars.iter().map(String::as_str).collect();
        let stems: Vec<&str> = stems.iter().map(String::as_str).collect();
        let split = format!("protbert_{}_features_residue_change_1_pc", coi);
        write_model_set(root, coi, 2, &stems, 2, 2, &scalars, &split);
    }

    pub(crate) fn mock_plugins() -> Vec<Box<dyn FeaturePlugin>> {
        vec![
            Box::new(protbert::mock::plugin()),
            Box::new(proteinsolver::mock::plugin()),
        ]
    }

    pub(crate) fn predictor(root: &Path) -> Predictor {
        let config = PredictorConfigBuilder::new()
            .artifacts_dir(root)
            .n_components(2)
            .build()
            .unwrap();
        Predictor::new(config, mock_plugins()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{mock_columns, predictor, write_ensemble, write_ensemble_with};
    use super::*;
    use crate::core::models::domain::DomainDef;
    use crate::plugins::proteinsolver::fixtures::linear_structure;
    use tempfile::tempdir;

    const SEQUENCE: &str = "MVLSPADKT";

    #[test]
    fn new_fails_without_core_artifacts() {
        let dir = tempdir().unwrap();
        let config = crate::engine::config::PredictorConfigBuilder::new()
            .artifacts_dir(dir.path())
            .build()
            .unwrap();
        let result = Predictor::new(config, fixtures::mock_plugins());
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn build_creates_core_context_with_data_for_every_builder() {
        let dir = tempdir().unwrap();
        write_ensemble(dir.path(), Coi::Core);
        let predictor = predictor(dir.path());
        assert!(predictor.plugins().iter().all(PluginSlot::is_loaded));

        let structure = linear_structure(&[('A', SEQUENCE)]);
        let context = predictor.build(&structure, SEQUENCE, None, true).unwrap();
        assert_eq!(context.coi(), Coi::Core);
        assert_eq!(context.protein_domain(), &DomainDef::new('A', 1, 10));
        assert!(context.data("protbert").is_some());
        assert!(context.data("proteinsolver").is_some());
    }

    #[test]
    fn build_requires_matching_domains() {
        let dir = tempdir().unwrap();
        write_ensemble(dir.path(), Coi::Core);
        let predictor = predictor(dir.path());
        let structure = linear_structure(&[('A', SEQUENCE)]);

        assert!(matches!(
            predictor.build(&structure, "MVL", None, true),
            Err(PipelineError::DomainNotFound { target: "protein" })
        ));
        assert!(matches!(
            predictor.build(&structure, SEQUENCE, Some("GS"), true),
            Err(PipelineError::DomainNotFound { target: "ligand" })
        ));
    }

    #[test]
    fn analyze_accepts_matching_wild_type_and_rejects_others() {
        let dir = tempdir().unwrap();
        write_ensemble(dir.path(), Coi::Core);
        let predictor = predictor(dir.path());
        let structure = linear_structure(&[('A', SEQUENCE)]);
        let context = predictor.build(&structure, SEQUENCE, None, true).unwrap();

        let features = predictor.analyze_mutation("M1A", &context).unwrap();
        assert_eq!(features.mutation.chain_id, 'A');
        assert!(features.features.contains_key("protbert_core_score_wt"));
        assert!(features.features.contains_key("proteinsolver_core_score_mut"));

        assert!(matches!(
            predictor.analyze_mutation("A_V1A", &context),
            Err(PipelineError::Analyze {
                source: AnalyzeError::WildTypeMismatch { .. },
                ..
            })
        ));
        assert!(matches!(
            predictor.analyze_mutation("M1", &context),
            Err(PipelineError::Analyze {
                source: AnalyzeError::ParseMutation(_),
                ..
            })
        ));
    }

    #[test]
    fn protein_only_prediction_uses_core_artifacts_only() {
        let dir = tempdir().unwrap();
        write_ensemble(dir.path(), Coi::Core);
        let predictor = predictor(dir.path());
        let structure = linear_structure(&[('A', SEQUENCE)]);
        let context = predictor.build(&structure, SEQUENCE, None, true).unwrap();

        let features: Vec<MutationFeatures> = ["M1A", "M1W"]
            .iter()
            .map(|m| predictor.analyze_mutation(m, &context).unwrap())
            .collect();
        let predictions = predictor.predict_mutation_effect(&features, None).unwrap();

        assert_eq!(predictions, vec![0.5, 10.5]);
        assert!(predictor.artifacts().is_loaded(Coi::Core));
        assert!(!predictor.artifacts().is_loaded(Coi::Interface));
    }

    #[test]
    fn affinity_prediction_uses_interface_artifacts() {
        let dir = tempdir().unwrap();
        write_ensemble(dir.path(), Coi::Core);
        write_ensemble(dir.path(), Coi::Interface);
        let predictor = predictor(dir.path());
        let structure = linear_structure(&[('A', SEQUENCE), ('B', "GS")]);

        let stability_context = predictor.build(&structure, SEQUENCE, None, true).unwrap();
        let affinity_context = predictor
            .build(&structure, SEQUENCE, Some("GS"), true)
            .unwrap();
        assert!(affinity_context.is_interface());

        let stability = vec![predictor.analyze_mutation("M1A", &stability_context).unwrap()];
        let affinity = vec![predictor.analyze_mutation("M1A", &affinity_context).unwrap()];
        assert!(affinity[0].features.contains_key("protbert_interface_score_wt"));

        let predictions = predictor
            .predict_mutation_effect(&stability, Some(&affinity))
            .unwrap();
        assert_eq!(predictions, vec![0.5]);
        assert!(predictor.artifacts().is_loaded(Coi::Interface));
    }

    #[test]
    fn misaligned_stability_and_affinity_results_fail() {
        let dir = tempdir().unwrap();
        write_ensemble(dir.path(), Coi::Core);
        write_ensemble(dir.path(), Coi::Interface);
        let predictor = predictor(dir.path());
        let structure = linear_structure(&[('A', SEQUENCE), ('B', "GS")]);
        let stability_context = predictor.build(&structure, SEQUENCE, None, true).unwrap();
        let affinity_context = predictor
            .build(&structure, SEQUENCE, Some("GS"), true)
            .unwrap();

        let stability: Vec<_> = ["M1A", "V2A"]
            .iter()
            .map(|m| predictor.analyze_mutation(m, &stability_context).unwrap())
            .collect();
        let affinity_short = vec![predictor.analyze_mutation("M1A", &affinity_context).unwrap()];
        assert!(matches!(
            predictor.predict_mutation_effect(&stability, Some(&affinity_short)),
            Err(PipelineError::MisalignedResults { .. })
        ));

        let affinity_swapped: Vec<_> = ["V2A", "M1A"]
            .iter()
            .map(|m| predictor.analyze_mutation(m, &affinity_context).unwrap())
            .collect();
        assert!(matches!(
            predictor.predict_mutation_effect(&stability, Some(&affinity_swapped)),
            Err(PipelineError::MisalignedResults { .. })
        ));
        assert!(!predictor.artifacts().is_loaded(Coi::Interface));
    }

    #[test]
    fn mutate_and_create_model_dispatch_to_capable_plugin() {
        let dir = tempdir().unwrap();
        write_ensemble(dir.path(), Coi::Core);
        let predictor = predictor(dir.path());
        let structure = linear_structure(&[('A', SEQUENCE)]);
        let context = predictor.build(&structure, SEQUENCE, None, true).unwrap();

        let mutated = predictor.mutate(&["M1A", "K8E"], &context).unwrap();
        assert_eq!(mutated.sequence(None), "AVLSPADET");

        let target = DomainTarget {
            chain_id: 'A',
            target_sequence: "MVLSPADRT".into(),
        };
        let model = predictor.create_model(&[target], &context).unwrap();
        assert_eq!(model.sequence(None), "MVLSPADRT");
        assert_eq!(model.chain('A').map(|c| c.len()), Some(9));
    }

    fn core_features(predictor: &Predictor, mutations: &[&str]) -> Vec<MutationFeatures> {
        let structure = linear_structure(&[('A', SEQUENCE)]);
        let context = predictor.build(&structure, SEQUENCE, None, true).unwrap();
        mutations
            .iter()
            .map(|m| predictor.analyze_mutation(m, &context).unwrap())
            .collect()
    }

    #[test]
    fn default_config_scores_every_synthesized_column() {
        let dir = tempdir().unwrap();
        write_ensemble(dir.path(), Coi::Core);
        let predictor = predictor(dir.path());
        assert!(predictor.config().strict_columns);

        let features = core_features(&predictor, &["M1A"]);
        assert_eq!(predictor.predict_mutation_effect(&features, None).unwrap(), vec![0.5]);
    }

    #[test]
    fn strict_scoring_rejects_columns_missing_from_the_model() {
        let (mut scalars, stems) = mock_columns(Coi::Core);
        scalars.retain(|c| c != "protbert_core_score_mut");
        let dir = tempdir().unwrap();
        write_ensemble_with(dir.path(), Coi::Core, &scalars, &stems);
        let predictor = predictor(dir.path());

        let features = core_features(&predictor, &["M1A"]);
        let err = predictor.predict_mutation_effect(&features, None).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(ConfigurationError::ColumnMismatch { ref reason, .. })
                if reason.contains("protbert_core_score_mut")
        ));
    }

    #[test]
    fn strict_scoring_rejects_unpersisted_pca_features() {
        let (scalars, mut stems) = mock_columns(Coi::Core);
        stems.retain(|s| s == "protbert_core_features_residue_change");
        let dir = tempdir().unwrap();
        write_ensemble_with(dir.path(), Coi::Core, &scalars, &stems);
        let predictor = predictor(dir.path());

        let features = core_features(&predictor, &["M1A"]);
        let err = predictor.predict_mutation_effect(&features, None).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(ConfigurationError::ColumnMismatch { ref reason, .. })
                if reason.contains("protbert_core_features_protein_change")
        ));
    }
}
