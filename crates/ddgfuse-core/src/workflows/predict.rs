use crate::core::ensemble::error::path_string;
use crate::core::features::coi::Coi;
use crate::core::features::record::feature_key;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::mutation::Mutation;
use crate::core::models::structure::Structure;
use crate::engine::context::BuildContext;
use crate::engine::error::PipelineError;
use crate::engine::extract::MutationFeatures;
use crate::engine::predictor::Predictor;
use crate::engine::progress::{Progress, ProgressReporter};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Prediction for one mutation under one COI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoiPrediction {
    /// `score_wt - score_mut` of every plugin reporting paired scores, keyed
    /// by `<plugin>_<coi>`.
    pub plugin_scores: BTreeMap<String, f64>,
    /// Ensemble ΔΔG prediction.
    pub ensemble: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationReport {
    pub mutation: String,
    pub core: Option<CoiPrediction>,
    pub interface: Option<CoiPrediction>,
    /// First analysis error encountered for this mutation.
    pub error: Option<String>,
}

impl MutationReport {
    fn new(mutation: &str) -> Self {
        Self {
            mutation: mutation.to_string(),
            core: None,
            interface: None,
            error: None,
        }
    }
}

/// Splits a mutation list on `,` and `.`, dropping blanks.
pub fn split_mutations(mutations: &str) -> Vec<&str> {
    mutations
        .split([',', '.'])
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .collect()
}

/// Predicts stability and, when `ligand_sequence` is given, binding-affinity
/// changes for every mutation in `mutations`.
///
/// A mutation that cannot be analyzed gets an error in its report and is left
/// out of the remaining passes; it never aborts the batch.
#[instrument(skip_all, name = "prediction_workflow")]
pub fn run(
    predictor: &Predictor,
    structure_path: &Path,
    protein_sequence: &str,
    mutations: &str,
    ligand_sequence: Option<&str>,
    reporter: &ProgressReporter,
) -> Result<Vec<MutationReport>, PipelineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let (structure, _) =
        PdbFile::read_from_path(structure_path).map_err(|source| PipelineError::Structure {
            path: path_string(structure_path),
            source,
        })?;
    let mutation_list = split_mutations(mutations);
    let mut reports: Vec<MutationReport> =
        mutation_list.iter().map(|m| MutationReport::new(m)).collect();
    info!(
        mutations = mutation_list.len(),
        ligand = ligand_sequence.is_some(),
        "Starting prediction workflow."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Stability ===
    let candidates: Vec<usize> = (0..reports.len()).collect();
    let stability = analyze_pass(
        predictor,
        &structure,
        protein_sequence,
        None,
        &candidates,
        &mut reports,
        reporter,
    )?;
    let stability_features: Vec<MutationFeatures> =
        stability.iter().map(|(_, f)| f.clone()).collect();
    reporter.report(Progress::PhaseStart {
        name: "Stability scoring",
    });
    let core_predictions = predictor.predict_mutation_effect(&stability_features, None)?;
    reporter.report(Progress::PhaseFinish);
    assign_predictions(&mut reports, &stability, &core_predictions, Coi::Core)?;

    // === Phase 2: Affinity ===
    if let Some(ligand) = ligand_sequence {
        let candidates: Vec<usize> = stability.iter().map(|(idx, _)| *idx).collect();
        let affinity = analyze_pass(
            predictor,
            &structure,
            protein_sequence,
            Some(ligand),
            &candidates,
            &mut reports,
            reporter,
        )?;

        let paired_stability: Vec<MutationFeatures> = stability
            .iter()
            .filter(|(idx, _)| affinity.iter().any(|(a, _)| a == idx))
            .map(|(_, f)| f.clone())
            .collect();
        let affinity_features: Vec<MutationFeatures> =
            affinity.iter().map(|(_, f)| f.clone()).collect();
        reporter.report(Progress::PhaseStart {
            name: "Affinity scoring",
        });
        let interface_predictions =
            predictor.predict_mutation_effect(&paired_stability, Some(&affinity_features))?;
        reporter.report(Progress::PhaseFinish);
        assign_predictions(
            &mut reports,
            &affinity,
            &interface_predictions,
            Coi::Interface,
        )?;
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    info!(
        succeeded = reports.len() - failed,
        failed, "Prediction workflow complete."
    );
    reporter.report(Progress::Message(format!(
        "{} of {} mutations scored",
        reports.len() - failed,
        reports.len()
    )));
    Ok(reports)
}

/// Builds a context and analyzes the mutations at `candidates`, recording
/// per-mutation failures in `reports`.
fn analyze_pass(
    predictor: &Predictor,
    structure: &Structure,
    protein_sequence: &str,
    ligand_sequence: Option<&str>,
    candidates: &[usize],
    reports: &mut [MutationReport],
    reporter: &ProgressReporter,
) -> Result<Vec<(usize, MutationFeatures)>, PipelineError> {
    let name = if ligand_sequence.is_some() {
        "Affinity"
    } else {
        "Stability"
    };
    reporter.report(Progress::PhaseStart { name });
    let context: BuildContext = predictor.build(
        structure,
        protein_sequence,
        ligand_sequence,
        predictor.config().remove_heteroatoms,
    )?;

    reporter.report(Progress::TaskStart {
        total_steps: candidates.len() as u64,
    });
    let mut analyzed = Vec::with_capacity(candidates.len());
    for &idx in candidates {
        let report = &mut reports[idx];
        match predictor.analyze_mutation(&report.mutation, &context) {
            Ok(features) => analyzed.push((idx, features)),
            Err(err @ PipelineError::Analyze { .. }) => {
                warn!(mutation = %report.mutation, error = %err, "Skipping mutation.");
                reporter.report(Progress::MutationSkipped {
                    mutation: report.mutation.clone(),
                    reason: err.to_string(),
                });
                report.error = Some(err.to_string());
            }
            Err(err) => return Err(err),
        }
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    Ok(analyzed)
}

fn assign_predictions(
    reports: &mut [MutationReport],
    analyzed: &[(usize, MutationFeatures)],
    predictions: &[f64],
    coi: Coi,
) -> Result<(), PipelineError> {
    if analyzed.len() != predictions.len() {
        return Err(PipelineError::MisalignedResults {
            reason: format!(
                "{} {} predictions for {} mutations",
                predictions.len(),
                coi,
                analyzed.len()
            ),
        });
    }
    for ((idx, features), &ensemble) in analyzed.iter().zip(predictions) {
        let report = &mut reports[*idx];
        if report.mutation.parse::<Mutation>().ok() != Some(features.mutation) {
            return Err(PipelineError::MisalignedResults {
                reason: format!(
                    "{} prediction for '{}' assigned to '{}'",
                    coi, features.mutation, report.mutation
                ),
            });
        }
        let prediction = CoiPrediction {
            plugin_scores: plugin_scores(features, coi),
            ensemble,
        };
        match coi {
            Coi::Core => report.core = Some(prediction),
            Coi::Interface => report.interface = Some(prediction),
        }
    }
    Ok(())
}

/// `score_wt - score_mut` for every plugin that reported both scores.
fn plugin_scores(features: &MutationFeatures, coi: Coi) -> BTreeMap<String, f64> {
    let suffix = format!("_{}_score_wt", coi);
    features
        .features
        .keys()
        .filter_map(|key| key.strip_suffix(&suffix))
        .filter_map(|plugin| {
            let wt = features.features.get(&feature_key(plugin, coi, "score_wt"))?;
            let mt = features.features.get(&feature_key(plugin, coi, "score_mut"))?;
            Some((
                format!("{}_{}", plugin, coi),
                wt.as_scalar()? - mt.as_scalar()?,
            ))
        })
        .collect()
}

/// Writes one row per mutation: ensemble predictions, per-plugin scores and
/// the error message, if any.
pub fn write_reports_csv(path: &Path, reports: &[MutationReport]) -> Result<(), PipelineError> {
    let csv_error = |source| PipelineError::Csv {
        path: path_string(path),
        source,
    };
    let score_columns: BTreeSet<&str> = reports
        .iter()
        .flat_map(|r| r.core.iter().chain(r.interface.iter()))
        .flat_map(|p| p.plugin_scores.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    let mut header = vec!["mutation", "ddg_core", "ddg_interface"];
    header.extend(score_columns.iter().copied());
    header.push("error");
    writer.write_record(&header).map_err(csv_error)?;

    for report in reports {
        let ensemble = |p: &Option<CoiPrediction>| {
            p.as_ref().map(|p| p.ensemble.to_string()).unwrap_or_default()
        };
        let mut row = vec![
            report.mutation.clone(),
            ensemble(&report.core),
            ensemble(&report.interface),
        ];
        for column in &score_columns {
            let value = report
                .core
                .iter()
                .chain(report.interface.iter())
                .find_map(|p| p.plugin_scores.get(*column));
            row.push(value.map(f64::to_string).unwrap_or_default());
        }
        row.push(report.error.clone().unwrap_or_default());
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path_string(path),
        source,
    })?;
    Ok(())
}

/// Writes the reports as a pretty-printed JSON array.
pub fn write_reports_json(path: &Path, reports: &[MutationReport]) -> Result<(), PipelineError> {
    let io_error = |source| PipelineError::Io {
        path: path_string(path),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    serde_json::to_writer_pretty(BufWriter::new(file), reports)
        .map_err(|e| io_error(std::io::Error::other(e)))?;
    Ok(())
}
