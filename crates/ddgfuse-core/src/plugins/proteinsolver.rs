use super::{
    AnalyzeError, BackendError, BuildError, Device, FeaturePlugin, HomologyModeler, ModelError,
    ModelHandle, ModelLoader, MutationAnalyzer, Mutator, PluginData, StructureBuilder,
    StructureInputs,
};
use crate::core::features::record::FeatureRecord;
use crate::core::models::chain::Chain;
use crate::core::models::domain::DomainTarget;
use crate::core::models::mutation::Mutation;
use crate::core::models::residue::Residue;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::residue_contacts;
use crate::core::utils::identifiers::{
    UNKNOWN_RESIDUE_MARKER, is_backbone_atom, is_standard_amino_acid, one_to_three,
};
use nalgebra::DMatrix;
use std::sync::Arc;
use tracing::{debug, trace};

pub const PROTEINSOLVER: &str = "proteinsolver";

/// Residue alphabet of the graph model, in token order.
pub const GRAPH_ALPHABET: &str = "GVALIFPSTCMWYNQDEKRH";
/// Number of residue classes predicted per node.
pub const NUM_CATEGORIES: usize = 20;
/// Node token marking a hidden residue.
pub const MASK_TOKEN: usize = NUM_CATEGORIES;

pub fn residue_token(code: char) -> Option<usize> {
    GRAPH_ALPHABET.find(code)
}

/// A structure-aware graph network backend.
pub trait GraphModel: Send {
    /// Per-node logits (`n × NUM_CATEGORIES`) for the node tokens of `graph`
    /// with `tokens` substituted.
    fn forward(&mut self, tokens: &[usize], graph: &ProteinGraph)
    -> Result<DMatrix<f64>, BackendError>;
}

/// Residue contact graph of the matched domains.
#[derive(Debug, Clone, PartialEq)]
pub struct ProteinGraph {
    pub sequence: String,
    /// One token per residue; unknown residues are masked.
    pub tokens: Vec<usize>,
    /// Directed edges; every contact appears in both directions.
    pub edge_index: Vec<[usize; 2]>,
    /// `[distance / cutoff, 1.0 if sequence neighbours else 0.0]` per edge.
    pub edge_attr: Vec<[f64; 2]>,
    pub structure: Structure,
    // Chain and residue-list position of every graph node.
    node_positions: Vec<(char, usize)>,
}

impl ProteinGraph {
    pub fn from_structure(
        structure: &Structure,
        keep_unknown: bool,
        cutoff: f64,
    ) -> Result<Self, BuildError> {
        let mut node_positions = Vec::new();
        let mut residues: Vec<&Residue> = Vec::new();
        let mut sequence = String::new();
        for chain in structure.chains() {
            for (local_idx, residue) in chain.residues().iter().enumerate() {
                let code = match residue.one_letter_code() {
                    Some(code) => code,
                    None if keep_unknown => UNKNOWN_RESIDUE_MARKER,
                    None => continue,
                };
                node_positions.push((chain.id, local_idx));
                residues.push(residue);
                sequence.push(code);
            }
        }
        if residues.is_empty() {
            return Err(BuildError::EmptyStructure);
        }

        let tokens = sequence
            .chars()
            .map(|c| residue_token(c).unwrap_or(MASK_TOKEN))
            .collect();

        let mut edge_index = Vec::new();
        let mut edge_attr = Vec::new();
        for contact in residue_contacts(&residues, cutoff) {
            let (i, j) = (contact.residue_idx_1, contact.residue_idx_2);
            if i == j {
                continue;
            }
            let same_chain = node_positions[i].0 == node_positions[j].0;
            let neighbours = if same_chain && j - i == 1 { 1.0 } else { 0.0 };
            let attr = [contact.distance / cutoff, neighbours];
            edge_index.push([i, j]);
            edge_attr.push(attr);
            edge_index.push([j, i]);
            edge_attr.push(attr);
        }

        Ok(Self {
            sequence,
            tokens,
            edge_index,
            edge_attr,
            structure: structure.clone(),
            node_positions,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.tokens.len()
    }

    fn residue_mut<'a>(&self, structure: &'a mut Structure, node: usize) -> Option<&'a mut Residue> {
        let (chain_id, local_idx) = *self.node_positions.get(node)?;
        structure
            .chain_mut(chain_id)?
            .residues_mut()
            .get_mut(local_idx)
    }
}

/// Replaces a residue by `code`, truncating its side chain to CB (glycine: no
/// side chain). Returns false for codes outside the standard alphabet.
fn substitute_residue(residue: &mut Residue, code: char) -> bool {
    let Some(name) = one_to_three(code) else {
        return false;
    };
    residue.name = name.to_string();
    let keep_cb = code != 'G';
    residue.retain_atoms(|atom| is_backbone_atom(&atom.name) || (keep_cb && atom.name == "CB"));
    true
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Structure plugin backed by a graph network over residue contacts.
///
/// The mutated node is masked and the network's softmax probabilities of the
/// wild-type and mutant residues are reported as `score_wt` and `score_mut`.
pub struct ProteinSolver<G> {
    loader: ModelLoader<G>,
}

impl<G: GraphModel + 'static> ProteinSolver<G> {
    pub fn new(loader: impl Fn(Device) -> Result<G, BackendError> + Send + Sync + 'static) -> Self {
        Self {
            loader: Box::new(loader),
        }
    }

    fn graph(data: &PluginData) -> Result<&ProteinGraph, AnalyzeError> {
        data.downcast_ref::<ProteinGraph>()
            .ok_or(AnalyzeError::MissingData {
                plugin: PROTEINSOLVER,
            })
    }
}

impl<G: GraphModel + 'static> FeaturePlugin for ProteinSolver<G> {
    fn name(&self) -> &'static str {
        PROTEINSOLVER
    }

    fn load_model(&self, device: Device) -> Result<ModelHandle, ModelError> {
        let model = (self.loader)(device).map_err(|source| ModelError::Load {
            plugin: PROTEINSOLVER,
            device: device.to_string(),
            source,
        })?;
        Ok(ModelHandle::new(PROTEINSOLVER, device, model))
    }

    fn as_structure_builder(&self) -> Option<&dyn StructureBuilder> {
        Some(self)
    }

    fn as_mutation_analyzer(&self) -> Option<&dyn MutationAnalyzer> {
        Some(self)
    }

    fn as_mutator(&self) -> Option<&dyn Mutator> {
        Some(self)
    }

    fn as_homology_modeler(&self) -> Option<&dyn HomologyModeler> {
        Some(self)
    }
}

impl<G: GraphModel + 'static> StructureBuilder for ProteinSolver<G> {
    fn build_from_structure(
        &self,
        _model: &ModelHandle,
        inputs: &StructureInputs<'_>,
    ) -> Result<PluginData, BuildError> {
        let graph = ProteinGraph::from_structure(
            inputs.structure,
            !inputs.sequence.remove_heteroatoms,
            inputs.contact_cutoff,
        )?;
        let expected = inputs.sequence.expected_sequence();
        if graph.sequence != expected {
            return Err(BuildError::SequenceMismatch {
                expected,
                found: graph.sequence,
            });
        }
        debug!(
            nodes = graph.num_nodes(),
            edges = graph.edge_index.len(),
            "Built residue contact graph."
        );
        Ok(Arc::new(graph))
    }
}

impl<G: GraphModel + 'static> MutationAnalyzer for ProteinSolver<G> {
    fn analyze_mutation(
        &self,
        model: &ModelHandle,
        mutation: &Mutation,
        data: &PluginData,
    ) -> Result<FeatureRecord, AnalyzeError> {
        let graph = Self::graph(data)?;
        let idx = mutation.index();
        let found = graph.sequence.chars().nth(idx).ok_or_else(|| {
            AnalyzeError::PositionOutOfRange {
                mutation: mutation.to_string(),
                length: graph.num_nodes(),
            }
        })?;
        if found != mutation.residue_wt {
            return Err(AnalyzeError::WildTypeMismatch {
                mutation: mutation.to_string(),
                declared: mutation.residue_wt,
                found,
            });
        }
        let wt_token = residue_token(mutation.residue_wt).ok_or(AnalyzeError::UnsupportedResidue {
            plugin: PROTEINSOLVER,
            residue: mutation.residue_wt,
        })?;
        let mut_token = residue_token(mutation.residue_mut).ok_or(
            AnalyzeError::UnsupportedResidue {
                plugin: PROTEINSOLVER,
                residue: mutation.residue_mut,
            },
        )?;

        let mut tokens = graph.tokens.clone();
        tokens[idx] = MASK_TOKEN;
        let logits = model
            .lock::<G>()?
            .forward(&tokens, graph)
            .map_err(|source| ModelError::Forward {
                plugin: PROTEINSOLVER,
                source,
            })?;
        if logits.nrows() != graph.num_nodes() || logits.ncols() != NUM_CATEGORIES {
            return Err(ModelError::MalformedOutput {
                plugin: PROTEINSOLVER,
                reason: format!(
                    "logits of shape {}x{} for a graph of {} nodes",
                    logits.nrows(),
                    logits.ncols(),
                    graph.num_nodes()
                ),
            }
            .into());
        }

        let row: Vec<f64> = logits.row(idx).iter().copied().collect();
        let probabilities = softmax(&row);
        let (score_wt, score_mut) = (probabilities[wt_token], probabilities[mut_token]);
        trace!(mutation = %mutation, score_wt, score_mut, "ProteinSolver scores.");

        let mut features = FeatureRecord::new();
        for (name, value) in [("score_wt", score_wt), ("score_mut", score_mut)] {
            features
                .insert(name, value)
                .map_err(|e| ModelError::MalformedOutput {
                    plugin: PROTEINSOLVER,
                    reason: e.to_string(),
                })?;
        }
        Ok(features)
    }
}

impl<G: GraphModel + 'static> Mutator for ProteinSolver<G> {
    fn mutate(&self, mutations: &[Mutation], data: &PluginData) -> Result<Structure, AnalyzeError> {
        let graph = Self::graph(data)?;
        let mut structure = graph.structure.clone();
        for mutation in mutations {
            let out_of_range = || AnalyzeError::PositionOutOfRange {
                mutation: mutation.to_string(),
                length: graph.num_nodes(),
            };
            let residue = graph
                .residue_mut(&mut structure, mutation.index())
                .ok_or_else(out_of_range)?;
            let found = residue.one_letter_code().unwrap_or(UNKNOWN_RESIDUE_MARKER);
            if found != mutation.residue_wt {
                return Err(AnalyzeError::WildTypeMismatch {
                    mutation: mutation.to_string(),
                    declared: mutation.residue_wt,
                    found,
                });
            }
            if !substitute_residue(residue, mutation.residue_mut) {
                return Err(AnalyzeError::UnsupportedResidue {
                    plugin: PROTEINSOLVER,
                    residue: mutation.residue_mut,
                });
            }
        }
        Ok(structure)
    }
}

impl<G: GraphModel + 'static> HomologyModeler for ProteinSolver<G> {
    fn create_model(
        &self,
        targets: &[DomainTarget],
        data: &PluginData,
    ) -> Result<Structure, BuildError> {
        let graph = data
            .downcast_ref::<ProteinGraph>()
            .ok_or(BuildError::InvalidSequence(
                "no ProteinSolver build data to use as a template".into(),
            ))?;

        let mut model = Structure::new(&graph.structure.id);
        for target in targets {
            let template = graph
                .structure
                .chain(target.chain_id)
                .ok_or(BuildError::MissingTemplate {
                    chain_id: target.chain_id,
                })?;
            let target_codes: Vec<char> = target.target_sequence.chars().collect();
            if target_codes.len() != template.len() {
                return Err(BuildError::SequenceMismatch {
                    expected: target.target_sequence.clone(),
                    found: template.sequence(Some(UNKNOWN_RESIDUE_MARKER)),
                });
            }
            if let Some(bad) = target_codes.iter().find(|c| !is_standard_amino_acid(**c)) {
                return Err(BuildError::InvalidSequence(format!(
                    "target residue '{}' on chain {} has no template coordinates",
                    bad, target.chain_id
                )));
            }

            let mut chain = Chain::new(template.id);
            for (residue, &code) in template.residues().iter().zip(&target_codes) {
                let mut residue = residue.clone();
                if residue.one_letter_code() != Some(code) {
                    substitute_residue(&mut residue, code);
                }
                chain.push_residue(residue);
            }
            model.push_chain(chain);
        }
        Ok(model)
    }
}


#[cfg(test)]
pub(crate) mod fixtures {
    use crate::core::models::atom::Atom;
    use crate::core::models::builder::StructureAssembler;
    use crate::core::models::structure::Structure;
    use crate::core::utils::identifiers::one_to_three;
    use nalgebra::Point3;

    /// Builds a structure with one chain per `(chain_id, sequence)`, residues
    /// laid out 3.8 Å apart along x, each with N, CA, C, O and (non-glycine) CB
    /// and CG atoms. A trailing water is appended to every chain.
    pub(crate) fn linear_structure(chains: &[(char, &str)]) -> Structure {
        let mut assembler = StructureAssembler::new("test");
        let mut serial = 1;
        let mut x = 0.0;
        for (chain_id, sequence) in chains {
            assembler.start_chain(*chain_id);
            for (i, code) in sequence.chars().enumerate() {
                let name = one_to_three(code).unwrap_or("UNK");
                assembler
                    .start_residue(i as isize + 1, None, name, false)
                    .unwrap();
                let mut atoms = vec!["N", "CA", "C", "O"];
                if code != 'G' {
                    atoms.extend(["CB", "CG"]);
                }
                for (k, atom) in atoms.into_iter().enumerate() {
                    assembler
                        .add_atom(Atom::new(serial, atom, Point3::new(x, k as f64 * 0.1, 0.0)))
                        .unwrap();
                    serial += 1;
                }
                x += 3.8;
            }
            assembler
                .start_residue(900, None, "HOH", true)
                .unwrap()
                .add_atom(Atom::new(serial, "O", Point3::new(x, 5.0, 0.0)))
                .unwrap();
            serial += 1;
            x += 100.0;
        }
        assembler.build()
    }
}
