use super::artifacts::read_json;
use super::error::{ConfigurationError, path_string};
use serde::Deserialize;
use std::path::Path;

// Values closer to zero than this count as zero for `missing_type == "Zero"`.
const ZERO_THRESHOLD: f64 = 1e-35;

// Objectives whose raw scores need a link function we do not apply.
const UNSUPPORTED_OBJECTIVE_PREFIXES: &[&str] = &[
    "binary",
    "multiclass",
    "cross_entropy",
    "lambdarank",
    "rank_xendcg",
    "poisson",
    "gamma",
    "tweedie",
];

#[derive(Debug, Deserialize)]
struct BoosterArtifact {
    #[serde(default = "default_tree_per_iteration")]
    num_tree_per_iteration: usize,
    #[serde(default)]
    objective: Option<String>,
    #[serde(default)]
    average_output: bool,
    feature_names: Vec<String>,
    tree_info: Vec<TreeInfoArtifact>,
}

fn default_tree_per_iteration() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct TreeInfoArtifact {
    tree_structure: NodeArtifact,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThresholdArtifact {
    Numerical(f64),
    Categorical(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeArtifact {
    Split {
        split_feature: usize,
        threshold: ThresholdArtifact,
        decision_type: String,
        #[serde(default)]
        default_left: bool,
        #[serde(default)]
        missing_type: MissingType,
        left_child: Box<NodeArtifact>,
        right_child: Box<NodeArtifact>,
    },
    Leaf {
        leaf_value: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum MissingType {
    #[default]
    None,
    Zero,
    NaN,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        missing_type: MissingType,
        left: usize,
        right: usize,
    },
    Leaf(f64),
}

/// A single regression tree flattened into an arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_artifact(root: NodeArtifact, n_features: usize) -> Result<Self, String> {
        let mut nodes = Vec::new();
        Self::flatten(root, n_features, &mut nodes)?;
        Ok(Self { nodes })
    }

    fn flatten(node: NodeArtifact, n_features: usize, nodes: &mut Vec<Node>) -> Result<usize, String> {
        let slot = nodes.len();
        match node {
            NodeArtifact::Leaf { leaf_value } => {
                nodes.push(Node::Leaf(leaf_value));
            }
            NodeArtifact::Split {
                split_feature,
                threshold,
                decision_type,
                default_left,
                missing_type,
                left_child,
                right_child,
            } => {
                let threshold = match (decision_type.as_str(), threshold) {
                    ("<=", ThresholdArtifact::Numerical(t)) => t,
                    (other, ThresholdArtifact::Categorical(categories)) => {
                        return Err(format!(
                            "unsupported categorical split '{}' on categories '{}'",
                            other, categories
                        ));
                    }
                    (other, ThresholdArtifact::Numerical(_)) => {
                        return Err(format!(
                            "unsupported split decision '{}' (only numerical '<=' splits are supported)",
                            other
                        ));
                    }
                };
                if split_feature >= n_features {
                    return Err(format!(
                        "split on feature {} but the model declares {} features",
                        split_feature, n_features
                    ));
                }
                nodes.push(Node::Leaf(0.0));
                let left = Self::flatten(*left_child, n_features, nodes)?;
                let right = Self::flatten(*right_child, n_features, nodes)?;
                nodes[slot] = Node::Split {
                    feature: split_feature,
                    threshold,
                    default_left,
                    missing_type,
                    left,
                    right,
                };
            }
        }
        Ok(slot)
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    missing_type,
                    left,
                    right,
                } => {
                    let mut value = row[*feature];
                    if value.is_nan() && *missing_type != MissingType::NaN {
                        value = 0.0;
                    }
                    let is_missing = match missing_type {
                        MissingType::None => false,
                        MissingType::Zero => value.abs() <= ZERO_THRESHOLD,
                        MissingType::NaN => value.is_nan(),
                    };
                    let go_left = if is_missing {
                        *default_left
                    } else {
                        value <= *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// A gradient-boosted regression tree ensemble read from a LightGBM
/// `dump_model()` JSON file.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostedTreeModel {
    feature_names: Vec<String>,
    trees: Vec<Tree>,
    average_output: bool,
}

impl BoostedTreeModel {
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let artifact: BoosterArtifact =
            serde_json::from_str(json).map_err(|e| e.to_string())?;
        Self::from_artifact(artifact)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let artifact: BoosterArtifact = read_json(path)?;
        Self::from_artifact(artifact).map_err(|reason| ConfigurationError::InvalidArtifact {
            path: path_string(path),
            reason,
        })
    }

    fn from_artifact(artifact: BoosterArtifact) -> Result<Self, String> {
        if artifact.num_tree_per_iteration != 1 {
            return Err(format!(
                "expected a single-output regressor, found {} trees per iteration",
                artifact.num_tree_per_iteration
            ));
        }
        if let Some(objective) = &artifact.objective {
            if UNSUPPORTED_OBJECTIVE_PREFIXES
                .iter()
                .any(|prefix| objective.starts_with(prefix))
            {
                return Err(format!("unsupported objective '{}'", objective));
            }
        }
        let n_features = artifact.feature_names.len();
        let trees = artifact
            .tree_info
            .into_iter()
            .map(|info| Tree::from_artifact(info.tree_structure, n_features))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            feature_names: artifact.feature_names,
            trees,
            average_output: artifact.average_output,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Predicts one row laid out in `feature_names` order.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ConfigurationError> {
        if row.len() != self.feature_names.len() {
            return Err(ConfigurationError::ShapeMismatch(format!(
                "booster expects {} features, got {}",
                self.feature_names.len(),
                row.len()
            )));
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        if self.average_output && !self.trees.is_empty() {
            Ok(sum / self.trees.len() as f64)
        } else {
            Ok(sum)
        }
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ConfigurationError> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}
