//! Fitted CART trees in the flat array layout used by scikit-learn's
//! `tree_` attribute, and the forests built from them.

use ndarray::{Array1, ArrayView1};
use serde::Deserialize;

use super::error::ModelError;

const LEAF: i64 = -1;

/// Serialized tree. Node `i` is a leaf when `children_left[i] == -1`;
/// otherwise samples with `x[feature[i]] <= threshold[i]` go left.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeSpec {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node output: one value for regressors, class weights for
    /// classifiers.
    pub value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(Array1<f64>),
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Validates the arrays and compiles them into nodes.
    ///
    /// Children must point strictly forward, which rules out cycles and
    /// guarantees every walk terminates.
    pub fn compile(spec: TreeSpec, n_features: usize, n_outputs: usize) -> Result<Self, ModelError> {
        let n_nodes = spec.children_left.len();
        if n_nodes == 0 {
            return Err(invalid("tree has no nodes"));
        }
        if [
            spec.children_right.len(),
            spec.feature.len(),
            spec.threshold.len(),
            spec.value.len(),
        ]
        .iter()
        .any(|len| *len != n_nodes)
        {
            return Err(invalid("tree arrays have different lengths"));
        }

        let mut nodes = Vec::with_capacity(n_nodes);
        for idx in 0..n_nodes {
            let left = spec.children_left[idx];
            let right = spec.children_right[idx];

            if left == LEAF {
                if right != LEAF {
                    return Err(invalid(format!("node {} has only one child", idx)));
                }
                let value = &spec.value[idx];
                if value.len() != n_outputs {
                    return Err(invalid(format!(
                        "leaf {} has {} outputs, expected {}",
                        idx,
                        value.len(),
                        n_outputs
                    )));
                }
                if value.iter().any(|v| !v.is_finite()) {
                    return Err(invalid(format!("leaf {} holds a non-finite value", idx)));
                }
                nodes.push(Node::Leaf(Array1::from_vec(value.clone())));
                continue;
            }

            let left = forward_child(idx, left, n_nodes)?;
            let right = forward_child(idx, right, n_nodes)?;
            let feature = usize::try_from(spec.feature[idx])
                .ok()
                .filter(|f| *f < n_features)
                .ok_or_else(|| {
                    invalid(format!(
                        "node {} splits on feature {} but the model has {} features",
                        idx, spec.feature[idx], n_features
                    ))
                })?;
            let threshold = spec.threshold[idx];
            if threshold.is_nan() {
                return Err(invalid(format!("node {} has a NaN threshold", idx)));
            }

            nodes.push(Node::Split {
                feature,
                threshold,
                left,
                right,
            });
        }

        Ok(Self { nodes })
    }

    pub fn leaf_value(&self, x: ArrayView1<'_, f64>) -> &Array1<f64> {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn forward_child(parent: usize, child: i64, n_nodes: usize) -> Result<usize, ModelError> {
    usize::try_from(child)
        .ok()
        .filter(|c| *c > parent && *c < n_nodes)
        .ok_or_else(|| invalid(format!("node {} has invalid child index {}", parent, child)))
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::InvalidArtifact(msg.into())
}

/// Averaging ensemble of regression trees.
#[derive(Debug, Clone)]
pub struct ForestRegressor {
    trees: Vec<DecisionTree>,
}

impl ForestRegressor {
    pub fn compile(specs: Vec<TreeSpec>, n_features: usize) -> Result<Self, ModelError> {
        if specs.is_empty() {
            return Err(invalid("forest has no trees"));
        }
        let trees = specs
            .into_iter()
            .map(|spec| DecisionTree::compile(spec, n_features, 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { trees })
    }

    pub fn predict(&self, x: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.leaf_value(x)[0]).sum();
        total / self.trees.len() as f64
    }
}

/// Averaging ensemble of classification trees. Each tree's leaf weights are
/// normalized to a distribution before averaging.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl ForestClassifier {
    pub fn compile(
        specs: Vec<TreeSpec>,
        n_features: usize,
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        if specs.is_empty() {
            return Err(invalid("forest has no trees"));
        }
        if n_classes < 2 {
            return Err(invalid("classifier needs at least two classes"));
        }
        let trees = specs
            .into_iter()
            .map(|spec| DecisionTree::compile(spec, n_features, n_classes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { trees, n_classes })
    }

    pub fn predict_proba(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut acc = Array1::<f64>::zeros(self.n_classes);
        for tree in &self.trees {
            let leaf = tree.leaf_value(x);
            let total = leaf.sum();
            if total > 0.0 {
                acc += &(leaf / total);
            }
        }
        acc / self.trees.len() as f64
    }
}
