use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::tree::{BinEdges, Tree, TreeParams};
use super::{Classifier, check_columns, check_training_set};
use crate::dataset::FeatureMatrix;
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 300,
            max_depth: 24,
            min_samples_leaf: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    n_cols: usize,
    trees: Vec<Tree>,
}

/// Bootstrap-aggregated trees. Each leaf holds the positive rate of its
/// bootstrap rows and the forest averages the leaves.
#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    seed: u64,
    fitted: Option<Fitted>,
}

impl RandomForest {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            fitted: None,
        }
    }
}

fn features_per_node(n_cols: usize) -> usize {
    ((n_cols as f64).sqrt().round() as usize).clamp(1, n_cols.max(1))
}

const NAME: &str = "forest";

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<(), ModelError> {
        check_training_set(NAME, x, y)?;
        let n = x.n_rows();
        let n_cols = x.n_cols();

        let edges = BinEdges::fit(x);
        let binned = edges.bin(x);
        let grad = y
            .iter()
            .map(|v| if *v { -1.0 } else { 0.0 })
            .collect::<Vec<_>>();
        let hess = vec![1.0; n];
        let features = (0..n_cols).collect::<Vec<_>>();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
            min_child_weight: 0.0,
            lambda: 0.0,
            alpha: 0.0,
            min_split_gain: 0.0,
            features_per_node: Some(features_per_node(n_cols)),
        };

        let trees = (0..self.params.n_trees)
            .into_par_iter()
            .map(|idx| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(idx as u64));
                let rows = (0..n).map(|_| rng.gen_range(0..n)).collect::<Vec<_>>();
                Tree::fit(
                    &binned,
                    &edges,
                    &grad,
                    &hess,
                    rows,
                    &features,
                    tree_params,
                    &mut rng,
                )
            })
            .collect::<Vec<_>>();

        debug!(
            model = NAME,
            trees = trees.len(),
            max_depth = trees.iter().map(Tree::depth).max().unwrap_or(0),
            "forest fit complete"
        );
        self.fitted = Some(Fitted { n_cols, trees });
        Ok(())
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(ModelError::NotFitted { model: NAME })?;
        check_columns(NAME, fitted.n_cols, x)?;
        let n_trees = fitted.trees.len().max(1) as f64;
        Ok(x
            .rows()
            .map(|row| {
                let sum = fitted.trees.iter().map(|t| t.predict(row)).sum::<f64>();
                (sum / n_trees).clamp(0.0, 1.0)
            })
            .collect())
    }
}
