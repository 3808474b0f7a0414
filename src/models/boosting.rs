use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use tracing::debug;

use super::tree::{BinEdges, Tree, TreeParams};
use super::{Classifier, check_columns, check_training_set, sigmoid};
use crate::dataset::FeatureMatrix;
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub n_trees: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub colsample: f64,
    pub lambda: f64,
    pub alpha: f64,
    pub min_child_weight: f64,
}

impl BoostingParams {
    pub fn compact() -> Self {
        Self {
            n_trees: 400,
            learning_rate: 0.05,
            max_depth: 4,
            subsample: 0.8,
            colsample: 0.9,
            lambda: 1.0,
            alpha: 0.0,
            min_child_weight: 1.0,
        }
    }

    pub fn extended() -> Self {
        Self {
            n_trees: 600,
            lambda: 2.0,
            alpha: 0.1,
            ..Self::compact()
        }
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_leaf: 1,
            min_child_weight: self.min_child_weight,
            lambda: self.lambda,
            alpha: self.alpha,
            min_split_gain: 0.0,
            features_per_node: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    n_cols: usize,
    base_score: f64,
    trees: Vec<Tree>,
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    name: &'static str,
    params: BoostingParams,
    seed: u64,
    fitted: Option<Fitted>,
}

impl GradientBoosting {
    pub fn new(name: &'static str, params: BoostingParams, seed: u64) -> Self {
        Self {
            name,
            params,
            seed,
            fitted: None,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.trees.len())
    }
}

fn fraction_of(n: usize, frac: f64) -> usize {
    ((n as f64 * frac.clamp(0.0, 1.0)).round() as usize).clamp(1, n.max(1))
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<(), ModelError> {
        check_training_set(self.name, x, y)?;
        let p = self.params;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let edges = BinEdges::fit(x);
        let binned = edges.bin(x);
        let n = x.n_rows();
        let n_cols = x.n_cols();

        let positive_rate = y.iter().filter(|v| **v).count() as f64 / n as f64;
        let clipped = positive_rate.clamp(1e-6, 1.0 - 1e-6);
        let base_score = (clipped / (1.0 - clipped)).ln();

        let mut raw = vec![base_score; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(p.n_trees);
        let tree_params = p.tree_params();

        for _ in 0..p.n_trees {
            for i in 0..n {
                let prob = sigmoid(raw[i]);
                grad[i] = prob - if y[i] { 1.0 } else { 0.0 };
                hess[i] = (prob * (1.0 - prob)).max(1e-16);
            }

            let rows = sample(&mut rng, n, fraction_of(n, p.subsample)).into_vec();
            let mut features = sample(&mut rng, n_cols, fraction_of(n_cols, p.colsample)).into_vec();
            features.sort_unstable();

            let tree = Tree::fit(
                &binned,
                &edges,
                &grad,
                &hess,
                rows,
                &features,
                tree_params,
                &mut rng,
            );
            for (i, r) in raw.iter_mut().enumerate() {
                *r += p.learning_rate * tree.predict_binned(&binned, i);
            }
            trees.push(tree);
        }

        debug!(
            model = self.name,
            trees = trees.len(),
            base_score,
            rows = n,
            "boosting fit complete"
        );
        self.fitted = Some(Fitted {
            n_cols,
            base_score,
            trees,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(ModelError::NotFitted { model: self.name })?;
        check_columns(self.name, fitted.n_cols, x)?;
        let lr = self.params.learning_rate;
        Ok(x
            .rows()
            .map(|row| {
                let z = fitted.base_score + lr * fitted.trees.iter().map(|t| t.predict(row)).sum::<f64>();
                sigmoid(z)
            })
            .collect())
    }
}
