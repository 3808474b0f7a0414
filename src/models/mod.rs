mod boosting;
mod forest;
mod logistic;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use logistic::{LogisticParams, LogisticRegression, StandardScaler};

use crate::dataset::FeatureMatrix;
use crate::error::ModelError;

pub trait Classifier: Send {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<(), ModelError>;

    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;
}

pub(crate) fn check_training_set(
    model: &'static str,
    x: &FeatureMatrix,
    y: &[bool],
) -> Result<(), ModelError> {
    if x.n_rows() == 0 {
        return Err(ModelError::EmptyTrainingSet { model });
    }
    if x.n_rows() != y.len() {
        return Err(ModelError::LabelMismatch {
            model,
            rows: x.n_rows(),
            labels: y.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_columns(
    model: &'static str,
    expected: usize,
    x: &FeatureMatrix,
) -> Result<(), ModelError> {
    if x.n_cols() != expected {
        return Err(ModelError::ColumnMismatch {
            model,
            expected,
            got: x.n_cols(),
        });
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

pub fn default_classifiers(seed: u64) -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(GradientBoosting::new("gbt_400", BoostingParams::compact(), seed)),
        Box::new(GradientBoosting::new("gbt_600", BoostingParams::extended(), seed.wrapping_add(1))),
        Box::new(RandomForest::new(ForestParams::default(), seed.wrapping_add(2))),
        Box::new(LogisticRegression::new(LogisticParams::default())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(-800.0).is_finite());
    }

    #[test]
    fn default_components_have_distinct_names() {
        let names = default_classifiers(1)
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["gbt_400", "gbt_600", "forest", "logistic"]);
    }
}
