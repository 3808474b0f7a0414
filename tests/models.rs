use anytime_td::dataset::FeatureMatrix;
use anytime_td::error::ModelError;
use anytime_td::metrics::evaluate_binary;
use anytime_td::models::{
    BoostingParams, Classifier, ForestParams, GradientBoosting, LogisticParams,
    LogisticRegression, RandomForest,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Label is driven by the first two columns; the third is noise.
fn separable(n: usize, seed: u64) -> (FeatureMatrix, Vec<bool>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = FeatureMatrix::new(3);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let a = rng.gen_range(-2.0..2.0);
        let b = rng.gen_range(-2.0..2.0);
        let noise = rng.gen_range(-1.0..1.0);
        x.push_row(&[a * 10.0 + 50.0, b, noise]);
        y.push(a + 0.5 * b > 0.0);
    }
    (x, y)
}

fn light_classifiers(seed: u64) -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(GradientBoosting::new(
            "gbt_400",
            BoostingParams {
                n_trees: 60,
                ..BoostingParams::compact()
            },
            seed,
        )),
        Box::new(GradientBoosting::new(
            "gbt_600",
            BoostingParams {
                n_trees: 80,
                ..BoostingParams::extended()
            },
            seed + 1,
        )),
        Box::new(RandomForest::new(
            ForestParams {
                n_trees: 40,
                ..ForestParams::default()
            },
            seed + 2,
        )),
        Box::new(LogisticRegression::new(LogisticParams::default())),
    ]
}

#[test]
fn every_classifier_learns_an_easy_boundary() {
    let (train_x, train_y) = separable(600, 1);
    let (test_x, test_y) = separable(300, 2);

    for mut model in light_classifiers(9) {
        model.fit(&train_x, &train_y).unwrap();
        let probs = model.predict_proba(&test_x).unwrap();
        assert_eq!(probs.len(), test_y.len());
        assert!(
            probs.iter().all(|p| (0.0..=1.0).contains(p)),
            "{} produced an out-of-range probability",
            model.name()
        );

        let metrics = evaluate_binary(&probs, &test_y).unwrap();
        assert!(metrics.accuracy > 0.85, "{}: accuracy {}", model.name(), metrics.accuracy);
        assert!(
            metrics.roc_auc.unwrap() > 0.9,
            "{}: auc {:?}",
            model.name(),
            metrics.roc_auc
        );
    }
}

#[test]
fn fitted_models_are_deterministic_for_a_seed() {
    let (x, y) = separable(300, 3);
    let run = || {
        light_classifiers(5)
            .into_iter()
            .map(|mut m| {
                m.fit(&x, &y).unwrap();
                m.predict_proba(&x).unwrap()
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn logistic_scaler_is_frozen_after_fit() {
    let (train_x, train_y) = separable(400, 4);
    let mut model = LogisticRegression::new(LogisticParams::default());
    model.fit(&train_x, &train_y).unwrap();
    let before = model.scaler().unwrap().clone();

    // Shifted inputs must be scaled with the training statistics.
    let mut shifted = FeatureMatrix::new(3);
    for row in train_x.rows().take(50) {
        shifted.push_row(&[row[0] + 1000.0, row[1] * 3.0, row[2]]);
    }
    let first = model.predict_proba(&shifted).unwrap();
    let second = model.predict_proba(&shifted).unwrap();

    assert_eq!(model.scaler().unwrap(), &before);
    assert_eq!(first, second);
    // Far right of the boundary on the strongest feature.
    assert!(first.iter().all(|p| *p > 0.99));
}

#[test]
fn bad_inputs_are_reported_not_panicked() {
    let (x, y) = separable(50, 6);

    for mut model in light_classifiers(1) {
        let name = model.name();
        assert_eq!(
            model.predict_proba(&x),
            Err(ModelError::NotFitted { model: name })
        );
        assert_eq!(
            model.fit(&FeatureMatrix::new(3), &[]),
            Err(ModelError::EmptyTrainingSet { model: name })
        );
        assert_eq!(
            model.fit(&x, &y[..10]),
            Err(ModelError::LabelMismatch {
                model: name,
                rows: 50,
                labels: 10
            })
        );

        model.fit(&x, &y).unwrap();
        let narrow = FeatureMatrix::from_rows(2, &[vec![0.0, 1.0]]);
        assert_eq!(
            model.predict_proba(&narrow),
            Err(ModelError::ColumnMismatch {
                model: name,
                expected: 3,
                got: 2
            })
        );
    }
}

#[test]
fn single_class_training_sets_still_predict() {
    let (x, _) = separable(80, 7);
    let all_negative = vec![false; 80];
    for mut model in light_classifiers(2) {
        model.fit(&x, &all_negative).unwrap();
        let probs = model.predict_proba(&x).unwrap();
        assert!(
            probs.iter().all(|p| p.is_finite() && *p < 0.5),
            "{}: {:?}",
            model.name(),
            &probs[..3]
        );
    }
}
