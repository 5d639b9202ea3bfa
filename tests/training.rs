//! End-to-end boosting scenarios.

use approx::assert_abs_diff_eq;
use lightgbm_core::*;
use ndarray::{arr1, Array2};

mod common;
use common::*;

#[test]
fn test_four_rows_split_on_separating_feature() -> anyhow::Result<()> {
    init_logging();
    let features = Array2::from_shape_vec((4, 2), vec![1.0f32, 5.0, 2.0, 6.0, 3.0, 5.0, 4.0, 6.0])?;
    let labels = vec![0.0, 0.0, 1.0, 1.0];
    let mut config = small_config(2, 1);
    config.min_data_in_leaf = 1;

    let train = BinnedDataset::from_array(features.view(), Metadata::new(labels), &config)?;
    let mut booster = GBDT::new(config, train)?;
    booster.train()?;

    let tree = &booster.trees()[0];
    assert_eq!(tree.num_leaves(), 2);
    let split = tree.root().split().expect("root must split");
    assert_eq!(split.feature, 0);
    assert!(split.gain > 0.0);
    assert_eq!(tree.leaf_count(0), 2);
    assert_eq!(tree.leaf_count(1), 2);

    let raw = booster.predict_raw(features.view())?;
    assert!(raw[[0, 0]] < raw[[2, 0]]);
    assert_abs_diff_eq!(raw[[0, 0]], raw[[1, 0]], epsilon = 1e-12);
    assert_abs_diff_eq!(raw[[2, 0]], raw[[3, 0]], epsilon = 1e-12);
    Ok(())
}

#[test]
fn test_single_row_gives_one_leaf() -> anyhow::Result<()> {
    init_logging();
    let features = Array2::from_shape_vec((1, 3), vec![0.5f32, -1.0, 2.0])?;
    let config = small_config(31, 5);
    let train = BinnedDataset::from_array(features.view(), Metadata::new(vec![3.0]), &config)?;
    let mut booster = GBDT::new(config, train)?;
    booster.train()?;

    assert_eq!(booster.trees().len(), 1);
    let tree = &booster.trees()[0];
    assert_eq!(tree.num_leaves(), 1);
    assert!(tree.is_trivial());
    tree.validate()?;
    assert_abs_diff_eq!(booster.predict_raw(features.view())?[[0, 0]], 3.0, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_all_missing_feature_is_never_split() -> anyhow::Result<()> {
    init_logging();
    let (mut features, labels) = regression_data(300, 3, 11);
    features.column_mut(1).fill(f32::NAN);
    let config = small_config(8, 10);
    let train = BinnedDataset::from_array(features.view(), Metadata::new(labels), &config)?;
    assert_eq!(train.num_features(), 2);

    let mut booster = GBDT::new(config, train)?;
    booster.train()?;
    for tree in booster.trees() {
        for node in tree.nodes() {
            if let Some(split) = node.split() {
                assert_ne!(split.feature, 1);
            }
        }
    }
    assert_eq!(booster.feature_importance(ImportanceType::Split)[1], 0.0);
    Ok(())
}

#[test]
fn test_goss_with_only_top_rows_matches_no_sampling() -> anyhow::Result<()> {
    init_logging();
    let (features, labels) = regression_data(400, 4, 5);
    let mut vanilla_config = small_config(8, 6);
    vanilla_config.learning_rate = 0.5;
    let mut goss_config = vanilla_config.clone();
    goss_config.data_sample_strategy = DataSampleStrategy::GOSS;
    goss_config.top_rate = 1.0;
    goss_config.other_rate = 0.0;

    let mut vanilla = GBDT::new(
        vanilla_config.clone(),
        BinnedDataset::from_array(features.view(), Metadata::new(labels.clone()), &vanilla_config)?,
    )?;
    vanilla.train()?;
    let mut goss = GBDT::new(
        goss_config.clone(),
        BinnedDataset::from_array(features.view(), Metadata::new(labels), &goss_config)?,
    )?;
    goss.train()?;

    assert_eq!(goss.trees(), vanilla.trees());
    Ok(())
}

#[test]
fn test_single_thread_training_is_reproducible() -> anyhow::Result<()> {
    init_logging();
    let (features, labels) = regression_data(500, 5, 3);
    let mut config = small_config(16, 8);
    config.bagging_fraction = 0.7;
    config.bagging_freq = 1;
    config.feature_fraction = 0.6;
    config.seed = Some(42);

    let run = || -> anyhow::Result<String> {
        let train = BinnedDataset::from_array(features.view(), Metadata::new(labels.clone()), &config)?;
        let mut booster = GBDT::new(config.clone(), train)?;
        booster.train()?;
        Ok(booster.model().to_json()?)
    };
    assert_eq!(run()?, run()?);
    Ok(())
}

#[test]
fn test_increasing_constraint_holds_in_every_tree() -> anyhow::Result<()> {
    init_logging();
    let (features, labels) = regression_data(400, 2, 21);
    // fight the constraint: the target falls with feature 0
    let labels: Vec<f32> = labels
        .iter()
        .zip(features.column(0))
        .map(|(&y, &x)| y - 4.0 * x)
        .collect();
    let mut config = small_config(8, 10);
    config.monotone_constraints = Some(vec![1, 0]);

    let train = BinnedDataset::from_array(features.view(), Metadata::new(labels), &config)?;
    let mut booster = GBDT::new(config, train)?;
    booster.train()?;

    for tree in booster.trees() {
        for &other in &[-4.0f32, 0.0, 4.0] {
            let outputs: Vec<f64> = (-12..=12)
                .map(|step| tree.predict(&arr1(&[step as f32 * 0.5, other]).view()))
                .collect();
            assert!(
                outputs.windows(2).all(|w| w[1] >= w[0] - 1e-12),
                "outputs decrease along feature 0: {:?}",
                outputs
            );
        }
    }
    Ok(())
}

#[test]
fn test_binary_classification_learns_boundary() -> anyhow::Result<()> {
    init_logging();
    let (features, labels) = binary_data(400, 4, 8);
    let mut config = small_config(8, 30);
    config.objective = ObjectiveType::Binary;
    config.metric = vec![MetricType::BinaryLogloss, MetricType::AUC];
    config.is_training_metric = true;

    let train = BinnedDataset::from_array(features.view(), Metadata::new(labels.clone()), &config)?;
    let mut booster = GBDT::new(config, train)?;
    booster.train()?;

    let probabilities = booster.model().predict(features.view())?;
    let correct = probabilities
        .column(0)
        .iter()
        .zip(&labels)
        .filter(|(&p, &y)| (p > 0.5) == (y > 0.5))
        .count();
    assert!(probabilities.iter().all(|&p| p > 0.0 && p < 1.0));
    assert!(correct as f64 / labels.len() as f64 > 0.85);

    let results = booster.eval_train()?;
    assert_eq!(results[0].metric, "binary_logloss");
    assert!(results[0].value < std::f64::consts::LN_2);
    assert_eq!(results[1].metric, "auc");
    assert!(results[1].value > 0.9);
    Ok(())
}

#[test]
fn test_multiclass_grows_one_tree_per_class() -> anyhow::Result<()> {
    init_logging();
    let (features, labels) = multiclass_data(300, 3, 4);
    let mut config = small_config(4, 10);
    config.objective = ObjectiveType::Multiclass;
    config.num_class = 3;

    let train = BinnedDataset::from_array(features.view(), Metadata::new(labels.clone()), &config)?;
    let mut booster = GBDT::new(config, train)?;
    booster.train()?;
    assert_eq!(booster.trees().len(), 30);
    assert_eq!(booster.num_tree_per_iteration(), 3);

    let probabilities = booster.model().predict(features.view())?;
    assert_eq!(probabilities.ncols(), 3);
    let mut correct = 0;
    for (row, &label) in probabilities.rows().into_iter().zip(&labels) {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        let best = (0..3).fold(0, |best, k| if row[k] > row[best] { k } else { best });
        if best as f32 == label {
            correct += 1;
        }
    }
    assert!(correct as f64 / labels.len() as f64 > 0.9);
    Ok(())
}

#[test]
fn test_lambdarank_orders_documents() -> anyhow::Result<()> {
    init_logging();
    let (features, _) = multiclass_data(200, 4, 17);
    let relevance: Vec<f32> = features.column(0).iter().map(|&x| x.floor()).collect();
    let mut config = small_config(8, 20);
    config.objective = ObjectiveType::LambdaRank;
    config.is_training_metric = true;

    let metadata = Metadata::new(relevance).with_query_sizes(&[10; 20])?;
    let train = BinnedDataset::from_array(features.view(), metadata, &config)?;
    let mut booster = GBDT::new(config, train)?;
    booster.train()?;

    let results = booster.eval_train()?;
    assert_eq!(results[0].metric, "ndcg@5");
    assert!(results[0].higher_is_better);
    assert!(results[0].value > 0.85);
    Ok(())
}

#[test]
fn test_ranking_requires_queries() -> anyhow::Result<()> {
    let (features, labels) = regression_data(20, 2, 1);
    let mut config = small_config(4, 2);
    config.objective = ObjectiveType::LambdaRank;
    let labels: Vec<f32> = labels.iter().map(|y| y.abs().min(3.0).floor()).collect();
    let train = BinnedDataset::from_array(features.view(), Metadata::new(labels), &config)?;
    assert!(GBDT::new(config, train).is_err());
    Ok(())
}

#[test]
fn test_early_stopping_rolls_back_to_best_round() -> anyhow::Result<()> {
    init_logging();
    let (features, labels) = regression_data(300, 3, 2);
    let (valid_features, _) = regression_data(100, 3, 99);
    let valid_labels: Vec<f32> = (0..100).map(|i| ((i * 37) % 11) as f32 - 5.0).collect();
    let mut config = small_config(16, 200);
    config.early_stopping_round = Some(3);

    let train = BinnedDataset::from_array(features.view(), Metadata::new(labels), &config)?;
    let valid = BinnedDataset::with_reference(valid_features.view(), Metadata::new(valid_labels), &train)?;
    let mut booster = GBDT::new(config, train)?;
    booster.add_validation(valid)?;
    booster.train()?;

    let best = booster.best_iteration().expect("early stopping must record a best round");
    assert!(booster.current_iteration() < 200);
    assert_eq!(booster.current_iteration(), best + 1);
    assert_eq!(booster.trees().len(), best + 1);
    assert_eq!(booster.model().best_iteration, Some(best));

    let predicted = booster.predict_raw(valid_features.view())?;
    let scores = booster.valid_scores(0).expect("validation set 0");
    for (row, &score) in scores.iter().enumerate() {
        assert_abs_diff_eq!(predicted[[row, 0]], score, epsilon = 1e-9);
    }
    Ok(())
}

#[test]
fn test_dart_validation_scores_track_rescaled_trees() -> anyhow::Result<()> {
    init_logging();
    let (features, labels) = regression_data(300, 3, 6);
    let (valid_features, valid_labels) = regression_data(80, 3, 60);
    let mut config = small_config(8, 15);
    config.boosting = BoostingType::DART;
    config.drop_rate = 0.3;
    config.skip_drop = 0.0;
    config.xgboost_dart_mode = true;

    let train = BinnedDataset::from_array(features.view(), Metadata::new(labels.clone()), &config)?;
    let valid = BinnedDataset::with_reference(valid_features.view(), Metadata::new(valid_labels), &train)?;
    let mut booster = GBDT::new(config, train)?;
    booster.add_validation(valid)?;
    booster.train()?;
    assert_eq!(booster.current_iteration(), 15);

    let predicted = booster.predict_raw(valid_features.view())?;
    for (row, &score) in booster.valid_scores(0).unwrap().iter().enumerate() {
        assert_abs_diff_eq!(predicted[[row, 0]], score, epsilon = 1e-6);
    }
    let initial = mse(&vec![booster.init_scores()[0]; labels.len()], &labels);
    assert!(mse(booster.train_scores(), &labels) < initial);
    Ok(())
}

#[test]
fn test_weighted_rows_pull_the_initial_score() -> anyhow::Result<()> {
    let features = Array2::from_shape_vec((4, 1), vec![1.0f32, 2.0, 3.0, 4.0])?;
    let metadata = Metadata::new(vec![0.0, 0.0, 0.0, 10.0]).with_weights(vec![1.0, 1.0, 1.0, 7.0])?;
    let config = small_config(2, 1);
    let train = BinnedDataset::from_array(features.view(), metadata, &config)?;
    let booster = GBDT::new(config, train)?;
    assert_abs_diff_eq!(booster.init_scores()[0], 7.0, epsilon = 1e-9);
    Ok(())
}
