//! Trained ensembles.
//!
//! A [`Model`] is everything needed to predict without the training-time
//! structures: the starting score of every output and the trees of every
//! round, class-major within a round.

use crate::boosting::objective::softmax;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::{ImportanceType, ObjectiveType};
use crate::tree::Tree;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Serializable boosted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub objective: ObjectiveType,
    /// Trees per round
    pub num_tree_per_iteration: usize,
    pub sigmoid: f64,
    /// Raw columns the trees were trained on
    pub num_features: usize,
    pub feature_names: Vec<String>,
    /// Starting score of every output
    pub init_scores: Vec<f64>,
    pub trees: Vec<Tree>,
    /// Best round found by early stopping, zero-based
    pub best_iteration: Option<usize>,
}

impl Model {
    pub fn num_iterations(&self) -> usize {
        self.trees.len() / self.num_tree_per_iteration.max(1)
    }

    fn check_width(&self, features: &ArrayView2<f32>) -> Result<()> {
        if features.ncols() != self.num_features {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} feature columns", self.num_features),
                format!("{} feature columns", features.ncols()),
            ));
        }
        Ok(())
    }

    /// Raw scores, one row per sample and one column per output, using at
    /// most the first `num_iterations` rounds.
    pub fn predict_raw_iterations(&self, features: ArrayView2<f32>, num_iterations: Option<usize>) -> Result<Array2<f64>> {
        self.check_width(&features)?;
        let outputs = self.num_tree_per_iteration.max(1);
        let rounds = num_iterations.map_or(self.num_iterations(), |n| n.min(self.num_iterations()));
        raw_scores(&self.init_scores, &self.trees[..rounds * outputs], outputs, features)
    }

    pub fn predict_raw(&self, features: ArrayView2<f32>) -> Result<Array2<f64>> {
        self.predict_raw_iterations(features, None)
    }

    /// Predictions in the output space of the objective: probabilities for
    /// classification, raw scores otherwise.
    pub fn predict(&self, features: ArrayView2<f32>) -> Result<Array2<f64>> {
        let mut raw = self.predict_raw(features)?;
        match self.objective {
            ObjectiveType::Binary => {
                raw.mapv_inplace(|s| 1.0 / (1.0 + (-self.sigmoid * s).exp()));
            }
            ObjectiveType::Multiclass => {
                for mut row in raw.rows_mut() {
                    let probs = softmax(&row.to_vec());
                    row.iter_mut().zip(probs).for_each(|(x, p)| *x = p);
                }
            }
            _ => {}
        }
        Ok(raw)
    }

    /// Split counts or total gains per raw feature.
    pub fn feature_importance(&self, importance_type: ImportanceType) -> Vec<f64> {
        let mut importance = vec![0.0; self.num_features];
        for tree in &self.trees {
            tree.accumulate_importance(importance_type, &mut importance);
        }
        importance
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: Model = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: Model = bincode::deserialize(bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// Write as JSON when the path ends in `.json`, bincode otherwise.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if is_json(path) {
            fs::write(path, self.to_json()?)?;
        } else {
            fs::write(path, self.to_bytes()?)?;
        }
        log::info!("Saved model with {} trees to {}", self.trees.len(), path.display());
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if is_json(path) {
            Self::from_json(&fs::read_to_string(path)?)
        } else {
            Self::from_bytes(&fs::read(path)?)
        }
    }

    fn validate(&self) -> Result<()> {
        let outputs = self.num_tree_per_iteration.max(1);
        if self.init_scores.len() != outputs {
            return Err(LightGBMError::serialization(format!(
                "{} init scores for {} outputs",
                self.init_scores.len(),
                outputs
            )));
        }
        if self.trees.len() % outputs != 0 {
            return Err(LightGBMError::serialization(format!(
                "{} trees do not fill rounds of {}",
                self.trees.len(),
                outputs
            )));
        }
        for tree in &self.trees {
            tree.validate()?;
        }
        Ok(())
    }
}

/// Sum of `init_scores` and `trees` (class-major within each round) for
/// every row of `features`.
pub(crate) fn raw_scores(
    init_scores: &[f64],
    trees: &[Tree],
    outputs: usize,
    features: ArrayView2<f32>,
) -> Result<Array2<f64>> {
    let rows: Vec<Vec<f64>> = (0..features.nrows())
        .into_par_iter()
        .map(|r| {
            let row = features.row(r);
            let mut out = init_scores.to_vec();
            out.resize(outputs, 0.0);
            for (i, tree) in trees.iter().enumerate() {
                out[i % outputs] += tree.predict(&row);
            }
            out
        })
        .collect();

    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((features.nrows(), outputs), flat)
        .map_err(|e| LightGBMError::internal(format!("prediction shape: {}", e)))
}

fn is_json(path: &Path) -> bool {
    path.extension().map_or(false, |e| e.eq_ignore_ascii_case("json"))
}
