//! Random forest classifier.
//!
//! Bootstrap-aggregated Gini decision trees from `linfa-trees`. Each tree is
//! fitted on a with-replacement resample of the training rows, restricted to
//! a random subset of `ceil(sqrt(n_features))` columns. Both draws come from a
//! seeded PRNG, so a given seed and training set always yield the same forest.

use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::{seq::index, Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PipelineError;

/// Forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Depth limit per tree; `None` grows trees until leaves are pure
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: None,
            seed: 42,
        }
    }
}

/// One tree and the feature columns it was fitted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubspaceTree {
    tree: DecisionTree<f64, usize>,
    columns: Vec<usize>,
}

/// A fitted forest of binary classification trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<SubspaceTree>,
    n_features: usize,
}

/// Columns drawn per tree: the square root of the feature count, rounded up.
pub fn features_per_tree(n_features: usize) -> usize {
    ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features.max(1))
}

impl RandomForest {
    pub fn fit(
        features: &Array2<f64>,
        targets: &Array1<usize>,
        params: &ForestParams,
    ) -> Result<Self, PipelineError> {
        if params.n_estimators == 0 {
            return Err(PipelineError::InvalidParams(
                "n_estimators must be at least 1".into(),
            ));
        }
        if features.nrows() != targets.len() {
            return Err(PipelineError::LengthMismatch {
                records: features.nrows(),
                labels: targets.len(),
            });
        }
        if features.nrows() == 0 {
            return Err(PipelineError::EmptyTrainingSet);
        }

        info!(
            "Fitting random forest: {} trees on {} samples x {} features",
            params.n_estimators,
            features.nrows(),
            features.ncols()
        );

        let n_rows = features.nrows();
        let n_columns = features_per_tree(features.ncols());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for index in 0..params.n_estimators {
            let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
            let mut columns = index::sample(&mut rng, features.ncols(), n_columns).into_vec();
            columns.sort_unstable();
            let dataset = Dataset::new(
                features.select(Axis(0), &sample).select(Axis(1), &columns),
                targets.select(Axis(0), &sample),
            );

            let tree = DecisionTree::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(params.max_depth)
                .fit(&dataset)
                .map_err(|e| PipelineError::Fit(format!("tree {}: {}", index, e)))?;
            trees.push(SubspaceTree { tree, columns });
        }
        debug!(
            "Fitted {} trees on {} of {} features each",
            trees.len(),
            n_columns,
            features.ncols()
        );

        Ok(Self {
            trees,
            n_features: features.ncols(),
        })
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Share of trees voting "survived" for each row.
    pub fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        if features.ncols() != self.n_features {
            return Err(PipelineError::WidthMismatch {
                expected: self.n_features,
                actual: features.ncols(),
            });
        }

        let mut votes = Array1::<f64>::zeros(features.nrows());
        for fitted in &self.trees {
            let predictions: Array1<usize> = fitted
                .tree
                .predict(&features.select(Axis(1), &fitted.columns));
            for (vote, &class) in votes.iter_mut().zip(predictions.iter()) {
                if class == 1 {
                    *vote += 1.0;
                }
            }
        }
        Ok(votes / self.trees.len() as f64)
    }

    /// Majority vote per row; ties predict 0.
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<usize>, PipelineError> {
        let proba = self.predict_proba(features)?;
        Ok(proba.mapv(|p| usize::from(p > 0.5)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<usize>) {
        let features = array![
            [0.0, 1.0],
            [0.1, 0.9],
            [0.2, 1.1],
            [0.3, 1.0],
            [1.0, 0.0],
            [0.9, 0.1],
            [1.1, 0.2],
            [1.0, 0.3],
        ];
        let targets = array![0, 0, 0, 0, 1, 1, 1, 1];
        (features, targets)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 15,
            max_depth: None,
            seed: 42,
        }
    }

    #[test]
    fn test_learns_a_separable_problem() {
        let (features, targets) = separable();
        let forest = RandomForest::fit(&features, &targets, &small_params()).unwrap();
        assert_eq!(forest.n_estimators(), 15);

        let predictions = forest.predict(&array![[0.05, 1.0], [1.05, 0.1]]).unwrap();
        assert_eq!(predictions, array![0, 1]);
    }

    #[test]
    fn test_same_seed_gives_identical_probabilities() {
        let (features, targets) = separable();
        let rows = array![[0.5, 0.5], [0.6, 0.4]];
        let a = RandomForest::fit(&features, &targets, &small_params()).unwrap();
        let b = RandomForest::fit(&features, &targets, &small_params()).unwrap();
        assert_eq!(
            a.predict_proba(&rows).unwrap(),
            b.predict_proba(&rows).unwrap()
        );
    }

    #[test]
    fn test_features_per_tree_is_rounded_up_square_root() {
        assert_eq!(features_per_tree(1), 1);
        assert_eq!(features_per_tree(2), 2);
        assert_eq!(features_per_tree(4), 2);
        assert_eq!(features_per_tree(14), 4);
    }

    #[test]
    fn test_trees_use_a_random_feature_subset() {
        let features = Array2::from_shape_fn((40, 9), |(row, col)| (row * (col + 1) % 7) as f64);
        let targets = Array1::from_shape_fn(40, |row| row % 2);
        let forest = RandomForest::fit(&features, &targets, &small_params()).unwrap();

        for fitted in &forest.trees {
            assert_eq!(fitted.columns.len(), 3);
            assert!(fitted.columns.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(fitted.columns.iter().all(|&col| col < 9));
        }
        let distinct: std::collections::HashSet<&Vec<usize>> =
            forest.trees.iter().map(|fitted| &fitted.columns).collect();
        assert!(distinct.len() > 1);
        assert_eq!(forest.predict(&features).unwrap().len(), 40);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (features, targets) = separable();
        let forest = RandomForest::fit(&features, &targets, &small_params()).unwrap();
        assert!(matches!(
            forest.predict(&array![[1.0, 2.0, 3.0]]),
            Err(PipelineError::WidthMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_rejects_zero_estimators_and_empty_input() {
        let (features, targets) = separable();
        let params = ForestParams {
            n_estimators: 0,
            ..small_params()
        };
        assert!(RandomForest::fit(&features, &targets, &params).is_err());

        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            RandomForest::fit(&empty, &Array1::zeros(0), &small_params()),
            Err(PipelineError::EmptyTrainingSet)
        ));
    }
}
