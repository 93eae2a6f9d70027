//! Seeded random forest regression backed by `smartcore`.

use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::los::features::column_means;

/// Forest hyper-parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub seed: u64,
    /// Nodes with fewer samples become leaves.
    pub min_samples_split: usize,
    pub max_depth: Option<u16>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            min_samples_split: 2,
            max_depth: None,
        }
    }
}

impl ForestConfig {
    fn parameters(&self) -> RandomForestRegressorParameters {
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees.max(1))
            .with_min_samples_split(self.min_samples_split)
            .with_seed(self.seed);
        match self.max_depth {
            Some(depth) => params.with_max_depth(depth),
            None => params,
        }
    }
}

type Regressor = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Bagged ensemble of regression trees.
#[derive(Debug)]
pub struct RandomForest {
    model: Regressor,
    n_trees: usize,
}

impl RandomForest {
    /// Trains `config.n_trees` trees on bootstrap samples of `rows`.
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], config: &ForestConfig) -> Result<Self, String> {
        let x = DenseMatrix::from_2d_vec(&rows.to_vec());
        let y = targets.to_vec();
        let model = RandomForestRegressor::fit(&x, &y, config.parameters()).map_err(|e| e.to_string())?;
        Ok(Self {
            model,
            n_trees: config.n_trees.max(1),
        })
    }

    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Mean of the tree predictions for one feature vector.
    pub fn predict(&self, features: &[f64]) -> Result<f64, String> {
        let x = DenseMatrix::from_2d_vec(&vec![features.to_vec()]);
        let predictions = self.model.predict(&x).map_err(|e| e.to_string())?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| "forest returned no prediction".to_string())
    }

    /// Prediction for the column-wise mean of `rows`: a population-average
    /// profile, not the average of per-row predictions.
    pub fn predict_average(&self, rows: &[Vec<f64>]) -> Result<f64, String> {
        self.predict(&column_means(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 2) as f64]).collect();
        let targets: Vec<f64> = (0..40).map(|i| if i < 20 { 2.0 } else { 8.0 }).collect();
        (rows, targets)
    }

    #[test]
    fn test_forest_is_reproducible() {
        let (rows, targets) = step_data();
        let config = ForestConfig::default();
        let a = RandomForest::fit(&rows, &targets, &config).unwrap();
        let b = RandomForest::fit(&rows, &targets, &config).unwrap();
        assert_eq!(a.n_trees(), 100);
        assert_eq!(a.predict(&[12.5, 0.0]).unwrap(), b.predict(&[12.5, 0.0]).unwrap());
    }

    #[test]
    fn test_forest_learns_step() {
        let (rows, targets) = step_data();
        let forest = RandomForest::fit(&rows, &targets, &ForestConfig::default()).unwrap();
        let low = forest.predict(&[2.0, 0.0]).unwrap();
        let high = forest.predict(&[37.0, 1.0]).unwrap();
        assert!((2.0..=8.0).contains(&low));
        assert!((2.0..=8.0).contains(&high));
        assert!(low < 5.0);
        assert!(high > 5.0);
    }

    #[test]
    fn test_depth_limit_is_accepted() {
        let (rows, targets) = step_data();
        let config = ForestConfig {
            n_trees: 10,
            max_depth: Some(1),
            ..Default::default()
        };
        let forest = RandomForest::fit(&rows, &targets, &config).unwrap();
        assert_eq!(forest.n_trees(), 10);
        assert!((2.0..=8.0).contains(&forest.predict(&[20.0, 0.0]).unwrap()));
    }

    #[test]
    fn test_predict_average_uses_mean_profile() {
        let rows = vec![vec![1.0], vec![3.0]];
        let forest = RandomForest::fit(&rows, &[5.0, 5.0], &ForestConfig::default()).unwrap();
        assert_eq!(forest.predict_average(&rows).unwrap(), 5.0);
    }
}
