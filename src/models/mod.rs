//! Regression models backing the forecasting engine

use crate::error::{ForecastError, Result};
use crate::features::{FeatureVector, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

pub mod quantile;
pub mod sequence;
pub mod spike;

/// Gradient-descent settings shared by every trainable model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgdConfig {
    /// Number of passes over the training set
    pub epochs: usize,
    pub learning_rate: f64,
    /// L2 weight penalty
    pub l2: f64,
    /// Seed for weight initialisation and sample shuffling
    pub seed: u64,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.01,
            l2: 1e-4,
            seed: 42,
        }
    }
}

impl SgdConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ForecastError::InvalidParameter(
                "epochs must be positive".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(ForecastError::InvalidParameter(
                "learning rate must be positive and finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-column standardiser fitted on the training matrix and persisted
/// inside every model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl FeatureScaler {
    /// Fit column means and standard deviations
    pub fn fit(matrix: &[FeatureVector]) -> Result<Self> {
        if matrix.is_empty() {
            return Err(ForecastError::DataError(
                "Cannot fit scaler on an empty matrix".to_string(),
            ));
        }
        let n = matrix.len() as f64;
        let mut means = vec![0.0; FEATURE_COUNT];
        let mut stds = vec![0.0; FEATURE_COUNT];
        for row in matrix {
            for (column, value) in row.iter().enumerate() {
                means[column] += value;
            }
        }
        for mean in means.iter_mut() {
            *mean /= n;
        }
        for row in matrix {
            for (column, value) in row.iter().enumerate() {
                let delta = value - means[column];
                stds[column] += delta * delta;
            }
        }
        for std in stds.iter_mut() {
            *std = (*std / n).sqrt();
            // Constant columns pass through unscaled
            if *std < 1e-12 {
                *std = 1.0;
            }
        }
        Ok(Self { means, stds })
    }

    /// Standardise one feature vector
    pub fn transform(&self, vector: &FeatureVector) -> FeatureVector {
        let mut scaled = [0.0; FEATURE_COUNT];
        for column in 0..FEATURE_COUNT {
            scaled[column] = (vector[column] - self.means[column]) / self.stds[column];
        }
        scaled
    }
}

pub(crate) fn dot(weights: &[f64], vector: &FeatureVector) -> f64 {
    weights
        .iter()
        .zip(vector.iter())
        .map(|(w, x)| w * x)
        .sum()
}

/// Small random weights so seeded training runs are reproducible
pub(crate) fn init_weights(rng: &mut StdRng, count: usize) -> Vec<f64> {
    let normal = Normal::new(0.0, 0.01).expect("valid normal parameters");
    (0..count).map(|_| normal.sample(rng)).collect()
}

/// Fisher-Yates shuffle of sample indices
pub(crate) fn shuffled_indices(rng: &mut StdRng, count: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..count).collect();
    for i in (1..count).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }
    indices
}
