//! Pinball-loss quantile regressors (q10/q50/q90)

use crate::error::{ForecastError, Result};
use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::models::{dot, init_weights, shuffled_indices, FeatureScaler, SgdConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Linear regressor trained to target one quantile of the admissions
/// distribution.
///
/// Each member of the bank is independent; the bank makes no promise that
/// q10 <= q50 <= q90 (crossing is corrected after blending).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileRegressor {
    tau: f64,
    scaler: FeatureScaler,
    weights: Vec<f64>,
    bias: f64,
}

impl QuantileRegressor {
    /// Train by seeded subgradient descent on pinball loss at `tau`
    pub fn train(
        tau: f64,
        matrix: &[FeatureVector],
        targets: &[f64],
        config: &SgdConfig,
    ) -> Result<Self> {
        if !(0.0..1.0).contains(&tau) || tau == 0.0 {
            return Err(ForecastError::InvalidParameter(
                "tau must be strictly between 0 and 1".to_string(),
            ));
        }
        if matrix.len() != targets.len() || matrix.is_empty() {
            return Err(ForecastError::DataError(
                "Feature matrix and targets must have the same non-zero length".to_string(),
            ));
        }
        config.validate()?;

        let scaler = FeatureScaler::fit(matrix)?;
        let scaled: Vec<FeatureVector> = matrix.iter().map(|row| scaler.transform(row)).collect();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut weights = init_weights(&mut rng, FEATURE_COUNT);
        // Starting from the target mean keeps early epochs stable
        let mut bias = targets.iter().sum::<f64>() / targets.len() as f64;

        for _ in 0..config.epochs {
            for &i in &shuffled_indices(&mut rng, scaled.len()) {
                let prediction = dot(&weights, &scaled[i]) + bias;
                // Pinball subgradient: -tau below the target, (1 - tau) above
                let grad = if targets[i] > prediction {
                    -tau
                } else {
                    1.0 - tau
                };
                for (w, x) in weights.iter_mut().zip(scaled[i].iter()) {
                    *w -= config.learning_rate * (grad * x + config.l2 * *w);
                }
                bias -= config.learning_rate * grad;
            }
        }

        Ok(Self {
            tau,
            scaler,
            weights,
            bias,
        })
    }

    /// Scalar estimate for one feature vector
    pub fn predict_one(&self, vector: &FeatureVector) -> f64 {
        dot(&self.weights, &self.scaler.transform(vector)) + self.bias
    }

    /// Estimates for a whole matrix, in row order
    pub fn predict(&self, matrix: &[FeatureVector]) -> Vec<f64> {
        matrix.iter().map(|row| self.predict_one(row)).collect()
    }

    /// The quantile this regressor targets
    pub fn tau(&self) -> f64 {
        self.tau
    }
}
