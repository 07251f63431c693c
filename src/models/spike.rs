//! Two-stage residual correctors for under-predicted admission spikes
//!
//! Training-time selection is percentile-gated; inference-time application
//! is unconditional, with contributions clamped non-negative by the
//! blender.

use crate::error::{ForecastError, Result};
use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::models::{dot, init_weights, shuffled_indices, FeatureScaler, SgdConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use tracing::{info, warn};

/// Which stage of the cascade a corrector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpikeStage {
    /// Trained on the spike regime (targets above the gate percentile)
    Primary,
    /// Trained on the top slice of positive residuals left after the
    /// primary stage
    Extreme,
}

/// Residual regressor predicting `actual - base_q50` in its regime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeCorrector {
    stage: SpikeStage,
    scaler: FeatureScaler,
    weights: Vec<f64>,
    bias: f64,
}

impl SpikeCorrector {
    /// Fit a squared-loss regressor on (features, residuals)
    fn fit(
        stage: SpikeStage,
        matrix: &[FeatureVector],
        residuals: &[f64],
        config: &SgdConfig,
    ) -> Result<Self> {
        if matrix.len() != residuals.len() || matrix.is_empty() {
            return Err(ForecastError::DataError(
                "Feature matrix and residuals must have the same non-zero length".to_string(),
            ));
        }
        config.validate()?;

        let scaler = FeatureScaler::fit(matrix)?;
        let scaled: Vec<FeatureVector> = matrix.iter().map(|row| scaler.transform(row)).collect();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut weights = init_weights(&mut rng, FEATURE_COUNT);
        let mut bias = residuals.iter().sum::<f64>() / residuals.len() as f64;

        for _ in 0..config.epochs {
            for &i in &shuffled_indices(&mut rng, scaled.len()) {
                let prediction = dot(&weights, &scaled[i]) + bias;
                let grad = prediction - residuals[i];
                for (w, x) in weights.iter_mut().zip(scaled[i].iter()) {
                    *w -= config.learning_rate * (grad * x + config.l2 * *w);
                }
                bias -= config.learning_rate * grad;
            }
        }

        Ok(Self {
            stage,
            scaler,
            weights,
            bias,
        })
    }

    /// Train the primary corrector on samples whose target exceeds the gate
    /// percentile of the training targets. Returns `None` when fewer than
    /// `min_samples` fall in the gate.
    pub fn train_primary(
        matrix: &[FeatureVector],
        targets: &[f64],
        residuals: &[f64],
        gate_percentile: usize,
        min_samples: usize,
        config: &SgdConfig,
    ) -> Result<Option<Self>> {
        if matrix.len() != targets.len() || matrix.len() != residuals.len() {
            return Err(ForecastError::DataError(
                "Matrix, targets and residuals must have the same length".to_string(),
            ));
        }
        if matrix.is_empty() {
            return Ok(None);
        }

        let mut data = Data::new(targets.to_vec());
        let gate = data.percentile(gate_percentile);
        let gated: Vec<usize> = (0..targets.len()).filter(|&i| targets[i] > gate).collect();

        if gated.len() < min_samples {
            warn!(
                samples = gated.len(),
                "not enough spike samples to train the primary corrector"
            );
            return Ok(None);
        }
        info!(
            samples = gated.len(),
            total = targets.len(),
            gate,
            "training primary spike corrector"
        );

        let sub_matrix: Vec<FeatureVector> = gated.iter().map(|&i| matrix[i]).collect();
        let sub_residuals: Vec<f64> = gated.iter().map(|&i| residuals[i]).collect();
        Self::fit(SpikeStage::Primary, &sub_matrix, &sub_residuals, config).map(Some)
    }

    /// Train the extreme corrector on the most positive residuals remaining
    /// after the primary stage. Returns `None` when fewer than `min_samples`
    /// qualify.
    pub fn train_extreme(
        matrix: &[FeatureVector],
        residuals_after_primary: &[f64],
        top_percentile: usize,
        min_samples: usize,
        config: &SgdConfig,
    ) -> Result<Option<Self>> {
        if matrix.len() != residuals_after_primary.len() {
            return Err(ForecastError::DataError(
                "Matrix and residuals must have the same length".to_string(),
            ));
        }
        let positive: Vec<f64> = residuals_after_primary
            .iter()
            .copied()
            .filter(|&r| r > 0.0)
            .collect();
        if positive.is_empty() {
            return Ok(None);
        }

        let mut data = Data::new(positive);
        let threshold = data.percentile(top_percentile);
        let gated: Vec<usize> = (0..residuals_after_primary.len())
            .filter(|&i| residuals_after_primary[i] > threshold)
            .collect();

        if gated.len() < min_samples {
            warn!(
                samples = gated.len(),
                "not enough extreme residuals to train the second-stage corrector"
            );
            return Ok(None);
        }
        info!(
            samples = gated.len(),
            threshold, "training extreme spike corrector"
        );

        let sub_matrix: Vec<FeatureVector> = gated.iter().map(|&i| matrix[i]).collect();
        let sub_residuals: Vec<f64> = gated
            .iter()
            .map(|&i| residuals_after_primary[i])
            .collect();
        Self::fit(SpikeStage::Extreme, &sub_matrix, &sub_residuals, config).map(Some)
    }

    /// Raw residual estimate for one row; applied unconditionally and
    /// clamped non-negative by the caller
    pub fn predict_one(&self, vector: &FeatureVector) -> f64 {
        dot(&self.weights, &self.scaler.transform(vector)) + self.bias
    }

    pub fn stage(&self) -> SpikeStage {
        self.stage
    }
}
