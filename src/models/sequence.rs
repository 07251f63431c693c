//! Optional temporal model over a rolling window of feature vectors

use crate::error::{ForecastError, Result};
use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::models::{dot, init_weights, shuffled_indices, FeatureScaler, SgdConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Capability seam for the optional sequence path.
///
/// The blender never feature-detects by catching errors; it asks
/// `available()` and degrades up front when the answer is no.
pub trait SequencePath: std::fmt::Debug + Send + Sync {
    fn available(&self) -> bool;
    /// Alternative median estimate from a rolling window of feature vectors
    fn predict_window(&self, window: &[FeatureVector]) -> Result<f64>;
}

/// Trivial "unavailable" implementation used when no sequence artifact is
/// loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSequence;

impl SequencePath for NullSequence {
    fn available(&self) -> bool {
        false
    }

    fn predict_window(&self, _window: &[FeatureVector]) -> Result<f64> {
        Err(ForecastError::ModelUnavailable("sequence".to_string()))
    }
}

/// Gated window model: the window mean is passed through a tanh encoder
/// modulated by a sigmoid gate, then projected to a scalar median estimate.
/// Trained independently of the quantile bank with q50 pinball loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceModel {
    window: usize,
    hidden: usize,
    scaler: FeatureScaler,
    w_enc: Vec<Vec<f64>>,
    b_enc: Vec<f64>,
    w_gate: Vec<Vec<f64>>,
    b_gate: Vec<f64>,
    w_out: Vec<f64>,
    b_out: f64,
}

impl SequenceModel {
    /// Train on a date-ordered training matrix; sample `i` sees the mean of
    /// the trailing `window` rows up to and including row `i`.
    pub fn train(
        matrix: &[FeatureVector],
        targets: &[f64],
        window: usize,
        hidden: usize,
        config: &SgdConfig,
    ) -> Result<Self> {
        if matrix.len() != targets.len() || matrix.is_empty() {
            return Err(ForecastError::DataError(
                "Feature matrix and targets must have the same non-zero length".to_string(),
            ));
        }
        if window == 0 || hidden == 0 {
            return Err(ForecastError::InvalidParameter(
                "window and hidden size must be positive".to_string(),
            ));
        }
        config.validate()?;

        let means: Vec<FeatureVector> = (0..matrix.len())
            .map(|i| window_mean(&matrix[i.saturating_sub(window - 1)..=i]))
            .collect();
        let scaler = FeatureScaler::fit(&means)?;
        let scaled: Vec<FeatureVector> = means.iter().map(|row| scaler.transform(row)).collect();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut w_enc: Vec<Vec<f64>> = (0..hidden)
            .map(|_| init_weights(&mut rng, FEATURE_COUNT))
            .collect();
        let mut b_enc = vec![0.0; hidden];
        let mut w_gate: Vec<Vec<f64>> = (0..hidden)
            .map(|_| init_weights(&mut rng, FEATURE_COUNT))
            .collect();
        let mut b_gate = vec![0.0; hidden];
        let mut w_out = init_weights(&mut rng, hidden);
        let mut b_out = targets.iter().sum::<f64>() / targets.len() as f64;

        let lr = config.learning_rate;
        for _ in 0..config.epochs {
            for &i in &shuffled_indices(&mut rng, scaled.len()) {
                let x = &scaled[i];
                let mut enc = vec![0.0; hidden];
                let mut gate = vec![0.0; hidden];
                let mut h = vec![0.0; hidden];
                for k in 0..hidden {
                    enc[k] = (dot(&w_enc[k], x) + b_enc[k]).tanh();
                    gate[k] = sigmoid(dot(&w_gate[k], x) + b_gate[k]);
                    h[k] = enc[k] * gate[k];
                }
                let out = w_out.iter().zip(h.iter()).map(|(w, v)| w * v).sum::<f64>() + b_out;

                // q50 pinball subgradient
                let g_out = if targets[i] > out { -0.5 } else { 0.5 };

                for k in 0..hidden {
                    let g_h = g_out * w_out[k];
                    let g_enc_z = g_h * gate[k] * (1.0 - enc[k] * enc[k]);
                    let g_gate_z = g_h * enc[k] * gate[k] * (1.0 - gate[k]);
                    for j in 0..FEATURE_COUNT {
                        w_enc[k][j] -= lr * (g_enc_z * x[j] + config.l2 * w_enc[k][j]);
                        w_gate[k][j] -= lr * (g_gate_z * x[j] + config.l2 * w_gate[k][j]);
                    }
                    b_enc[k] -= lr * g_enc_z;
                    b_gate[k] -= lr * g_gate_z;
                    w_out[k] -= lr * (g_out * h[k] + config.l2 * w_out[k]);
                }
                b_out -= lr * g_out;
            }
        }

        Ok(Self {
            window,
            hidden,
            scaler,
            w_enc,
            b_enc,
            w_gate,
            b_gate,
            w_out,
            b_out,
        })
    }

    /// The rolling window length this model was trained with
    pub fn window(&self) -> usize {
        self.window
    }

    fn forward(&self, x: &FeatureVector) -> f64 {
        let mut out = self.b_out;
        for k in 0..self.hidden {
            let enc = (dot(&self.w_enc[k], x) + self.b_enc[k]).tanh();
            let gate = sigmoid(dot(&self.w_gate[k], x) + self.b_gate[k]);
            out += self.w_out[k] * enc * gate;
        }
        out
    }
}

impl SequencePath for SequenceModel {
    fn available(&self) -> bool {
        true
    }

    fn predict_window(&self, window: &[FeatureVector]) -> Result<f64> {
        if window.is_empty() {
            return Err(ForecastError::DataError(
                "Sequence window must contain at least one feature vector".to_string(),
            ));
        }
        let mean = window_mean(window);
        Ok(self.forward(&self.scaler.transform(&mean)))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn window_mean(window: &[FeatureVector]) -> FeatureVector {
    let mut mean = [0.0; FEATURE_COUNT];
    for row in window {
        for (column, value) in row.iter().enumerate() {
            mean[column] += value;
        }
    }
    let n = window.len() as f64;
    for value in mean.iter_mut() {
        *value /= n;
    }
    mean
}
