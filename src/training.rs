//! Offline, single-writer training phase producing persisted artifacts

use crate::artifacts::{ArtifactStore, ModelArtifact};
use crate::data::{AdmissionHistory, DataLoader, RawObservation};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, FeatureVector};
use crate::metrics;
use crate::models::quantile::QuantileRegressor;
use crate::models::sequence::SequenceModel;
use crate::models::spike::SpikeCorrector;
use crate::models::SgdConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Settings for the full training pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub sgd: SgdConfig,
    /// Targets above this percentile of the training targets define the
    /// spike regime for the primary corrector
    pub spike_gate_percentile: usize,
    /// Positive residuals above this percentile (after the primary stage)
    /// define the extreme regime
    pub extreme_residual_percentile: usize,
    pub min_spike_samples: usize,
    pub min_extreme_samples: usize,
    pub sequence_window: usize,
    pub sequence_hidden: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            sgd: SgdConfig::default(),
            spike_gate_percentile: 70,
            extreme_residual_percentile: 99,
            min_spike_samples: 25,
            min_extreme_samples: 10,
            sequence_window: 14,
            sequence_hidden: 16,
        }
    }
}

/// What the pipeline produced and how it fits the training set
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub rows_used: usize,
    pub rows_skipped: usize,
    pub spike_trained: bool,
    pub extreme_spike_trained: bool,
    /// MAE of the corrected median on the training set
    pub train_mae: f64,
    /// Fraction of training targets inside the raw [q10, q90] band
    pub train_coverage: f64,
}

/// Train the three members of the quantile bank independently
pub fn train_quantile_bank(
    matrix: &[FeatureVector],
    targets: &[f64],
    config: &SgdConfig,
) -> Result<(QuantileRegressor, QuantileRegressor, QuantileRegressor)> {
    let q10 = QuantileRegressor::train(0.10, matrix, targets, config)?;
    let q50 = QuantileRegressor::train(0.50, matrix, targets, config)?;
    let q90 = QuantileRegressor::train(0.90, matrix, targets, config)?;
    Ok((q10, q50, q90))
}

/// Train the two-stage residual cascade from the base q50 predictions.
/// Either stage may come back `None` when its regime is too thin.
pub fn train_spike_cascade(
    matrix: &[FeatureVector],
    targets: &[f64],
    base_predictions: &[f64],
    config: &TrainingConfig,
) -> Result<(Option<SpikeCorrector>, Option<SpikeCorrector>)> {
    if targets.len() != base_predictions.len() {
        return Err(ForecastError::DataError(
            "Targets and base predictions must have the same length".to_string(),
        ));
    }
    let residuals: Vec<f64> = targets
        .iter()
        .zip(base_predictions.iter())
        .map(|(y, p)| y - p)
        .collect();

    let primary = SpikeCorrector::train_primary(
        matrix,
        targets,
        &residuals,
        config.spike_gate_percentile,
        config.min_spike_samples,
        &config.sgd,
    )?;

    // The extreme stage learns what the primary stage still leaves behind
    let remaining: Vec<f64> = match &primary {
        Some(model) => matrix
            .iter()
            .zip(residuals.iter())
            .map(|(row, r)| r - model.predict_one(row).max(0.0))
            .collect(),
        None => residuals,
    };

    let extreme = SpikeCorrector::train_extreme(
        matrix,
        &remaining,
        config.extreme_residual_percentile,
        config.min_extreme_samples,
        &config.sgd,
    )?;

    Ok((primary, extreme))
}

/// Train the optional sequence model
pub fn train_sequence(
    matrix: &[FeatureVector],
    targets: &[f64],
    config: &TrainingConfig,
) -> Result<SequenceModel> {
    SequenceModel::train(
        matrix,
        targets,
        config.sequence_window,
        config.sequence_hidden,
        &config.sgd,
    )
}

/// Run the whole pipeline on date-ordered training rows and publish every
/// artifact atomically into `out_dir`.
///
/// Rows without an admissions target and rows failing schema validation
/// are skipped and counted; they never abort training.
pub fn train_all<P: AsRef<Path>>(
    rows: &[RawObservation],
    config: &TrainingConfig,
    out_dir: P,
) -> Result<TrainingSummary> {
    let history = DataLoader::history_from_rows(rows);
    let (matrix, targets, rows_skipped) = build_training_frame(rows, &history);
    if matrix.is_empty() {
        return Err(ForecastError::DataError(
            "No usable training rows with admissions targets".to_string(),
        ));
    }
    info!(rows = matrix.len(), skipped = rows_skipped, "training started");

    let (q10, q50, q90) = train_quantile_bank(&matrix, &targets, &config.sgd)?;
    let base_predictions = q50.predict(&matrix);
    let (spike, extreme_spike) =
        train_spike_cascade(&matrix, &targets, &base_predictions, config)?;
    let sequence = train_sequence(&matrix, &targets, config)?;

    let corrected: Vec<f64> = matrix
        .iter()
        .zip(base_predictions.iter())
        .map(|(row, base)| {
            let a = spike.as_ref().map(|m| m.predict_one(row).max(0.0)).unwrap_or(0.0);
            let b = extreme_spike
                .as_ref()
                .map(|m| m.predict_one(row).max(0.0))
                .unwrap_or(0.0);
            base + a + b
        })
        .collect();
    let train_mae = metrics::mean_absolute_error(&targets, &corrected)?;
    let train_coverage =
        metrics::quantile_coverage(&targets, &q10.predict(&matrix), &q90.predict(&matrix))?;

    let mut store = ArtifactStore::new();
    store.insert("q10", ModelArtifact::Quantile(q10));
    store.insert("q50", ModelArtifact::Quantile(q50));
    store.insert("q90", ModelArtifact::Quantile(q90));
    let spike_trained = spike.is_some();
    let extreme_spike_trained = extreme_spike.is_some();
    if let Some(model) = spike {
        store.insert("spike", ModelArtifact::Spike(model));
    }
    if let Some(model) = extreme_spike {
        store.insert("extreme_spike", ModelArtifact::Spike(model));
    }
    store.insert("sequence", ModelArtifact::Sequence(sequence));
    store.save_dir(out_dir)?;

    info!(train_mae, train_coverage, "training finished");
    Ok(TrainingSummary {
        rows_used: matrix.len(),
        rows_skipped,
        spike_trained,
        extreme_spike_trained,
        train_mae,
        train_coverage,
    })
}

/// Pair feature vectors with admissions targets, skipping rows without a
/// target or with schema problems
fn build_training_frame(
    rows: &[RawObservation],
    history: &AdmissionHistory,
) -> (Vec<FeatureVector>, Vec<f64>, usize) {
    let builder = FeatureBuilder::new();
    let mut matrix = Vec::new();
    let mut targets = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let Some(target) = row.admissions else {
            skipped += 1;
            continue;
        };
        match builder.build_row(row, history) {
            Ok(vector) => {
                matrix.push(vector);
                targets.push(target);
            }
            Err(_) => skipped += 1,
        }
    }
    (matrix, targets, skipped)
}
