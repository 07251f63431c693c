//! Mode resolution and blending of the quantile bank, spike cascade and
//! optional sequence path into one calibrated (lower, median, upper) triple

use crate::artifacts::ArtifactStore;
use crate::data::{AdmissionHistory, RawObservation};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, FeatureVector, SkippedRow};
use crate::models::quantile::QuantileRegressor;
use crate::models::sequence::{NullSequence, SequencePath};
use crate::models::spike::SpikeCorrector;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

/// Prediction mode requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Blend the corrected quantile median with the sequence estimate;
    /// degrades to `Quantile` when the sequence path is unavailable
    Ensemble,
    /// Quantile bank only; always satisfiable while q50 is loaded
    Quantile,
    /// Sequence median only; never degrades, fails when unsatisfiable
    Sequence,
}

impl FromStr for Mode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ensemble" => Ok(Mode::Ensemble),
            "quantile" | "quantile-only" => Ok(Mode::Quantile),
            "sequence" | "sequence-only" => Ok(Mode::Sequence),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown mode '{other}'; expected ensemble, quantile or sequence"
            ))),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Ensemble => "ensemble",
            Mode::Quantile => "quantile",
            Mode::Sequence => "sequence",
        };
        f.write_str(name)
    }
}

/// Immutable blending configuration, supplied at construction instead of
/// read from process-wide state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendConfig {
    /// Weight on the corrected quantile median in ensemble mode; the
    /// sequence estimate receives the complement
    pub sequence_weight: f64,
    /// Symmetric band half-width used when q10/q90 artifacts are missing
    pub fallback_spread: f64,
    /// How strongly a spike correction rescales the band: the upper bound
    /// shifts by `adj * (1 + scale)`, the lower by `adj * (1 - scale)`
    pub spike_band_scale: f64,
    /// Rolling window length handed to the sequence path
    pub sequence_window: usize,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            sequence_weight: 0.6,
            fallback_spread: 25.0,
            spike_band_scale: 0.5,
            sequence_window: 14,
        }
    }
}

impl BlendConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sequence_weight) {
            return Err(ForecastError::InvalidParameter(
                "sequence_weight must be within [0, 1]".to_string(),
            ));
        }
        if self.fallback_spread < 0.0 || self.spike_band_scale < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "fallback_spread and spike_band_scale must be non-negative".to_string(),
            ));
        }
        if self.sequence_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "sequence_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Final calibrated triple for one input row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantilePrediction {
    /// Position of the source row in the input batch
    pub row_index: usize,
    pub date: NaiveDate,
    pub facility_id: String,
    pub lower: f64,
    pub median: f64,
    pub upper: f64,
}

/// One prediction per valid input row, in input order; invalid rows are
/// reported individually instead of aborting the batch
#[derive(Debug)]
pub struct PredictionBatch {
    pub predictions: Vec<QuantilePrediction>,
    pub skipped: Vec<SkippedRow>,
}

/// Composes the feature builder, quantile bank, spike cascade and optional
/// sequence path. Immutable after construction; prediction is a pure
/// function of (rows, history, loaded artifacts).
pub struct EnsembleBlender {
    q10: Option<QuantileRegressor>,
    q50: Option<QuantileRegressor>,
    q90: Option<QuantileRegressor>,
    spike: Option<SpikeCorrector>,
    extreme_spike: Option<SpikeCorrector>,
    sequence: Box<dyn SequencePath>,
    config: BlendConfig,
    builder: FeatureBuilder,
    demotion_log: Once,
    sequence_failure_log: Once,
}

impl std::fmt::Debug for EnsembleBlender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleBlender")
            .field("q10", &self.q10.is_some())
            .field("q50", &self.q50.is_some())
            .field("q90", &self.q90.is_some())
            .field("spike", &self.spike.is_some())
            .field("extreme_spike", &self.extreme_spike.is_some())
            .field("sequence_available", &self.sequence.available())
            .field("config", &self.config)
            .finish()
    }
}

impl EnsembleBlender {
    /// Build a blender from a loaded artifact store. Missing optional
    /// artifacts degrade their path; a missing q50 only fails later, at
    /// prediction time, with `ModelNotLoaded`.
    pub fn from_store(store: ArtifactStore, config: BlendConfig) -> Result<Self> {
        config.validate()?;
        let sequence: Box<dyn SequencePath> = match store.sequence() {
            Some(model) => Box::new(model.clone()),
            None => Box::new(NullSequence),
        };
        let q10 = store.quantile("q10").cloned();
        let q50 = store.quantile("q50").cloned();
        let q90 = store.quantile("q90").cloned();
        let spike = store.spike("spike").cloned();
        let extreme_spike = store.spike("extreme_spike").cloned();

        Ok(Self {
            q10,
            q50,
            q90,
            spike,
            extreme_spike,
            sequence,
            config,
            builder: FeatureBuilder::new(),
            demotion_log: Once::new(),
            sequence_failure_log: Once::new(),
        })
    }

    /// Swap in a custom sequence path implementation
    pub fn with_sequence_path(mut self, sequence: Box<dyn SequencePath>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn config(&self) -> &BlendConfig {
        &self.config
    }

    /// Resolve the requested mode against what is actually loaded.
    ///
    /// `Ensemble` silently downgrades to `Quantile` when the sequence path
    /// is unavailable (logged once per blender, not per request).
    /// `Sequence` is the one place degradation is forbidden.
    pub fn resolve_mode(&self, requested: Mode) -> Result<Mode> {
        match requested {
            Mode::Quantile => Ok(Mode::Quantile),
            Mode::Sequence => {
                if self.sequence.available() {
                    Ok(Mode::Sequence)
                } else {
                    Err(ForecastError::ModelUnavailable(
                        "sequence model is required for sequence mode".to_string(),
                    ))
                }
            }
            Mode::Ensemble => {
                if self.sequence.available() {
                    Ok(Mode::Ensemble)
                } else {
                    self.demotion_log.call_once(|| {
                        info!("sequence path unavailable; ensemble requests run quantile-only");
                    });
                    Ok(Mode::Quantile)
                }
            }
        }
    }

    /// Predict one calibrated triple per valid input row, in input order.
    /// Rows are independent and evaluated in parallel.
    pub fn predict(
        &self,
        rows: &[RawObservation],
        history: &AdmissionHistory,
        mode: Mode,
    ) -> Result<PredictionBatch> {
        let resolved = self.resolve_mode(mode)?;
        let q50 = self
            .q50
            .as_ref()
            .ok_or_else(|| ForecastError::ModelNotLoaded("q50".to_string()))?;

        let report = self.builder.build(rows, history);
        let features = &report.features;

        let predictions: Result<Vec<QuantilePrediction>> = features
            .par_iter()
            .enumerate()
            .map(|(position, vector)| {
                let row_index = report.row_indices[position];
                let row = &rows[row_index];
                let triple =
                    self.blend_row(q50, vector, features, position, resolved)?;
                Ok(QuantilePrediction {
                    row_index,
                    date: row.date,
                    facility_id: row.facility_id.clone(),
                    lower: triple.0,
                    median: triple.1,
                    upper: triple.2,
                })
            })
            .collect();

        Ok(PredictionBatch {
            predictions: predictions?,
            skipped: report.skipped,
        })
    }

    fn blend_row(
        &self,
        q50: &QuantileRegressor,
        vector: &FeatureVector,
        features: &[FeatureVector],
        position: usize,
        mode: Mode,
    ) -> Result<(f64, f64, f64)> {
        let base = q50.predict_one(vector);

        // Both correctors run on every row; contributions clamp at zero
        let adj_primary = self
            .spike
            .as_ref()
            .map(|m| m.predict_one(vector).max(0.0))
            .unwrap_or(0.0);
        let adj_extreme = self
            .extreme_spike
            .as_ref()
            .map(|m| m.predict_one(vector).max(0.0))
            .unwrap_or(0.0);
        let adjustment = adj_primary + adj_extreme;
        let corrected = base + adjustment;

        let sequence_estimate = match mode {
            Mode::Quantile => None,
            Mode::Ensemble | Mode::Sequence => {
                let start = position.saturating_sub(self.config.sequence_window - 1);
                match self.sequence.predict_window(&features[start..=position]) {
                    Ok(estimate) => Some(estimate),
                    Err(error) => {
                        if mode == Mode::Sequence {
                            return Err(error);
                        }
                        self.sequence_failure_log.call_once(|| {
                            info!(%error, "sequence inference failed; running quantile-only");
                        });
                        None
                    }
                }
            }
        };

        let (weight, sequence_value) = match (mode, sequence_estimate) {
            (Mode::Ensemble, Some(estimate)) => (self.config.sequence_weight, estimate),
            (Mode::Sequence, Some(estimate)) => (0.0, estimate),
            _ => (1.0, 0.0),
        };
        let median = weight * corrected + (1.0 - weight) * sequence_value;

        // Missing q10/q90 degrade to a symmetric band around the base median
        let q10_value = self
            .q10
            .as_ref()
            .map(|m| m.predict_one(vector))
            .unwrap_or(base - self.config.fallback_spread);
        let q90_value = self
            .q90
            .as_ref()
            .map(|m| m.predict_one(vector))
            .unwrap_or(base + self.config.fallback_spread);

        // A positive correction shifts the band and widens its upper side
        let mut lower = q10_value + adjustment * (1.0 - self.config.spike_band_scale);
        let mut upper = q90_value + adjustment * (1.0 + self.config.spike_band_scale);

        // Always widen toward validity, never narrow the opposite bound
        if lower > median {
            lower = median;
        }
        if upper < median {
            upper = median;
        }

        Ok((lower, median, upper))
    }
}
