//! # Forecast Admissions
//!
//! A Rust library for forecasting daily hospital admissions from
//! heterogeneous exogenous signals, with a calibrated uncertainty band.
//!
//! ## Features
//!
//! - Fixed-schema feature derivation (calendar encodings, admission lags,
//!   pollution thresholds, pairwise interaction terms)
//! - A bank of independently trained quantile regressors (q10/q50/q90)
//! - A two-stage residual-correction cascade for under-predicted spikes
//! - An optional gated sequence model over a rolling feature window
//! - Ensemble blending with mode selection and graceful degradation
//! - Atomic artifact persistence keyed by logical model name
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_admissions::artifacts::ArtifactStore;
//! use forecast_admissions::data::{AdmissionHistory, DataLoader};
//! use forecast_admissions::ensemble::{BlendConfig, EnsembleBlender, Mode};
//!
//! fn main() -> forecast_admissions::Result<()> {
//!     // Load persisted artifacts; per-name failures are reported, not fatal
//!     let (store, issues) = ArtifactStore::load_dir("models");
//!     for issue in &issues {
//!         eprintln!("artifact {} unusable: {}", issue.name, issue.error);
//!     }
//!
//!     let blender = EnsembleBlender::from_store(store, BlendConfig::default())?;
//!
//!     let rows = DataLoader::from_csv("observations.csv")?;
//!     let history = AdmissionHistory::new();
//!     let batch = blender.predict(&rows, &history, Mode::Ensemble)?;
//!     for prediction in &batch.predictions {
//!         println!(
//!             "{} {}: [{:.1}, {:.1}, {:.1}]",
//!             prediction.facility_id,
//!             prediction.date,
//!             prediction.lower,
//!             prediction.median,
//!             prediction.upper
//!         );
//!     }
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod training;

// Re-export commonly used types
pub use crate::artifacts::{ArtifactStore, ModelArtifact};
pub use crate::data::{AdmissionHistory, DataLoader, RawObservation};
pub use crate::ensemble::{BlendConfig, EnsembleBlender, Mode, PredictionBatch, QuantilePrediction};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{FeatureBuilder, FEATURE_COUNT, FEATURE_NAMES};
pub use crate::training::{TrainingConfig, TrainingSummary};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
