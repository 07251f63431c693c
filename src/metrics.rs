//! Metrics for evaluating quantile forecasts

use crate::ensemble::QuantilePrediction;
use crate::error::{ForecastError, Result};

fn check_lengths(actual: &[f64], other: &[f64]) -> Result<()> {
    if actual.len() != other.len() || actual.is_empty() {
        return Err(ForecastError::DataError(
            "Series must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

/// Mean absolute error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root mean squared error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok((sum / actual.len() as f64).sqrt())
}

/// Mean pinball loss at quantile `tau`, the asymmetric loss quantile
/// regressors are trained against
pub fn pinball_loss(actual: &[f64], predicted: &[f64], tau: f64) -> Result<f64> {
    check_lengths(actual, predicted)?;
    if !(0.0..=1.0).contains(&tau) {
        return Err(ForecastError::InvalidParameter(
            "tau must be within [0, 1]".to_string(),
        ));
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| {
            let diff = a - p;
            (tau * diff).max((tau - 1.0) * diff)
        })
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Fraction of targets falling inside [lower, upper]
pub fn quantile_coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    check_lengths(actual, lower)?;
    check_lengths(actual, upper)?;
    let inside = actual
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .filter(|(a, (l, u))| **a >= **l && **a <= **u)
        .count();
    Ok(inside as f64 / actual.len() as f64)
}

/// Mean width of the uncertainty band
pub fn mean_band_width(lower: &[f64], upper: &[f64]) -> Result<f64> {
    check_lengths(lower, upper)?;
    let sum: f64 = lower.iter().zip(upper.iter()).map(|(l, u)| u - l).sum();
    Ok(sum / lower.len() as f64)
}

/// Summary of forecast quality against known targets
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    /// MAE of the median estimate
    pub mae: f64,
    /// RMSE of the median estimate
    pub rmse: f64,
    /// Pinball loss of the median estimate at tau = 0.5
    pub pinball_q50: f64,
    /// Fraction of targets inside the band
    pub coverage: f64,
    /// Mean band width
    pub mean_band_width: f64,
}

impl std::fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Evaluation:")?;
        writeln!(f, "  MAE:         {:.4}", self.mae)?;
        writeln!(f, "  RMSE:        {:.4}", self.rmse)?;
        writeln!(f, "  Pinball q50: {:.4}", self.pinball_q50)?;
        writeln!(f, "  Coverage:    {:.2}%", self.coverage * 100.0)?;
        writeln!(f, "  Band width:  {:.4}", self.mean_band_width)?;
        Ok(())
    }
}

/// Evaluate a prediction batch against the matching actual admissions
pub fn evaluate_predictions(
    actual: &[f64],
    predictions: &[QuantilePrediction],
) -> Result<EvaluationReport> {
    if actual.len() != predictions.len() || actual.is_empty() {
        return Err(ForecastError::DataError(
            "Actuals and predictions must have the same non-zero length".to_string(),
        ));
    }
    let median: Vec<f64> = predictions.iter().map(|p| p.median).collect();
    let lower: Vec<f64> = predictions.iter().map(|p| p.lower).collect();
    let upper: Vec<f64> = predictions.iter().map(|p| p.upper).collect();

    Ok(EvaluationReport {
        mae: mean_absolute_error(actual, &median)?,
        rmse: root_mean_squared_error(actual, &median)?,
        pinball_q50: pinball_loss(actual, &median, 0.5)?,
        coverage: quantile_coverage(actual, &lower, &upper)?,
        mean_band_width: mean_band_width(&lower, &upper)?,
    })
}
