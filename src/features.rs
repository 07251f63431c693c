//! Feature derivation: raw observations to the fixed 41-column matrix

use crate::data::{AdmissionHistory, RawObservation};
use crate::error::ForecastError;
use chrono::Datelike;
use tracing::warn;

/// Number of columns in every feature vector
pub const FEATURE_COUNT: usize = 41;

/// Substituted for lag/rolling admissions when the supplied history is
/// shorter than the required window. A deliberate policy, not an error.
pub const DEFAULT_LAG_ADMISSIONS: f64 = 150.0;

/// Canonical column order shared by every model in the bank
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "lag_1_admissions",
    "lag_7_admissions",
    "rolling_14_admissions",
    "aqi",
    "temp",
    "humidity",
    "rainfall",
    "wind_speed",
    "mobility_index",
    "outbreak_index",
    "festival_flag",
    "holiday_flag",
    "weekday",
    "is_weekend",
    "population_density",
    "hospital_beds",
    "staff_count",
    "city_id",
    "hospital_id_enc",
    "month",
    "week_of_year",
    "quarter",
    "season",
    "day_sin",
    "day_cos",
    "month_sin",
    "month_cos",
    "aqi_above_150",
    "aqi_above_200",
    "aqi_above_300",
    "aqi_severity",
    "temp_humidity",
    "rainfall_injury_risk",
    "aqi_respiratory_ratio",
    "aqi_temp",
    "mobility_outbreak",
    "temp_rainfall",
    "aqi_mobility",
    "lag1_aqi",
    "lag7_outbreak",
    "rolling_aqi",
];

/// Fixed-length, fixed-order numeric feature vector
pub type FeatureVector = [f64; FEATURE_COUNT];

/// A row excluded from a batch, reported individually
#[derive(Debug)]
pub struct SkippedRow {
    /// Position of the row in the input batch
    pub index: usize,
    pub error: ForecastError,
}

/// Outcome of building features for one batch
#[derive(Debug, Default)]
pub struct BuildReport {
    /// One vector per valid input row, in input order
    pub features: Vec<FeatureVector>,
    /// Input index of each feature row
    pub row_indices: Vec<usize>,
    /// Rows excluded for schema reasons
    pub skipped: Vec<SkippedRow>,
}

/// Pure transform from raw observations plus history to feature vectors.
///
/// Referentially transparent: the same (row, history) pair always yields a
/// bit-identical vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build feature vectors for a batch. A row missing a required field is
    /// skipped and reported; it never aborts the batch.
    pub fn build(&self, rows: &[RawObservation], history: &AdmissionHistory) -> BuildReport {
        let mut report = BuildReport::default();
        for (index, row) in rows.iter().enumerate() {
            match self.build_row(row, history) {
                Ok(vector) => {
                    report.features.push(vector);
                    report.row_indices.push(index);
                }
                Err(error) => report.skipped.push(SkippedRow { index, error }),
            }
        }
        report
    }

    /// Build the feature vector for a single observation
    pub fn build_row(
        &self,
        row: &RawObservation,
        history: &AdmissionHistory,
    ) -> crate::error::Result<FeatureVector> {
        row.validate()?;

        let date = row.date;
        let aqi = row.aqi.unwrap_or(0.0);
        let temp = row.temp.unwrap_or(0.0);
        let humidity = row.humidity.unwrap_or(0.0);
        let rainfall = row.rainfall.unwrap_or(0.0);
        let wind_speed = row.wind_speed.unwrap_or(0.0);
        let mobility = row.mobility_index.unwrap_or(0.0);
        let outbreak = row.outbreak_index.unwrap_or(0.0);
        let respiratory = row.respiratory.unwrap_or(0.0);

        // Lag features come from the supplied history; short histories fall
        // back to the documented default constant.
        let lag_1 = history
            .admissions_on(&row.facility_id, date - chrono::Duration::days(1))
            .unwrap_or(DEFAULT_LAG_ADMISSIONS);
        let lag_7 = history
            .admissions_on(&row.facility_id, date - chrono::Duration::days(7))
            .unwrap_or(DEFAULT_LAG_ADMISSIONS);
        let rolling_14 = history
            .rolling_mean_before(&row.facility_id, date, 14)
            .unwrap_or(DEFAULT_LAG_ADMISSIONS);

        // Calendar encodings derived from the date, never read off the wire
        let weekday = f64::from(date.weekday().num_days_from_monday());
        let is_weekend = if weekday >= 5.0 { 1.0 } else { 0.0 };
        let month = f64::from(date.month());
        let week_of_year = f64::from(date.iso_week().week());
        let quarter = f64::from((date.month() - 1) / 3 + 1);
        let season = match date.month() {
            12 | 1 | 2 => 0.0,
            3..=5 => 1.0,
            6..=8 => 2.0,
            _ => 3.0,
        };

        let tau = 2.0 * std::f64::consts::PI;
        let day_of_year = f64::from(date.ordinal());
        let day_sin = (tau * day_of_year / 365.0).sin();
        let day_cos = (tau * day_of_year / 365.0).cos();
        let month_sin = (tau * month / 12.0).sin();
        let month_cos = (tau * month / 12.0).cos();

        // Pollution threshold indicators and severity composite
        let aqi_above_150 = if aqi > 150.0 { 1.0 } else { 0.0 };
        let aqi_above_200 = if aqi > 200.0 { 1.0 } else { 0.0 };
        let aqi_above_300 = if aqi > 300.0 { 1.0 } else { 0.0 };
        let aqi_severity = 0.5 * aqi_above_150 + 1.0 * aqi_above_200 + 1.5 * aqi_above_300;

        let mut vector: FeatureVector = [
            lag_1,
            lag_7,
            rolling_14,
            aqi,
            temp,
            humidity,
            rainfall,
            wind_speed,
            mobility,
            outbreak,
            row.festival_flag.unwrap_or(0.0),
            row.holiday_flag.unwrap_or(0.0),
            weekday,
            is_weekend,
            row.population_density.unwrap_or(0.0),
            row.hospital_beds.unwrap_or(0.0),
            row.staff_count.unwrap_or(0.0),
            row.city_id.unwrap_or(0.0),
            row.hospital_id_enc.unwrap_or(0.0),
            month,
            week_of_year,
            quarter,
            season,
            day_sin,
            day_cos,
            month_sin,
            month_cos,
            aqi_above_150,
            aqi_above_200,
            aqi_above_300,
            aqi_severity,
            temp * humidity,
            rainfall * is_weekend,
            aqi / (respiratory + 1.0),
            aqi * temp,
            mobility * (1.0 + outbreak),
            temp * rainfall,
            aqi * mobility,
            lag_1 * aqi / 100.0,
            lag_7 * (1.0 + outbreak / 100.0),
            rolling_14 * aqi / 100.0,
        ];

        // NaN/Inf in a computed feature is sanitised, never propagated
        for (column, value) in vector.iter_mut().enumerate() {
            if !value.is_finite() {
                warn!(
                    feature = FEATURE_NAMES[column],
                    facility = %row.facility_id,
                    "non-finite feature value sanitised to 0"
                );
                *value = 0.0;
            }
        }

        Ok(vector)
    }
}
