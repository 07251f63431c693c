//! Raw observation records and per-facility admissions history

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

/// One raw record per (facility, date).
///
/// Only `date`, `facility_id`, `aqi` and `temp` are required; every other
/// signal has a documented default of zero when absent. Weekday and weekend
/// indicators are derived from `date` and are deliberately not part of the
/// wire schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub facility_id: String,
    /// Daily admissions count, present on training rows
    #[serde(default)]
    pub admissions: Option<f64>,
    /// Air quality index; required, no default policy
    #[serde(default)]
    pub aqi: Option<f64>,
    /// Temperature; required, no default policy
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub rainfall: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub mobility_index: Option<f64>,
    #[serde(default)]
    pub outbreak_index: Option<f64>,
    /// Respiratory case load; some inference feeds omit it entirely
    #[serde(default)]
    pub respiratory: Option<f64>,
    #[serde(default)]
    pub festival_flag: Option<f64>,
    #[serde(default)]
    pub holiday_flag: Option<f64>,
    #[serde(default)]
    pub population_density: Option<f64>,
    #[serde(default)]
    pub hospital_beds: Option<f64>,
    #[serde(default)]
    pub staff_count: Option<f64>,
    #[serde(default)]
    pub city_id: Option<f64>,
    #[serde(default)]
    pub hospital_id_enc: Option<f64>,
}

impl RawObservation {
    /// Check that every required field carrying no default policy is present
    pub fn validate(&self) -> Result<()> {
        if self.aqi.is_none() {
            return Err(ForecastError::Schema { field: "aqi" });
        }
        if self.temp.is_none() {
            return Err(ForecastError::Schema { field: "temp" });
        }
        Ok(())
    }
}

/// One historical admissions sample used to build lag features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub facility_id: String,
    pub date: NaiveDate,
    pub admissions: f64,
}

/// Per-facility, date-ordered admissions buffer.
///
/// Lookups that fall outside the recorded range return `None`; the feature
/// builder substitutes its documented fallback constant in that case.
#[derive(Debug, Clone, Default)]
pub struct AdmissionHistory {
    series: HashMap<String, BTreeMap<NaiveDate, f64>>,
}

impl AdmissionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from unordered records
    pub fn from_records(records: &[HistoryRecord]) -> Self {
        let mut history = Self::new();
        for record in records {
            history.record(&record.facility_id, record.date, record.admissions);
        }
        history
    }

    /// Record one admissions observation; later records for the same
    /// (facility, date) overwrite earlier ones
    pub fn record(&mut self, facility_id: &str, date: NaiveDate, admissions: f64) {
        self.series
            .entry(facility_id.to_string())
            .or_default()
            .insert(date, admissions);
    }

    /// Admissions on an exact date, if recorded
    pub fn admissions_on(&self, facility_id: &str, date: NaiveDate) -> Option<f64> {
        self.series.get(facility_id)?.get(&date).copied()
    }

    /// Mean admissions over up to `window` days strictly before `date`.
    /// Returns `None` only when no sample at all falls in the window.
    pub fn rolling_mean_before(
        &self,
        facility_id: &str,
        date: NaiveDate,
        window: u32,
    ) -> Option<f64> {
        let series = self.series.get(facility_id)?;
        let start = date - chrono::Duration::days(i64::from(window));
        let mut sum = 0.0;
        let mut count = 0usize;
        for (_, &value) in series.range(start..date) {
            sum += value;
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Number of facilities with recorded history
    pub fn facility_count(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Loader for offline training datasets
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load raw observations from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RawObservation>> {
        let file = File::open(path)?;
        let mut reader = csv::Reader::from_reader(file);
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: RawObservation = record?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Build the admissions history implied by a training dataset's own
    /// `admissions` column
    pub fn history_from_rows(rows: &[RawObservation]) -> AdmissionHistory {
        let mut history = AdmissionHistory::new();
        for row in rows {
            if let Some(admissions) = row.admissions {
                history.record(&row.facility_id, row.date, admissions);
            }
        }
        history
    }
}
