use assert_approx_eq::assert_approx_eq;
use chrono::NaiveDate;
use forecast_admissions::data::{AdmissionHistory, RawObservation};
use forecast_admissions::error::ForecastError;
use forecast_admissions::features::{
    FeatureBuilder, DEFAULT_LAG_ADMISSIONS, FEATURE_COUNT, FEATURE_NAMES,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn observation(day: &str) -> RawObservation {
    RawObservation {
        date: date(day),
        facility_id: "h1".to_string(),
        admissions: None,
        aqi: Some(180.0),
        temp: Some(25.0),
        humidity: Some(0.6),
        rainfall: Some(2.0),
        wind_speed: Some(10.0),
        mobility_index: Some(1.2),
        outbreak_index: Some(0.3),
        respiratory: Some(40.0),
        festival_flag: Some(0.0),
        holiday_flag: Some(1.0),
        population_density: Some(12000.0),
        hospital_beds: Some(450.0),
        staff_count: Some(300.0),
        city_id: Some(3.0),
        hospital_id_enc: Some(17.0),
    }
}

fn index_of(name: &str) -> usize {
    FEATURE_NAMES.iter().position(|&n| n == name).unwrap()
}

#[test]
fn test_column_order_is_stable() {
    assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
    assert_eq!(FEATURE_COUNT, 41);
    assert_eq!(FEATURE_NAMES[0], "lag_1_admissions");
    assert_eq!(FEATURE_NAMES[3], "aqi");
    assert_eq!(FEATURE_NAMES[40], "rolling_aqi");

    let builder = FeatureBuilder::new();
    let history = AdmissionHistory::new();
    let vector = builder.build_row(&observation("2024-03-15"), &history).unwrap();
    assert_eq!(vector.len(), FEATURE_COUNT);
}

#[test]
fn test_deterministic_for_identical_input() {
    let builder = FeatureBuilder::new();
    let mut history = AdmissionHistory::new();
    history.record("h1", date("2024-03-14"), 120.0);

    let row = observation("2024-03-15");
    let first = builder.build_row(&row, &history).unwrap();
    let second = builder.build_row(&row, &history).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_missing_history_uses_default_constant() {
    let builder = FeatureBuilder::new();
    let history = AdmissionHistory::new();
    let vector = builder.build_row(&observation("2024-03-15"), &history).unwrap();

    assert_approx_eq!(vector[index_of("lag_1_admissions")], DEFAULT_LAG_ADMISSIONS);
    assert_approx_eq!(vector[index_of("lag_7_admissions")], DEFAULT_LAG_ADMISSIONS);
    assert_approx_eq!(vector[index_of("rolling_14_admissions")], DEFAULT_LAG_ADMISSIONS);
}

#[test]
fn test_lag_and_rolling_match_direct_computation() {
    let builder = FeatureBuilder::new();
    let mut history = AdmissionHistory::new();
    // Steadily increasing admissions for two weeks before the batch
    let base = date("2024-03-01");
    for offset in 0..14 {
        history.record("h1", base + chrono::Duration::days(offset), 100.0 + 10.0 * offset as f64);
    }

    // Seven consecutive rows starting the day after the history ends
    for day in 0..7 {
        let current = date("2024-03-15") + chrono::Duration::days(day);
        let row = RawObservation {
            date: current,
            ..observation("2024-03-15")
        };
        let vector = builder.build_row(&row, &history).unwrap();

        let expected_lag_1 = history
            .admissions_on("h1", current - chrono::Duration::days(1))
            .unwrap_or(DEFAULT_LAG_ADMISSIONS);
        let expected_lag_7 = history
            .admissions_on("h1", current - chrono::Duration::days(7))
            .unwrap_or(DEFAULT_LAG_ADMISSIONS);

        // Direct rolling mean over up to 14 days strictly before the row
        let mut sum = 0.0;
        let mut count = 0;
        for back in 1..=14 {
            if let Some(v) = history.admissions_on("h1", current - chrono::Duration::days(back)) {
                sum += v;
                count += 1;
            }
        }
        let expected_rolling = if count > 0 {
            sum / count as f64
        } else {
            DEFAULT_LAG_ADMISSIONS
        };

        assert_approx_eq!(vector[index_of("lag_1_admissions")], expected_lag_1);
        assert_approx_eq!(vector[index_of("lag_7_admissions")], expected_lag_7);
        assert_approx_eq!(vector[index_of("rolling_14_admissions")], expected_rolling);
    }
}

#[test]
fn test_row_missing_required_field_is_skipped_not_fatal() {
    let builder = FeatureBuilder::new();
    let history = AdmissionHistory::new();

    let good = observation("2024-03-15");
    let mut bad = observation("2024-03-16");
    bad.aqi = None;
    let also_good = observation("2024-03-17");

    let report = builder.build(&[good, bad, also_good], &history);
    assert_eq!(report.features.len(), 2);
    assert_eq!(report.row_indices, vec![0, 2]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 1);
    assert!(matches!(
        report.skipped[0].error,
        ForecastError::Schema { field: "aqi" }
    ));
}

#[test]
fn test_optional_fields_default_to_zero() {
    let builder = FeatureBuilder::new();
    let history = AdmissionHistory::new();
    let row = RawObservation {
        date: date("2024-03-15"),
        facility_id: "h1".to_string(),
        admissions: None,
        aqi: Some(100.0),
        temp: Some(20.0),
        humidity: None,
        rainfall: None,
        wind_speed: None,
        mobility_index: None,
        outbreak_index: None,
        respiratory: None,
        festival_flag: None,
        holiday_flag: None,
        population_density: None,
        hospital_beds: None,
        staff_count: None,
        city_id: None,
        hospital_id_enc: None,
    };

    let vector = builder.build_row(&row, &history).unwrap();
    assert_approx_eq!(vector[index_of("humidity")], 0.0);
    assert_approx_eq!(vector[index_of("mobility_outbreak")], 0.0);
    // respiratory defaults to 0, so the ratio is just aqi
    assert_approx_eq!(vector[index_of("aqi_respiratory_ratio")], 100.0);
}

#[test]
fn test_nonfinite_feature_is_sanitised() {
    let builder = FeatureBuilder::new();
    let history = AdmissionHistory::new();
    let mut row = observation("2024-03-15");
    // Drives aqi / (respiratory + 1) to infinity
    row.respiratory = Some(-1.0);

    let vector = builder.build_row(&row, &history).unwrap();
    assert_approx_eq!(vector[index_of("aqi_respiratory_ratio")], 0.0);
    assert!(vector.iter().all(|v| v.is_finite()));
}

#[rstest]
#[case("2024-01-10", 0.0)]
#[case("2024-04-10", 1.0)]
#[case("2024-07-10", 2.0)]
#[case("2024-10-10", 3.0)]
#[case("2024-12-10", 0.0)]
fn test_season_mapping(#[case] day: &str, #[case] expected: f64) {
    let builder = FeatureBuilder::new();
    let history = AdmissionHistory::new();
    let vector = builder.build_row(&observation(day), &history).unwrap();
    assert_approx_eq!(vector[index_of("season")], expected);
}

#[test]
fn test_calendar_and_threshold_features() {
    let builder = FeatureBuilder::new();
    let history = AdmissionHistory::new();
    // 2024-03-16 is a Saturday
    let vector = builder.build_row(&observation("2024-03-16"), &history).unwrap();

    assert_approx_eq!(vector[index_of("weekday")], 5.0);
    assert_approx_eq!(vector[index_of("is_weekend")], 1.0);
    assert_approx_eq!(vector[index_of("quarter")], 1.0);
    // aqi = 180: above 150, not above 200 or 300
    assert_approx_eq!(vector[index_of("aqi_above_150")], 1.0);
    assert_approx_eq!(vector[index_of("aqi_above_200")], 0.0);
    assert_approx_eq!(vector[index_of("aqi_severity")], 0.5);
    // rainfall * is_weekend
    assert_approx_eq!(vector[index_of("rainfall_injury_risk")], 2.0);
}
