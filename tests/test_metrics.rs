use assert_approx_eq::assert_approx_eq;
use chrono::NaiveDate;
use forecast_admissions::ensemble::QuantilePrediction;
use forecast_admissions::metrics::{
    evaluate_predictions, mean_absolute_error, mean_band_width, pinball_loss, quantile_coverage,
    root_mean_squared_error,
};

#[test]
fn test_regression_metrics() {
    let actual = vec![10.0, 20.0, 30.0, 40.0, 50.0];
    let predicted = vec![12.0, 18.0, 33.0, 37.0, 52.0];

    let mae = mean_absolute_error(&actual, &predicted).unwrap();
    assert_approx_eq!(mae, 2.4, 0.01);

    let rmse = root_mean_squared_error(&actual, &predicted).unwrap();
    assert!(rmse >= mae);
}

#[test]
fn test_pinball_loss_is_asymmetric() {
    let actual = vec![100.0, 100.0];
    let over = vec![110.0, 110.0];
    let under = vec![90.0, 90.0];

    // At tau = 0.9, under-prediction costs more than over-prediction
    let loss_under = pinball_loss(&actual, &under, 0.9).unwrap();
    let loss_over = pinball_loss(&actual, &over, 0.9).unwrap();
    assert!(loss_under > loss_over);
    assert_approx_eq!(loss_under, 9.0, 1e-9);
    assert_approx_eq!(loss_over, 1.0, 1e-9);

    // At tau = 0.5 it is half the absolute error
    let loss_median = pinball_loss(&actual, &over, 0.5).unwrap();
    assert_approx_eq!(loss_median, 5.0, 1e-9);
}

#[test]
fn test_quantile_coverage() {
    let actual = vec![10.0, 20.0, 30.0, 40.0];
    let lower = vec![5.0, 25.0, 25.0, 35.0];
    let upper = vec![15.0, 28.0, 35.0, 45.0];

    // Second target falls below its band
    let coverage = quantile_coverage(&actual, &lower, &upper).unwrap();
    assert_approx_eq!(coverage, 0.75, 1e-9);

    let width = mean_band_width(&lower, &upper).unwrap();
    assert_approx_eq!(width, 8.25, 1e-9);
}

#[test]
fn test_metrics_reject_mismatched_lengths() {
    let a = vec![1.0, 2.0];
    let b = vec![1.0];
    assert!(mean_absolute_error(&a, &b).is_err());
    assert!(pinball_loss(&a, &b, 0.5).is_err());
    assert!(quantile_coverage(&a, &b, &b).is_err());
    assert!(mean_absolute_error(&[], &[]).is_err());
}

#[test]
fn test_evaluate_predictions_report() {
    let date: NaiveDate = "2024-01-01".parse().unwrap();
    let predictions: Vec<QuantilePrediction> = (0..4)
        .map(|i| QuantilePrediction {
            row_index: i,
            date,
            facility_id: "h1".to_string(),
            lower: 90.0,
            median: 100.0,
            upper: 120.0,
        })
        .collect();
    let actual = vec![95.0, 105.0, 130.0, 100.0];

    let report = evaluate_predictions(&actual, &predictions).unwrap();
    assert_approx_eq!(report.mae, 10.0, 1e-9);
    assert_approx_eq!(report.coverage, 0.75, 1e-9);
    assert_approx_eq!(report.mean_band_width, 30.0, 1e-9);

    let rendered = format!("{report}");
    assert!(rendered.contains("Coverage"));
    assert!(rendered.contains("MAE"));
}
