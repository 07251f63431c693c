use forecast_admissions::artifacts::{ArtifactStore, ModelArtifact};
use forecast_admissions::features::{FeatureVector, FEATURE_COUNT};
use forecast_admissions::models::quantile::QuantileRegressor;
use forecast_admissions::models::SgdConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;

fn synthetic_set(n: usize) -> (Vec<FeatureVector>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(11);
    let mut matrix = Vec::with_capacity(n);
    let mut targets = Vec::with_capacity(n);
    for _ in 0..n {
        let mut row = [0.0; FEATURE_COUNT];
        row[3] = rng.gen_range(50.0..350.0);
        row[4] = rng.gen_range(5.0..40.0);
        matrix.push(row);
        targets.push(100.0 + 0.2 * row[3] + row[4]);
    }
    (matrix, targets)
}

fn trained_q50() -> (QuantileRegressor, Vec<FeatureVector>) {
    let (matrix, targets) = synthetic_set(80);
    let config = SgdConfig {
        epochs: 60,
        ..SgdConfig::default()
    };
    let model = QuantileRegressor::train(0.5, &matrix, &targets, &config).unwrap();
    (model, matrix)
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (model, matrix) = trained_q50();
    let before = model.predict_one(&matrix[0]);

    let mut store = ArtifactStore::new();
    store.insert("q50", ModelArtifact::Quantile(model));
    store.save_dir(dir.path()).unwrap();

    let (loaded, issues) = ArtifactStore::load_dir(dir.path());
    assert!(issues.is_empty());
    assert!(loaded.contains("q50"));

    let after = loaded.quantile("q50").unwrap().predict_one(&matrix[0]);
    assert_eq!(before, after);
}

#[test]
fn test_no_staging_files_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let (model, _) = trained_q50();

    let mut store = ArtifactStore::new();
    store.insert("q50", ModelArtifact::Quantile(model));
    store.save_dir(dir.path()).unwrap();

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_corrupt_artifact_does_not_poison_other_names() {
    let dir = tempfile::tempdir().unwrap();
    let (model, _) = trained_q50();

    let mut store = ArtifactStore::new();
    store.insert("q50", ModelArtifact::Quantile(model));
    store.save_dir(dir.path()).unwrap();

    fs::write(dir.path().join("q10.json"), b"{ definitely not json").unwrap();

    let (loaded, issues) = ArtifactStore::load_dir(dir.path());
    assert!(loaded.contains("q50"));
    assert!(!loaded.contains("q10"));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].name, "q10");
}

#[test]
fn test_unknown_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.json"), b"{}").unwrap();
    fs::write(dir.path().join("README.md"), b"hello").unwrap();

    let (loaded, issues) = ArtifactStore::load_dir(dir.path());
    assert!(loaded.is_empty());
    assert!(issues.is_empty());
}

#[test]
fn test_typed_accessors_reject_mismatched_kinds() {
    let (model, _) = trained_q50();
    let mut store = ArtifactStore::new();
    store.insert("spike", ModelArtifact::Quantile(model));

    // A quantile artifact stored under a spike name is not a corrector
    assert!(store.spike("spike").is_none());
    assert!(store.quantile("spike").is_some());
}
