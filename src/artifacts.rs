//! Persisted model artifacts: one JSON document per logical model name
//!
//! Writes publish atomically (write to a temp file, then rename) so a
//! reader never observes a partially written artifact. Loading is
//! all-or-nothing per name: a corrupt file for one name must not crash
//! loading of the others.

use crate::error::{ForecastError, Result};
use crate::models::quantile::QuantileRegressor;
use crate::models::sequence::SequenceModel;
use crate::models::spike::SpikeCorrector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Logical artifact names recognised by the store
pub const ARTIFACT_NAMES: [&str; 6] = ["q10", "q50", "q90", "spike", "extreme_spike", "sequence"];

/// Immutable parameter set for one model. Created offline during training;
/// loaded once at service start; never mutated while serving.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ModelArtifact {
    Quantile(QuantileRegressor),
    Spike(SpikeCorrector),
    Sequence(SequenceModel),
}

/// A per-name load failure, reported without aborting the rest of the load
#[derive(Debug)]
pub struct LoadIssue {
    pub name: String,
    pub error: ForecastError,
}

/// Keyed collection of artifacts (name -> model), so loading, degradation
/// and testing are driven uniformly instead of through per-model globals
#[derive(Debug, Default)]
pub struct ArtifactStore {
    artifacts: HashMap<String, ModelArtifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, artifact: ModelArtifact) {
        self.artifacts.insert(name.to_string(), artifact);
    }

    pub fn remove(&mut self, name: &str) -> Option<ModelArtifact> {
        self.artifacts.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Typed access to a quantile regressor artifact
    pub fn quantile(&self, name: &str) -> Option<&QuantileRegressor> {
        match self.artifacts.get(name) {
            Some(ModelArtifact::Quantile(model)) => Some(model),
            _ => None,
        }
    }

    /// Typed access to a spike corrector artifact
    pub fn spike(&self, name: &str) -> Option<&SpikeCorrector> {
        match self.artifacts.get(name) {
            Some(ModelArtifact::Spike(model)) => Some(model),
            _ => None,
        }
    }

    /// Typed access to the sequence model artifact
    pub fn sequence(&self) -> Option<&SequenceModel> {
        match self.artifacts.get("sequence") {
            Some(ModelArtifact::Sequence(model)) => Some(model),
            _ => None,
        }
    }

    /// Persist every artifact into `dir`, one `<name>.json` per model,
    /// publishing each file atomically
    pub fn save_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for (name, artifact) in &self.artifacts {
            let body = serde_json::to_vec_pretty(artifact)?;
            let target = dir.join(format!("{name}.json"));
            let staging = dir.join(format!("{name}.json.tmp"));
            fs::write(&staging, body)?;
            fs::rename(&staging, &target)?;
            info!(name, path = %target.display(), "saved model artifact");
        }
        Ok(())
    }

    /// Load every recognised artifact present in `dir`. A missing file is
    /// not an error; a corrupt file is reported as an issue for its name
    /// while the remaining names load normally.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> (Self, Vec<LoadIssue>) {
        let dir = dir.as_ref();
        let mut store = Self::new();
        let mut issues = Vec::new();
        for name in ARTIFACT_NAMES {
            let path = dir.join(format!("{name}.json"));
            if !path.exists() {
                continue;
            }
            match Self::load_file(&path) {
                Ok(artifact) => {
                    info!(name, path = %path.display(), "loaded model artifact");
                    store.insert(name, artifact);
                }
                Err(error) => {
                    warn!(name, %error, "skipping unreadable model artifact");
                    issues.push(LoadIssue {
                        name: name.to_string(),
                        error,
                    });
                }
            }
        }
        (store, issues)
    }

    /// Parse a single artifact file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<ModelArtifact> {
        let body = fs::read(path.as_ref())?;
        let artifact = serde_json::from_slice(&body).map_err(|e| {
            ForecastError::ArtifactError(format!(
                "{}: {e}",
                path.as_ref().display()
            ))
        })?;
        Ok(artifact)
    }
}
