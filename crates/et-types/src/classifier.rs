//! Classifier artifacts: the training set consumed from the input resource
//! and the tunable classifier state carried through the job lifecycle.
//!
//! The job never holds a live classifier between invocations. What persists
//! is a [`ClassifierState`] blob (feature weights, feature selections, k)
//! serialized to JSON, rebuilt against a freshly loaded [`TrainingSet`]
//! whenever a phase needs the real thing.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{ClassifierError, TuneResult};

/// One labeled observation in the training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub label: String,
    pub features: Vec<f64>,
}

/// The classifier's training data, loaded read-only from the input resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    /// Human-readable feature names, one per dimension.
    pub feature_names: Vec<String>,
    pub samples: Vec<Sample>,
}

impl TrainingSet {
    /// Load and validate a training set from a JSON resource file.
    pub fn load(path: &Path) -> TuneResult<Self> {
        if !path.exists() {
            return Err(ClassifierError::ResourceNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let raw = std::fs::read_to_string(path)?;
        let set: TrainingSet =
            serde_json::from_str(&raw).map_err(|e| ClassifierError::InvalidFormat {
                message: e.to_string(),
            })?;
        set.validate()?;
        Ok(set)
    }

    /// Number of features per sample (the classifier's dimensionality).
    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn validate(&self) -> TuneResult<()> {
        if self.samples.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet.into());
        }
        let expected = self.num_features();
        for (index, sample) in self.samples.iter().enumerate() {
            if sample.features.len() != expected {
                return Err(ClassifierError::InconsistentSample {
                    index,
                    expected,
                    actual: sample.features.len(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// The tunable portion of a nearest-neighbor classifier.
///
/// Weights scale each feature's contribution to the distance metric;
/// selections gate features in or out entirely. This is the unit the
/// optimizer improves and the job persists between invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierState {
    /// Number of neighbors consulted during classification.
    pub k: usize,
    /// Per-feature weights in [0, 1].
    pub weights: Vec<f64>,
    /// Per-feature selection gates.
    pub selections: Vec<bool>,
}

impl ClassifierState {
    /// Fresh state for a newly loaded classifier: uniform weights, every
    /// feature selected.
    pub fn uniform(num_features: usize) -> Self {
        Self {
            k: 1,
            weights: vec![1.0; num_features],
            selections: vec![true; num_features],
        }
    }

    pub fn num_features(&self) -> usize {
        self.weights.len()
    }

    /// Serialize to the JSON blob carried inside the persisted job state.
    pub fn to_blob(&self) -> TuneResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuild from a persisted blob.
    pub fn from_blob(blob: &str) -> TuneResult<Self> {
        let state: ClassifierState =
            serde_json::from_str(blob).map_err(|e| ClassifierError::InvalidState {
                message: e.to_string(),
            })?;
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> TuneResult<()> {
        if self.weights.len() != self.selections.len() {
            return Err(ClassifierError::InvalidState {
                message: format!(
                    "{} weights but {} selections",
                    self.weights.len(),
                    self.selections.len()
                ),
            }
            .into());
        }
        if self.k == 0 {
            return Err(ClassifierError::InvalidState {
                message: "k must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Check this state against a training set's dimensionality.
    pub fn check_dimensions(&self, training: &TrainingSet) -> TuneResult<()> {
        if self.num_features() != training.num_features() {
            return Err(ClassifierError::DimensionMismatch {
                expected: training.num_features(),
                actual: self.num_features(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_training_json() -> &'static str {
        r#"{
            "feature_names": ["area", "aspect", "density"],
            "samples": [
                {"label": "neume", "features": [0.2, 0.5, 0.9]},
                {"label": "clef",  "features": [0.8, 0.1, 0.4]},
                {"label": "neume", "features": [0.3, 0.6, 0.8]}
            ]
        }"#
    }

    #[test]
    fn load_training_set() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_training_json().as_bytes()).unwrap();

        let set = TrainingSet::load(file.path()).unwrap();
        assert_eq!(set.num_features(), 3);
        assert_eq!(set.samples.len(), 3);
        assert_eq!(set.samples[1].label, "clef");
    }

    #[test]
    fn load_missing_resource_fails() {
        let err = TrainingSet::load(Path::new("/nonexistent/training.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn inconsistent_sample_rejected() {
        let set = TrainingSet {
            feature_names: vec!["a".into(), "b".into()],
            samples: vec![Sample {
                label: "x".into(),
                features: vec![1.0],
            }],
        };
        assert!(set.validate().is_err());
    }

    #[test]
    fn empty_training_set_rejected() {
        let set = TrainingSet {
            feature_names: vec!["a".into()],
            samples: vec![],
        };
        assert!(set.validate().is_err());
    }

    #[test]
    fn classifier_state_blob_round_trip() {
        let state = ClassifierState {
            k: 3,
            weights: vec![0.25, 1.0, 0.0],
            selections: vec![true, true, false],
        };

        let blob = state.to_blob().unwrap();
        let back = ClassifierState::from_blob(&blob).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn uniform_state_selects_everything() {
        let state = ClassifierState::uniform(4);
        assert_eq!(state.k, 1);
        assert_eq!(state.weights, vec![1.0; 4]);
        assert!(state.selections.iter().all(|&s| s));
    }

    #[test]
    fn mismatched_state_rejected() {
        let state = ClassifierState {
            k: 1,
            weights: vec![1.0, 1.0],
            selections: vec![true],
        };
        assert!(state.validate().is_err());
    }
}
