//! Serving predictions from one trained artifact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use chordconf::ChordConfig;
use harmony::{EmotionClassifier, EmotionReading, KeyEstimate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::ClassifierArtifact;
use crate::labels::describe;
use crate::record::DatasetRecord;
use crate::report::ClassificationReport;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub probabilities: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub n_samples: usize,
}

/// Predictions from a single artifact, loaded at most once.
///
/// Inference only reads the artifact, so one service can be shared across
/// threads. Only the first load is serialized.
#[derive(Debug)]
pub struct PredictionService {
    path: PathBuf,
    artifact: OnceLock<ClassifierArtifact>,
    loading: Mutex<()>,
    loads: AtomicUsize,
}

impl PredictionService {
    /// Load the artifact now.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let service = Self::lazy(path)?;
        service.artifact()?;
        Ok(service)
    }

    /// Check the artifact exists; deserialize it on first use.
    pub fn lazy(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::ModelNotTrained { path });
        }
        Ok(Self {
            path,
            artifact: OnceLock::new(),
            loading: Mutex::new(()),
            loads: AtomicUsize::new(0),
        })
    }

    /// Serve the artifact for the configured default variant.
    pub fn from_config(config: &ChordConfig) -> Result<Self> {
        Self::open(config.model_path(&config.training.variant))
    }

    /// Wrap an artifact that is already in memory.
    pub fn from_artifact(artifact: ClassifierArtifact) -> Self {
        Self {
            path: PathBuf::new(),
            artifact: OnceLock::from(artifact),
            loading: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.artifact.get().is_some()
    }

    /// The artifact, deserialized on the first call. Concurrent first
    /// callers wait for a single load.
    pub fn artifact(&self) -> Result<&ClassifierArtifact> {
        if let Some(artifact) = self.artifact.get() {
            return Ok(artifact);
        }
        // A panicked load left nothing behind, so a poisoned lock is safe to reuse.
        let _guard = self.loading.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(artifact) = self.artifact.get() {
            return Ok(artifact);
        }

        let loaded = ClassifierArtifact::load(&self.path)?;
        let loads = self.loads.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            path = %self.path.display(),
            variant = %loaded.variant,
            loads,
            "classifier loaded"
        );
        Ok(self.artifact.get_or_init(|| loaded))
    }

    /// Predict the emotion of a comma-joined Forte-class sequence.
    ///
    /// The line handed to the classifier is built with the artifact's own
    /// input format. `tonic` is ignored by artifacts trained without it and
    /// required by the others.
    pub fn predict(&self, sequence: &str, mode: &str, tonic: Option<&str>) -> Result<Prediction> {
        if sequence.split(',').all(|t| t.trim().is_empty()) {
            return Err(Error::EmptySequence);
        }
        let artifact = self.artifact()?;
        let tonic = tonic.map(str::trim).filter(|t| !t.is_empty());
        if artifact.input.include_tonic && tonic.is_none() {
            return Err(Error::MissingTonic);
        }
        let line = artifact.input.format(sequence.trim(), mode.trim(), tonic);
        let (label, probabilities) = artifact.predict(&line);
        debug!(label, "prediction");

        Ok(Prediction {
            label: label.to_string(),
            probabilities: artifact.labels.iter().cloned().zip(probabilities).collect(),
        })
    }

    /// Accuracy and per-class metrics over held-out records. Records with
    /// an empty sequence are skipped.
    pub fn evaluate(&self, records: &[DatasetRecord]) -> Result<Evaluation> {
        let artifact = self.artifact()?;
        let outcomes: Vec<(String, String)> = records
            .par_iter()
            .filter(|r| !r.tokens().is_empty())
            .map(|r| {
                let (label, _) = artifact.predict(&artifact.input.record_line(r));
                (r.emotion.clone(), label.to_string())
            })
            .collect();

        let skipped = records.len() - outcomes.len();
        if skipped > 0 {
            warn!(skipped, "evaluation skipped empty sequences");
        }
        if outcomes.is_empty() {
            return Err(Error::NotEnoughData("no records to evaluate".into()));
        }

        let (y_true, y_pred): (Vec<String>, Vec<String>) = outcomes.into_iter().unzip();
        let report = ClassificationReport::new(&y_true, &y_pred);
        info!(
            samples = y_true.len(),
            accuracy = format!("{:.2}%", report.accuracy * 100.0),
            "evaluation finished"
        );
        Ok(Evaluation {
            accuracy: report.accuracy,
            n_samples: y_true.len(),
            report,
        })
    }
}

impl EmotionClassifier for PredictionService {
    fn classify(
        &self,
        forte_sequence: &[String],
        key: &KeyEstimate,
    ) -> anyhow::Result<EmotionReading> {
        let prediction = self.predict(
            &forte_sequence.join(","),
            &key.mode.to_string(),
            Some(key.tonic.as_str()),
        )?;
        let info = describe(&prediction.label);
        Ok(EmotionReading {
            content: info.display,
            probabilities: prediction.probabilities,
            description: info.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineConfig, Variant};
    use chordconf::TrainingConfig;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Barrier};
    use tokio_util::sync::CancellationToken;

    fn trained(path: &Path, keyed: bool) {
        let records: Vec<DatasetRecord> = [
            ("3-11B,4-20,2-5", "major", "happy", "C"),
            ("3-11B,4-20,3-11B", "major", "happy", "C"),
            ("3-11A,4-26,2-3", "minor", "sad", "A"),
            ("3-11A,4-26,3-11A", "minor", "sad", "A"),
        ]
        .iter()
        .map(|(sequence, mode, emotion, tonic)| {
            let tokens: Vec<String> = sequence.split(',').map(String::from).collect();
            let record = DatasetRecord::new(&tokens, *mode, *emotion);
            if keyed {
                record.with_tonic(*tonic)
            } else {
                record
            }
        })
        .collect();
        let mut config = PipelineConfig::for_variant(Variant::Ngrams, &TrainingConfig::default());
        config.forest.n_trees = 5;
        let artifact = config.fit(&records, &CancellationToken::new()).unwrap();
        artifact.save(path).unwrap();
    }

    #[test]
    fn concurrent_first_use_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ngrams.bin");
        trained(&path, false);

        let service = Arc::new(PredictionService::lazy(&path).unwrap());
        let start = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let start = Arc::clone(&start);
                std::thread::spawn(move || {
                    start.wait();
                    service.predict("3-11B,4-20,2-5", "major", None).unwrap().label
                })
            })
            .collect();

        let labels: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(labels.iter().all(|l| l == &labels[0]));
        assert_eq!(service.loads.load(Ordering::Relaxed), 1);

        service.artifact().unwrap();
        assert_eq!(service.loads.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn keyed_model_needs_a_tonic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyed.bin");
        trained(&path, true);

        let service = PredictionService::open(&path).unwrap();
        assert!(matches!(
            service.predict("3-11A,4-26,2-3", "minor", None),
            Err(Error::MissingTonic)
        ));
        assert!(matches!(
            service.predict("3-11A,4-26,2-3", "minor", Some(" ")),
            Err(Error::MissingTonic)
        ));
        assert!(service.predict("3-11A,4-26,2-3", "minor", Some("A")).is_ok());
    }

    #[test]
    fn missing_artifact_fails_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ngrams.bin");
        assert!(matches!(PredictionService::open(&path), Err(Error::ModelNotTrained { .. })));
        assert!(matches!(PredictionService::lazy(&path), Err(Error::ModelNotTrained { .. })));
    }

    #[test]
    fn config_points_at_variant_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ChordConfig::default();
        config.paths.model_dir = dir.path().to_path_buf();
        let err = PredictionService::from_config(&config).unwrap_err();
        match err {
            Error::ModelNotTrained { path } => {
                assert_eq!(path, dir.path().join("ngrams_topics.bin"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
