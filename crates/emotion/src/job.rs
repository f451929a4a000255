//! Offline training runs.
//!
//! A run is CPU-bound and can take minutes. It checks its
//! [`CancellationToken`] between stages (chunk, balance, split, vectorize,
//! topics, forest, save); an in-flight stage always finishes first.

use std::path::PathBuf;

use anyhow::Context;
use chordconf::ChordConfig;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::pipeline::{checkpoint, PipelineConfig};
use crate::record::DatasetRecord;
use crate::service::{Evaluation, PredictionService};
use crate::split::stratified_split;
use crate::Result;

#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub config: PipelineConfig,
    pub artifact_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub variant: String,
    pub artifact_path: PathBuf,
    pub train_samples: usize,
    pub test_samples: usize,
    pub evaluation: Evaluation,
}

impl TrainingJob {
    pub fn new(config: PipelineConfig, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            artifact_path: artifact_path.into(),
        }
    }

    /// Job for `[training].variant`, saving to that variant's model path.
    pub fn from_config(config: &ChordConfig) -> Result<Self> {
        let pipeline = PipelineConfig::from_training(&config.training)?;
        let path = config.model_path(&pipeline.variant);
        Ok(Self::new(pipeline, path))
    }

    /// Prepare, split, fit, save and evaluate on the held-out part.
    pub fn run(
        &self,
        records: &[DatasetRecord],
        cancel: &CancellationToken,
    ) -> Result<TrainingOutcome> {
        info!(
            variant = %self.config.variant,
            records = records.len(),
            path = %self.artifact_path.display(),
            "training started"
        );

        let prepared = self.config.prepare(records, cancel)?;

        checkpoint(cancel, "split")?;
        let split = stratified_split(&prepared, self.config.test_ratio, self.config.seed)?;

        let artifact = self.config.fit(&split.train, cancel)?;

        checkpoint(cancel, "save")?;
        artifact.save(&self.artifact_path)?;

        let service = PredictionService::from_artifact(artifact);
        let evaluation = service.evaluate(&split.test)?;

        info!(
            variant = %self.config.variant,
            accuracy = format!("{:.2}%", evaluation.accuracy * 100.0),
            "training finished"
        );
        Ok(TrainingOutcome {
            variant: self.config.variant.clone(),
            artifact_path: self.artifact_path.clone(),
            train_samples: split.train.len(),
            test_samples: split.test.len(),
            evaluation,
        })
    }
}

/// Run a job on the blocking pool so async callers are not stalled.
pub async fn spawn_training(
    job: TrainingJob,
    records: Vec<DatasetRecord>,
    cancel: CancellationToken,
) -> anyhow::Result<TrainingOutcome> {
    let variant = job.config.variant.clone();
    let outcome = tokio::task::spawn_blocking(move || job.run(&records, &cancel))
        .await
        .context("training task panicked")?
        .with_context(|| format!("training variant '{variant}' failed"))?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Variant;
    use crate::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn job_from_config_uses_variant_path() {
        let mut config = ChordConfig::default();
        config.paths.model_dir = PathBuf::from("/models");
        config.training.variant = "chunked".into();
        let job = TrainingJob::from_config(&config).unwrap();
        assert_eq!(job.config.variant, Variant::Chunked.name());
        assert_eq!(job.artifact_path, PathBuf::from("/models/chunked.bin"));
    }

    #[test]
    fn unknown_variant_in_config() {
        let mut config = ChordConfig::default();
        config.training.variant = "knn".into();
        assert!(matches!(TrainingJob::from_config(&config), Err(Error::UnknownVariant(_))));
    }

    #[tokio::test]
    async fn cancelled_job_reports_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let job = TrainingJob::new(
            PipelineConfig::for_variant(Variant::Ngrams, &Default::default()),
            dir.path().join("ngrams.bin"),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = spawn_training(job, Vec::new(), cancel).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Cancelled)));
        assert!(!dir.path().join("ngrams.bin").exists());
    }
}
