//! The trained classifier bundle and its on-disk form.
//!
//! Files start with a little-endian `u32` format version, followed by the
//! bincode-encoded [`ClassifierArtifact`].

use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::forest::{argmax, RandomForest};
use crate::record::DatasetRecord;
use crate::tokenizer::{NgramVectorizer, SparseRow};
use crate::topic::TopicModel;
use crate::{Error, Result};

pub const FORMAT_VERSION: u32 = 1;

/// How a sequence and its key are joined into one classifier input line.
///
/// Stored inside the artifact so inference always matches training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFormat {
    pub separator: String,
    pub include_tonic: bool,
}

impl Default for InputFormat {
    fn default() -> Self {
        Self {
            separator: " | ".to_string(),
            include_tonic: false,
        }
    }
}

impl InputFormat {
    pub fn with_tonic() -> Self {
        Self {
            include_tonic: true,
            ..Self::default()
        }
    }

    /// `"sequence | mode"` or `"sequence | mode | tonic"`.
    pub fn format(&self, sequence: &str, mode: &str, tonic: Option<&str>) -> String {
        let mut line = format!("{sequence}{}{mode}", self.separator);
        if self.include_tonic {
            line.push_str(&self.separator);
            line.push_str(tonic.unwrap_or_default());
        }
        line
    }

    pub fn record_line(&self, record: &DatasetRecord) -> String {
        self.format(&record.forte_sequence, &record.mode, record.tonic.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    /// Pipeline variant that produced this artifact.
    pub variant: String,
    pub input: InputFormat,
    /// Class labels, sorted; forest outputs are indexed the same way.
    pub labels: Vec<String>,
    pub vectorizer: NgramVectorizer,
    pub topics: Option<TopicModel>,
    pub forest: RandomForest,
}

impl ClassifierArtifact {
    /// Forest inputs for already formatted lines.
    pub fn features<S: AsRef<str>>(&self, lines: &[S]) -> Vec<SparseRow> {
        let counts = self.vectorizer.transform(lines);
        match &self.topics {
            Some(topics) => topics
                .transform(&counts)
                .into_iter()
                .map(|mixture| mixture.into_iter().zip(0u32..).map(|(v, i)| (i, v)).collect())
                .collect(),
            None => counts,
        }
    }

    /// Probability per label, in `labels` order.
    pub fn predict_proba(&self, line: &str) -> Vec<f64> {
        let features = self.features(&[line]);
        features
            .first()
            .map(|row| self.forest.predict_proba(row))
            .unwrap_or_else(|| vec![0.0; self.labels.len()])
    }

    /// Winning label and the full distribution.
    pub fn predict(&self, line: &str) -> (&str, Vec<f64>) {
        let probabilities = self.predict_proba(line);
        let best = argmax(&probabilities);
        let label = self.labels.get(best).map(String::as_str).unwrap_or_default();
        (label, probabilities)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let partial = path.with_extension("partial");
        {
            let mut writer = BufWriter::new(std::fs::File::create(&partial)?);
            let encode = |e: bincode::Error| Error::ArtifactCorrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            };
            bincode::serialize_into(&mut writer, &FORMAT_VERSION).map_err(encode)?;
            bincode::serialize_into(&mut writer, self).map_err(encode)?;
            writer.flush()?;
        }
        std::fs::rename(&partial, path)?;
        info!(
            path = %path.display(),
            variant = %self.variant,
            labels = self.labels.len(),
            "artifact saved"
        );
        Ok(())
    }

    /// Load an artifact. A missing file means the model was never trained.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ModelNotTrained {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let corrupt = |e: bincode::Error| Error::ArtifactCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let version: u32 = bincode::deserialize_from(&mut reader).map_err(corrupt)?;
        if version != FORMAT_VERSION {
            return Err(Error::ArtifactVersion {
                found: version,
                expected: FORMAT_VERSION,
            });
        }
        let artifact: Self = bincode::deserialize_from(&mut reader).map_err(corrupt)?;
        debug!(path = %path.display(), variant = %artifact.variant, "artifact loaded");
        Ok(artifact)
    }
}
