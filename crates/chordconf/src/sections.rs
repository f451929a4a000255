//! Configuration sections, one struct per TOML table.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where datasets and trained model artifacts live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw and derived dataset CSVs.
    /// Default: ~/.local/share/chordmood/datasets
    #[serde(default = "PathsConfig::default_dataset_dir")]
    pub dataset_dir: PathBuf,

    /// One artifact file per pipeline variant.
    /// Default: ~/.local/share/chordmood/models
    #[serde(default = "PathsConfig::default_model_dir")]
    pub model_dir: PathBuf,
}

impl PathsConfig {
    fn data_root() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/chordmood"))
            .unwrap_or_else(|| PathBuf::from(".local/share/chordmood"))
    }

    fn default_dataset_dir() -> PathBuf {
        Self::data_root().join("datasets")
    }

    fn default_model_dir() -> PathBuf {
        Self::data_root().join("models")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset_dir: Self::default_dataset_dir(),
            model_dir: Self::default_model_dir(),
        }
    }
}

/// Note quantization grid and noise thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizerConfig {
    /// Bucket width in seconds. Default: 0.2
    #[serde(default = "QuantizerConfig::default_bucket_width")]
    pub bucket_width: f64,

    /// Notes quieter than this are dropped. Default: 35
    #[serde(default = "QuantizerConfig::default_min_velocity")]
    pub min_velocity: u8,

    /// Notes shorter than this (seconds) are dropped. Default: 0.05
    #[serde(default = "QuantizerConfig::default_min_duration")]
    pub min_duration: f64,
}

impl QuantizerConfig {
    fn default_bucket_width() -> f64 {
        0.2
    }

    fn default_min_velocity() -> u8 {
        35
    }

    fn default_min_duration() -> f64 {
        0.05
    }
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            bucket_width: Self::default_bucket_width(),
            min_velocity: Self::default_min_velocity(),
            min_duration: Self::default_min_duration(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordsConfig {
    /// Distinct pitches a bucket needs to count as a chord. Default: 2
    #[serde(default = "ChordsConfig::default_min_distinct_pitches")]
    pub min_distinct_pitches: usize,
}

impl ChordsConfig {
    fn default_min_distinct_pitches() -> usize {
        2
    }
}

impl Default for ChordsConfig {
    fn default() -> Self {
        Self {
            min_distinct_pitches: Self::default_min_distinct_pitches(),
        }
    }
}

/// Offline dataset and training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Seed for sampling, splitting and the forest. Default: 42
    #[serde(default = "TrainingConfig::default_seed")]
    pub seed: u64,

    /// Held-out fraction. Default: 0.15
    #[serde(default = "TrainingConfig::default_test_ratio")]
    pub test_ratio: f64,

    /// Pipeline variant served and trained by default.
    /// Default: "ngrams_topics"
    #[serde(default = "TrainingConfig::default_variant")]
    pub variant: String,

    /// Emotion labels kept when building a dataset.
    #[serde(default = "TrainingConfig::default_emotions")]
    pub emotions: Vec<String>,
}

impl TrainingConfig {
    fn default_seed() -> u64 {
        42
    }

    fn default_test_ratio() -> f64 {
        0.15
    }

    fn default_variant() -> String {
        "ngrams_topics".to_string()
    }

    fn default_emotions() -> Vec<String> {
        ["angry", "happy", "romantic", "sad", "warm"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: Self::default_seed(),
            test_ratio: Self::default_test_ratio(),
            variant: Self::default_variant(),
            emotions: Self::default_emotions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive for the host's tracing subscriber. Default: "info"
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
