//! Layered configuration for chord analysis and emotion training.
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/chordmood/config.toml` (system)
//! 2. `~/.config/chordmood/config.toml` (user)
//! 3. `./chordmood.toml` or an explicit path (local override)
//! 4. Environment variables (`CHORDMOOD_*`, plus `RUST_LOG` for the log level)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! dataset_dir = "~/.local/share/chordmood/datasets"
//! model_dir = "~/.local/share/chordmood/models"
//!
//! [quantizer]
//! bucket_width = 0.2
//! min_velocity = 35
//! min_duration = 0.05
//!
//! [chords]
//! min_distinct_pitches = 2
//!
//! [training]
//! seed = 42
//! test_ratio = 0.15
//! variant = "ngrams_topics"
//! emotions = ["angry", "happy", "romantic", "sad", "warm"]
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use sections::{ChordsConfig, PathsConfig, QuantizerConfig, TelemetryConfig, TrainingConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChordConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub quantizer: QuantizerConfig,
    #[serde(default)]
    pub chords: ChordsConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ChordConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with `config_path` taking the place of `./chordmood.toml`.
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = ChordConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            config = loader::load_from_file(&path, config)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Artifact path for a pipeline variant.
    pub fn model_path(&self, variant: &str) -> PathBuf {
        self.paths.model_dir.join(format!("{variant}.bin"))
    }

    /// Render as a TOML document that [`ChordConfig::load_from`] reads back.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(format!("# chordmood configuration\n\n{body}"))
    }
}
