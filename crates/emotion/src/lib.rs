//! Emotion classification for chord progressions.
//!
//! Training runs offline over a corpus of labelled MIDI files: each file is
//! reduced to a Forte-class sequence plus its key ([`DatasetBuilder`]), the
//! resulting records are optionally chunked and balanced, and a
//! [`PipelineConfig`] turns them into a [`ClassifierArtifact`] (n-gram counts,
//! an optional LDA topic projection, and a random forest). At runtime a
//! [`PredictionService`] loads one artifact and answers predictions; it also
//! plugs into [`harmony::ProgressionAnalyzer`] as an emotion backend.

pub mod artifact;
pub mod balance;
pub mod builder;
pub mod chunk;
pub mod forest;
pub mod job;
pub mod labels;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod service;
pub mod split;
pub mod tokenizer;
pub mod topic;

pub use artifact::{ClassifierArtifact, InputFormat, FORMAT_VERSION};
pub use balance::balance;
pub use builder::{analysis_params, parse_file_name, BuildOutcome, DatasetBuilder, XmidiName};
pub use chunk::{window_for_average, ChunkMode, Chunker};
pub use forest::{ClassWeight, ForestParams, MaxFeatures, RandomForest};
pub use job::{spawn_training, TrainingJob, TrainingOutcome};
pub use labels::{describe, LabelInfo};
pub use pipeline::{PipelineConfig, Variant};
pub use record::{read_csv, write_csv, DatasetRecord};
pub use report::{ClassMetrics, ClassificationReport};
pub use service::{Evaluation, Prediction, PredictionService};
pub use split::{stratified_split, Split};
pub use tokenizer::{NgramVectorizer, SparseRow, VectorizerParams};
pub use topic::{TopicModel, TopicParams};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("empty Forte-class sequence")]
    EmptySequence,

    #[error("model was trained with a tonic field; a tonic is required")]
    MissingTonic,

    #[error("model not trained: no artifact at {}", path.display())]
    ModelNotTrained { path: PathBuf },

    #[error("artifact {} is corrupt: {message}", path.display())]
    ArtifactCorrupt { path: PathBuf, message: String },

    #[error("artifact format version {found}, expected {expected}")]
    ArtifactVersion { found: u32, expected: u32 },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("training cancelled")]
    Cancelled,

    #[error("not enough data: {0}")]
    NotEnoughData(String),

    #[error("unknown pipeline variant '{0}'")]
    UnknownVariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
