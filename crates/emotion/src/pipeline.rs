//! One training pipeline, parameterized per variant.
//!
//! Every variant runs the same stages: optional chunking, optional
//! balancing, n-gram counts, optional LDA, random forest. Only the knobs
//! differ.

use std::collections::BTreeSet;
use std::str::FromStr;

use chordconf::TrainingConfig;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::artifact::{ClassifierArtifact, InputFormat};
use crate::balance::balance;
use crate::chunk::{ChunkMode, Chunker};
use crate::forest::{ClassWeight, ForestParams, MaxFeatures, RandomForest};
use crate::record::DatasetRecord;
use crate::tokenizer::{NgramVectorizer, SparseRow, VectorizerParams};
use crate::topic::{TopicModel, TopicParams};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Counts straight into the forest, inverse-frequency class weights.
    Ngrams,
    /// Counts, 30-topic LDA, forest.
    NgramsTopics,
    /// Average-window chunking (remainders kept), counts, forest.
    Chunked,
    /// Strict chunking, undersampling, 12-topic LDA, forest.
    BalancedChunked,
    /// Whole sequences with the tonic token, 30-topic LDA, forest.
    Full,
}

impl Variant {
    pub const ALL: [Variant; 5] = [
        Variant::Ngrams,
        Variant::NgramsTopics,
        Variant::Chunked,
        Variant::BalancedChunked,
        Variant::Full,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Ngrams => "ngrams",
            Variant::NgramsTopics => "ngrams_topics",
            Variant::Chunked => "chunked",
            Variant::BalancedChunked => "balanced_chunked",
            Variant::Full => "full",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Variant::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| Error::UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub variant: String,
    pub chunking: Option<ChunkMode>,
    pub balance: bool,
    pub vectorizer: VectorizerParams,
    pub topics: Option<TopicParams>,
    pub forest: ForestParams,
    /// Field separator for classifier lines. Whether the tonic is appended
    /// follows the training records; `include_tonic` here only makes the
    /// tonic mandatory.
    pub input: InputFormat,
    pub test_ratio: f64,
    pub seed: u64,
}

impl PipelineConfig {
    pub fn for_variant(variant: Variant, training: &TrainingConfig) -> Self {
        let seed = training.seed;
        let wide = VectorizerParams {
            ngram_range: (1, 5),
            max_features: 24_000,
        };
        let narrow = VectorizerParams {
            ngram_range: (1, 4),
            max_features: 12_000,
        };
        let lda = |n_topics| TopicParams {
            n_topics,
            seed,
            ..TopicParams::default()
        };
        let deep = ForestParams {
            n_trees: 1200,
            max_depth: Some(25),
            min_samples_split: 4,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Log2,
            class_weight: ClassWeight::Balanced,
            seed,
        };

        let (chunking, balance, vectorizer, topics, forest, input) = match variant {
            Variant::Ngrams => (
                None,
                false,
                narrow,
                None,
                ForestParams {
                    seed,
                    ..ForestParams::default()
                },
                InputFormat::default(),
            ),
            Variant::NgramsTopics => {
                (None, false, wide, Some(lda(30)), deep, InputFormat::default())
            }
            Variant::Chunked => (
                Some(ChunkMode::KeepRemainder),
                false,
                narrow,
                None,
                ForestParams {
                    n_trees: 1000,
                    max_depth: Some(30),
                    min_samples_split: 4,
                    min_samples_leaf: 2,
                    max_features: MaxFeatures::Sqrt,
                    class_weight: ClassWeight::Balanced,
                    seed,
                },
                InputFormat::default(),
            ),
            Variant::BalancedChunked => (
                Some(ChunkMode::Strict),
                true,
                narrow,
                Some(lda(12)),
                ForestParams {
                    n_trees: 800,
                    max_depth: Some(30),
                    min_samples_split: 4,
                    min_samples_leaf: 2,
                    max_features: MaxFeatures::Sqrt,
                    class_weight: ClassWeight::Uniform,
                    seed,
                },
                InputFormat::default(),
            ),
            Variant::Full => (None, false, wide, Some(lda(30)), deep, InputFormat::with_tonic()),
        };

        Self {
            variant: variant.name().to_string(),
            chunking,
            balance,
            vectorizer,
            topics,
            forest,
            input,
            test_ratio: training.test_ratio,
            seed,
        }
    }

    /// Config for the variant named in `[training]`.
    pub fn from_training(training: &TrainingConfig) -> Result<Self> {
        let variant: Variant = training.variant.parse()?;
        Ok(Self::for_variant(variant, training))
    }

    /// Chunk and balance as configured.
    pub fn prepare(
        &self,
        records: &[DatasetRecord],
        cancel: &CancellationToken,
    ) -> Result<Vec<DatasetRecord>> {
        checkpoint(cancel, "chunk")?;
        let mut prepared = match self.chunking {
            Some(mode) => Chunker::from_average(records, mode)?.chunk(records),
            None => records.to_vec(),
        };

        checkpoint(cancel, "balance")?;
        if self.balance {
            prepared = balance(&prepared, self.seed)?;
        }
        Ok(prepared)
    }

    /// Line format stored with the artifact: three fields when every
    /// record carries a tonic, two when none does.
    pub fn input_for(&self, train: &[DatasetRecord]) -> Result<InputFormat> {
        let keyed = train.iter().filter(|r| r.tonic.is_some()).count();
        let include_tonic = match keyed {
            0 => false,
            n if n == train.len() => true,
            n => {
                return Err(Error::Dataset(format!(
                    "{n} of {} records have a tonic; fill it for all or none",
                    train.len()
                )))
            }
        };
        if self.input.include_tonic && !include_tonic {
            return Err(Error::Dataset(format!(
                "variant '{}' needs a tonic column",
                self.variant
            )));
        }
        Ok(InputFormat {
            include_tonic,
            ..self.input.clone()
        })
    }

    /// Vectorize, reduce and fit the forest on training records.
    pub fn fit(
        &self,
        train: &[DatasetRecord],
        cancel: &CancellationToken,
    ) -> Result<ClassifierArtifact> {
        let labels: Vec<String> = train
            .iter()
            .map(|r| r.emotion.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if labels.len() < 2 {
            return Err(Error::NotEnoughData(format!(
                "need at least two emotion labels, found {}",
                labels.len()
            )));
        }
        let targets: Vec<usize> = train
            .iter()
            .map(|r| labels.binary_search(&r.emotion).unwrap_or_default())
            .collect();
        let input = self.input_for(train)?;
        let lines: Vec<String> = train.iter().map(|r| input.record_line(r)).collect();

        checkpoint(cancel, "vectorize")?;
        let vectorizer = NgramVectorizer::fit(self.vectorizer, &lines);
        let counts = vectorizer.transform(&lines);
        if vectorizer.n_features() == 0 {
            return Err(Error::NotEnoughData("empty n-gram vocabulary".into()));
        }

        checkpoint(cancel, "topics")?;
        let (topics, features, n_features) = match self.topics {
            Some(params) => {
                let model = TopicModel::fit(params, &counts, vectorizer.n_features());
                let mixtures: Vec<SparseRow> = model
                    .transform(&counts)
                    .into_iter()
                    .map(|m| m.into_iter().zip(0u32..).map(|(v, i)| (i, v)).collect())
                    .collect();
                let n = model.n_topics();
                (Some(model), mixtures, n)
            }
            None => (None, counts, vectorizer.n_features()),
        };

        checkpoint(cancel, "forest")?;
        let forest = RandomForest::fit(self.forest, &features, &targets, labels.len(), n_features);

        info!(
            variant = %self.variant,
            samples = train.len(),
            labels = labels.len(),
            features = n_features,
            tonic = input.include_tonic,
            "pipeline fitted"
        );
        Ok(ClassifierArtifact {
            variant: self.variant.clone(),
            input,
            labels,
            vectorizer,
            topics,
            forest,
        })
    }
}

pub(crate) fn checkpoint(cancel: &CancellationToken, stage: &str) -> Result<()> {
    if cancel.is_cancelled() {
        info!(stage, "training cancelled");
        return Err(Error::Cancelled);
    }
    Ok(())
}
