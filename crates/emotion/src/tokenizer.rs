//! Word n-gram counts over Forte-class token streams.
//!
//! Input lines look like `"3-11B,3-11A,4-27B | minor | A"`. Tokens are split
//! on commas, whitespace and `|` and combined into n-grams that are joined
//! with a single space. Case is kept: `C` and `c` are different terms.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sparse feature vector: `(column, value)` pairs sorted by column.
pub type SparseRow = Vec<(u32, f64)>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorizerParams {
    /// Shortest and longest n-gram, inclusive.
    pub ngram_range: (usize, usize),
    /// Vocabulary cap, most frequent terms first.
    pub max_features: usize,
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            ngram_range: (1, 4),
            max_features: 12_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgramVectorizer {
    params: VectorizerParams,
    vocabulary: BTreeMap<String, u32>,
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| c == ',' || c == '|' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect()
}

impl NgramVectorizer {
    fn ngrams(&self, text: &str) -> Vec<String> {
        let words = words(text);
        let (min_n, max_n) = self.params.ngram_range;
        let mut grams = Vec::new();
        for n in min_n.max(1)..=max_n {
            if n > words.len() {
                break;
            }
            grams.extend(words.windows(n).map(|w| w.join(" ")));
        }
        grams
    }

    /// Learn the vocabulary: the `max_features` most frequent n-grams over
    /// the whole corpus, ties broken alphabetically. Columns are assigned
    /// in alphabetical term order.
    pub fn fit<S: AsRef<str>>(params: VectorizerParams, documents: &[S]) -> Self {
        let mut this = Self {
            params,
            vocabulary: BTreeMap::new(),
        };

        let mut counts: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            for gram in this.ngrams(doc.as_ref()) {
                *counts.entry(gram).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(params.max_features);

        let kept: BTreeSet<String> = ranked.into_iter().map(|(term, _)| term).collect();
        this.vocabulary = kept.into_iter().zip(0u32..).collect();

        debug!(terms = this.vocabulary.len(), "n-gram vocabulary fitted");
        this
    }

    pub fn transform_one(&self, text: &str) -> SparseRow {
        let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
        for gram in self.ngrams(text) {
            if let Some(&column) = self.vocabulary.get(&gram) {
                *counts.entry(column).or_default() += 1.0;
            }
        }
        counts.into_iter().collect()
    }

    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Vec<SparseRow> {
        documents.iter().map(|d| self.transform_one(d.as_ref())).collect()
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, u32> {
        &self.vocabulary
    }
}
