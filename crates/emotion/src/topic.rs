//! Latent Dirichlet allocation fitted with batch variational Bayes.
//!
//! Projects sparse n-gram counts onto a small number of topics. The fitted
//! topic-word parameters are all that is kept; document-topic mixtures are
//! recomputed for every input.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tokenizer::SparseRow;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopicParams {
    pub n_topics: usize,
    /// Full passes over the corpus.
    pub max_iter: usize,
    /// Per-document E-step iterations.
    pub max_doc_iter: usize,
    /// Stop a document's E-step once the mean absolute change in its topic
    /// weights falls below this.
    pub mean_change_tol: f64,
    pub seed: u64,
}

impl Default for TopicParams {
    fn default() -> Self {
        Self {
            n_topics: 30,
            max_iter: 40,
            max_doc_iter: 100,
            mean_change_tol: 1e-3,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicModel {
    params: TopicParams,
    n_features: usize,
    doc_topic_prior: f64,
    topic_word_prior: f64,
    /// Topic-word variational parameters, `n_topics` rows of `n_features`.
    components: Vec<Vec<f64>>,
}

/// Digamma function via recurrence up to x >= 6, then the asymptotic series.
pub(crate) fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    let series = 1.0 / 12.0
        - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 / 132.0)));
    result + x.ln() - 0.5 * inv - inv2 * series
}

/// `exp(E[log X])` for X ~ Dirichlet(alpha).
fn dirichlet_expectation(alpha: &[f64]) -> Vec<f64> {
    let total = digamma(alpha.iter().sum());
    alpha.iter().map(|&a| (digamma(a) - total).exp()).collect()
}

struct DocUpdate {
    gamma: Vec<f64>,
    /// Per-topic sufficient statistics for the document's columns.
    stats: Vec<(u32, Vec<f64>)>,
}

impl TopicModel {
    pub fn n_topics(&self) -> usize {
        self.params.n_topics
    }

    /// Fit on count rows whose columns are below `n_features`.
    pub fn fit(params: TopicParams, rows: &[SparseRow], n_features: usize) -> Self {
        let k = params.n_topics.max(1);
        let prior = 1.0 / k as f64;
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let components = (0..k)
            .map(|_| (0..n_features).map(|_| rng.random_range(0.9..1.1)).collect())
            .collect();

        let mut model = Self {
            params: TopicParams { n_topics: k, ..params },
            n_features,
            doc_topic_prior: prior,
            topic_word_prior: prior,
            components,
        };

        for iteration in 0..params.max_iter {
            let exp_beta = model.exp_topic_word();
            let updates: Vec<DocUpdate> = rows
                .par_iter()
                .map(|row| model.e_step(row, &exp_beta, true))
                .collect();

            let mut stats = vec![vec![0.0; n_features]; k];
            for update in &updates {
                for (column, per_topic) in &update.stats {
                    for (topic, value) in per_topic.iter().enumerate() {
                        stats[topic][*column as usize] += value;
                    }
                }
            }
            for topic in 0..k {
                for column in 0..n_features {
                    model.components[topic][column] =
                        model.topic_word_prior + stats[topic][column] * exp_beta[topic][column];
                }
            }
            debug!(iteration, "topic model pass");
        }
        model
    }

    fn exp_topic_word(&self) -> Vec<Vec<f64>> {
        self.components.iter().map(|row| dirichlet_expectation(row)).collect()
    }

    fn e_step(&self, row: &SparseRow, exp_beta: &[Vec<f64>], collect_stats: bool) -> DocUpdate {
        let k = self.components.len();
        let row: Vec<(u32, f64)> = row
            .iter()
            .copied()
            .filter(|(column, _)| (*column as usize) < self.n_features)
            .collect();
        let mut gamma = vec![1.0; k];
        let mut exp_theta = dirichlet_expectation(&gamma);

        let phi_norm = |exp_theta: &[f64]| -> Vec<f64> {
            row.iter()
                .map(|(column, _)| {
                    let column = *column as usize;
                    (0..k).map(|t| exp_theta[t] * exp_beta[t][column]).sum::<f64>() + 1e-100
                })
                .collect()
        };

        for _ in 0..self.params.max_doc_iter {
            let norm = phi_norm(&exp_theta);
            let previous = gamma.clone();
            for t in 0..k {
                let weighted: f64 = row
                    .iter()
                    .zip(&norm)
                    .map(|((column, count), n)| count * exp_beta[t][*column as usize] / n)
                    .sum();
                gamma[t] = self.doc_topic_prior + exp_theta[t] * weighted;
            }
            exp_theta = dirichlet_expectation(&gamma);
            let change = gamma
                .iter()
                .zip(&previous)
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>()
                / k as f64;
            if change < self.params.mean_change_tol {
                break;
            }
        }

        let stats = if collect_stats {
            let norm = phi_norm(&exp_theta);
            row.iter()
                .zip(&norm)
                .map(|((column, count), n)| {
                    (*column, exp_theta.iter().map(|theta| theta * count / n).collect())
                })
                .collect()
        } else {
            Vec::new()
        };

        DocUpdate { gamma, stats }
    }

    /// Normalized topic mixture for each row.
    pub fn transform(&self, rows: &[SparseRow]) -> Vec<Vec<f64>> {
        let exp_beta = self.exp_topic_word();
        rows.par_iter()
            .map(|row| {
                let gamma = self.e_step(row, &exp_beta, false).gamma;
                let total: f64 = gamma.iter().sum();
                gamma.iter().map(|g| g / total).collect()
            })
            .collect()
    }
}
