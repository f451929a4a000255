//! Random forest of CART trees with Gini impurity.
//!
//! Features are sparse rows; absent columns read as zero. Trees are grown
//! in parallel, each from its own seed, so a forest is reproducible for a
//! given [`ForestParams::seed`] regardless of thread scheduling.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::tokenizer::SparseRow;

/// Candidate features tried at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
}

impl MaxFeatures {
    fn count(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => n.log2() as usize,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    Uniform,
    /// Inverse class frequency: `n_samples / (n_classes * count)`.
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::Balanced,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: u32,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

fn feature_value(row: &SparseRow, feature: u32) -> f64 {
    row.binary_search_by_key(&feature, |(column, _)| *column)
        .map(|i| row[i].1)
        .unwrap_or(0.0)
}

fn gini(weights: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - weights.iter().map(|w| (w / total).powi(2)).sum::<f64>()
}

struct Grower<'a> {
    rows: &'a [SparseRow],
    labels: &'a [usize],
    sample_weight: &'a [f64],
    n_classes: usize,
    n_features: usize,
    params: &'a ForestParams,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: u32,
    threshold: f64,
    score: f64,
}

impl Grower<'_> {
    fn class_weights(&self, samples: &[usize]) -> Vec<f64> {
        let mut weights = vec![0.0; self.n_classes];
        for &s in samples {
            weights[self.labels[s]] += self.sample_weight[s];
        }
        weights
    }

    fn leaf(&mut self, weights: Vec<f64>) -> usize {
        let total: f64 = weights.iter().sum();
        let distribution = if total > 0.0 {
            weights.iter().map(|w| w / total).collect()
        } else {
            vec![1.0 / self.n_classes as f64; self.n_classes]
        };
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let weights = self.class_weights(&samples);
        let total: f64 = weights.iter().sum();
        let impurity = gini(&weights, total);

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || samples.len() < self.params.min_samples_split
            || samples.len() < 2 * self.params.min_samples_leaf
            || impurity <= 0.0
        {
            return self.leaf(weights);
        }

        let Some(best) = self.best_split(&samples, &weights, impurity) else {
            return self.leaf(weights);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| feature_value(&self.rows[s], best.feature) <= best.threshold);

        let index = self.nodes.len();
        self.nodes.push(Node::Leaf { distribution: Vec::new() });
        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[index] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        index
    }

    fn best_split(
        &mut self,
        samples: &[usize],
        node_weights: &[f64],
        impurity: f64,
    ) -> Option<BestSplit> {
        let total: f64 = node_weights.iter().sum();
        let try_count = self.params.max_features.count(self.n_features);
        let candidates = index::sample(&mut self.rng, self.n_features, try_count);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;

        for feature in candidates.iter() {
            let feature = feature as u32;
            let mut values: Vec<(f64, usize)> = samples
                .iter()
                .map(|&s| (feature_value(&self.rows[s], feature), s))
                .collect();
            values.sort_by(|a, b| a.0.total_cmp(&b.0));
            if values.first().map(|v| v.0) == values.last().map(|v| v.0) {
                continue;
            }

            let mut left = vec![0.0; self.n_classes];
            let mut left_total = 0.0;
            for i in 0..values.len() - 1 {
                let (value, s) = values[i];
                let w = self.sample_weight[s];
                left[self.labels[s]] += w;
                left_total += w;

                let next = values[i + 1].0;
                let n_left = i + 1;
                if value == next || n_left < min_leaf || values.len() - n_left < min_leaf {
                    continue;
                }

                let right: Vec<f64> = node_weights.iter().zip(&left).map(|(n, l)| n - l).collect();
                let right_total = total - left_total;
                let child = (left_total * gini(&left, left_total)
                    + right_total * gini(&right, right_total))
                    / total;
                let score = impurity - child;
                if score > best.as_ref().map_or(1e-12, |b| b.score) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (value + next) / 2.0,
                        score,
                    });
                }
            }
        }
        best
    }
}

impl Tree {
    fn predict(&self, row: &SparseRow) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if feature_value(row, *feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_classes: usize,
    trees: Vec<Tree>,
}

impl RandomForest {
    /// Fit on rows labelled with class indices below `n_classes`.
    pub fn fit(
        params: ForestParams,
        rows: &[SparseRow],
        labels: &[usize],
        n_classes: usize,
        n_features: usize,
    ) -> Self {
        let n_classes = n_classes.max(1);
        let sample_weight = match params.class_weight {
            ClassWeight::Uniform => vec![1.0; rows.len()],
            ClassWeight::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &label in labels {
                    counts[label] += 1;
                }
                labels
                    .iter()
                    .map(|&label| rows.len() as f64 / (n_classes as f64 * counts[label] as f64))
                    .collect()
            }
        };

        let trees: Vec<Tree> = (0..params.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> =
                    (0..rows.len()).map(|_| rng.random_range(0..rows.len())).collect();
                let mut grower = Grower {
                    rows,
                    labels,
                    sample_weight: &sample_weight,
                    n_classes,
                    n_features: n_features.max(1),
                    params: &params,
                    rng,
                    nodes: Vec::new(),
                };
                if rows.is_empty() {
                    grower.leaf(vec![0.0; n_classes]);
                } else {
                    grower.grow(bootstrap, 0);
                }
                Tree { nodes: grower.nodes }
            })
            .collect();

        info!(
            trees = trees.len(),
            samples = rows.len(),
            features = n_features,
            classes = n_classes,
            "random forest fitted"
        );
        Self {
            params,
            n_classes,
            trees,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Mean of the per-tree leaf distributions.
    pub fn predict_proba(&self, row: &SparseRow) -> Vec<f64> {
        let mut probabilities = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, leaf) in probabilities.iter_mut().zip(tree.predict(row)) {
                *p += leaf;
            }
        }
        if !self.trees.is_empty() {
            let n = self.trees.len() as f64;
            probabilities.iter_mut().for_each(|p| *p /= n);
        }
        probabilities
    }

    /// Index of the most probable class; ties go to the lower index.
    pub fn predict(&self, row: &SparseRow) -> usize {
        argmax(&self.predict_proba(row))
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
