use anyhow::{Result, anyhow};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::features::{FEATURE_COUNT, FeatureRow};

const SPLIT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    /// Candidate features drawn per split.
    pub max_features: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_features: FEATURE_COUNT.div_ceil(3),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART regression tree stored as a flat node array; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Pending {
    node: usize,
    indices: Vec<usize>,
    depth: usize,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
}

impl RegressionTree {
    pub fn constant(value: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { value, samples: 0 }],
        }
    }

    /// Grows a tree over `sample` (indices into `rows`, duplicates allowed).
    pub fn fit(
        rows: &[FeatureRow],
        targets: &[f64],
        sample: &[usize],
        cfg: &ForestConfig,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf {
            value: 0.0,
            samples: 0,
        }];
        let mut stack = vec![Pending {
            node: 0,
            indices: sample.to_vec(),
            depth: 0,
        }];

        while let Some(pending) = stack.pop() {
            let n = pending.indices.len();
            let value = mean_of(targets, &pending.indices);
            let leaf = Node::Leaf { value, samples: n };

            let depth_capped = cfg.max_depth.is_some_and(|max| pending.depth >= max);
            if depth_capped
                || n < cfg.min_samples_split.max(2)
                || n < 2 * cfg.min_samples_leaf.max(1)
                || is_pure(targets, &pending.indices)
            {
                nodes[pending.node] = leaf;
                continue;
            }

            let Some(split) = best_split(rows, targets, &pending.indices, cfg, rng) else {
                nodes[pending.node] = leaf;
                continue;
            };

            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = pending
                .indices
                .iter()
                .partition(|&&i| rows[i][split.feature] <= split.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf {
                value: 0.0,
                samples: 0,
            });
            nodes.push(Node::Leaf {
                value: 0.0,
                samples: 0,
            });
            nodes[pending.node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            stack.push(Pending {
                node: right,
                indices: right_idx,
                depth: pending.depth + 1,
            });
            stack.push(Pending {
                node: left,
                indices: left_idx,
                depth: pending.depth + 1,
            });
        }

        Self { nodes }
    }

    pub fn predict(&self, row: &FeatureRow) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(Node::Split { left, right, .. }) = self.nodes.get(idx) {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }

    /// Structural sanity for trees read back from disk.
    pub fn check(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(anyhow!("tree has no nodes"));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(anyhow!("leaf {idx} holds a non-finite value"));
                    }
                }
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(anyhow!("split {idx} uses feature {feature}"));
                    }
                    // Children are always appended after their parent.
                    if *left <= idx || *right <= idx || *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(anyhow!("split {idx} has invalid children"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of regression trees; prediction is the mean of the trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(rows: &[FeatureRow], targets: &[f64], config: ForestConfig) -> Result<Self> {
        if rows.is_empty() {
            return Err(anyhow!("cannot fit forest on zero rows"));
        }
        if rows.len() != targets.len() {
            return Err(anyhow!(
                "row/target length mismatch: {} vs {}",
                rows.len(),
                targets.len()
            ));
        }
        if config.n_estimators == 0 {
            return Err(anyhow!("forest needs at least one tree"));
        }

        // Per-tree seeds are drawn up front so the parallel fit stays reproducible.
        let mut master = StdRng::seed_from_u64(config.seed);
        let seeds = (0..config.n_estimators)
            .map(|_| master.next_u64())
            .collect::<Vec<_>>();

        let n = rows.len();
        let trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let sample = (0..n).map(|_| rng.gen_range(0..n)).collect::<Vec<_>>();
                RegressionTree::fit(rows, targets, &sample, &config, &mut rng)
            })
            .collect::<Vec<_>>();

        Ok(Self { config, trees })
    }

    pub fn from_trees(config: ForestConfig, trees: Vec<RegressionTree>) -> Result<Self> {
        if trees.is_empty() {
            return Err(anyhow!("forest needs at least one tree"));
        }
        Ok(Self { config, trees })
    }

    pub fn predict(&self, row: &FeatureRow) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        sum / self.trees.len().max(1) as f64
    }

    pub fn predict_all(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn check(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(anyhow!("forest has no trees"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check().map_err(|err| anyhow!("tree {i}: {err}"))?;
        }
        Ok(())
    }
}

fn mean_of(targets: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
}

fn is_pure(targets: &[f64], indices: &[usize]) -> bool {
    let Some(&first) = indices.first() else {
        return true;
    };
    let y0 = targets[first];
    indices.iter().all(|&i| (targets[i] - y0).abs() <= SPLIT_EPSILON)
}

// Visits features in random order until `max_features` non-constant ones have been
// scored, so a node is never left unsplit just because the draw hit constant columns.
fn best_split(
    rows: &[FeatureRow],
    targets: &[f64],
    indices: &[usize],
    cfg: &ForestConfig,
    rng: &mut StdRng,
) -> Option<SplitChoice> {
    let min_leaf = cfg.min_samples_leaf.max(1);
    let budget = cfg.max_features.clamp(1, FEATURE_COUNT);
    let mut order: Vec<usize> = (0..FEATURE_COUNT).collect();
    order.shuffle(rng);

    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();

    let mut best: Option<(f64, SplitChoice)> = None;
    let mut scored = 0;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

    for feature in order {
        if scored >= budget {
            break;
        }
        pairs.clear();
        pairs.extend(indices.iter().map(|&i| (rows[i][feature], targets[i])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        if pairs[n - 1].0 - pairs[0].0 <= SPLIT_EPSILON {
            continue;
        }
        scored += 1;

        let mut left_sum = 0.0;
        for i in 1..n {
            left_sum += pairs[i - 1].1;
            if i < min_leaf || n - i < min_leaf {
                continue;
            }
            let (lo, hi) = (pairs[i - 1].0, pairs[i].0);
            if hi - lo <= SPLIT_EPSILON {
                continue;
            }
            let right_sum = total_sum - left_sum;
            // Maximising this proxy minimises the children's summed squared error.
            let score = left_sum * left_sum / i as f64 + right_sum * right_sum / (n - i) as f64;
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                let mut threshold = (lo + hi) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some((score, SplitChoice { feature, threshold }));
            }
        }
    }

    best.map(|(_, split)| split)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(x: f64) -> FeatureRow {
        [0.0, 0.0, 0.0, x, 0.0, 0.0, 0.0, 0.0]
    }

    #[test]
    fn single_tree_separates_a_step() {
        let rows = vec![row(1.0), row(2.0), row(3.0), row(4.0)];
        let targets = vec![10.0, 10.0, 50.0, 50.0];
        let cfg = ForestConfig {
            max_features: FEATURE_COUNT,
            ..ForestConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let tree = RegressionTree::fit(&rows, &targets, &[0, 1, 2, 3], &cfg, &mut rng);
        assert_eq!(tree.predict(&row(1.5)), 10.0);
        assert_eq!(tree.predict(&row(3.5)), 50.0);
        assert_eq!(tree.depth(), 1);
        assert!(tree.check().is_ok());
    }

    #[test]
    fn constant_columns_do_not_block_splits() {
        // Only feature 3 varies; a budget of 1 must still find it.
        let rows = vec![row(1.0), row(2.0)];
        let targets = vec![0.0, 100.0];
        let cfg = ForestConfig {
            max_features: 1,
            ..ForestConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let tree = RegressionTree::fit(&rows, &targets, &[0, 1], &cfg, &mut rng);
        assert_eq!(tree.predict(&row(1.0)), 0.0);
        assert_eq!(tree.predict(&row(2.0)), 100.0);
    }

    #[test]
    fn max_depth_limits_growth() {
        let rows = (0..32).map(|i| row(i as f64)).collect::<Vec<_>>();
        let targets = (0..32).map(|i| i as f64).collect::<Vec<_>>();
        let cfg = ForestConfig {
            max_depth: Some(2),
            max_features: FEATURE_COUNT,
            ..ForestConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let sample = (0..32).collect::<Vec<_>>();
        let tree = RegressionTree::fit(&rows, &targets, &sample, &cfg, &mut rng);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn same_seed_same_forest() {
        let rows = (0..40).map(|i| row((i % 13) as f64)).collect::<Vec<_>>();
        let targets = (0..40).map(|i| (i * 7 % 11) as f64).collect::<Vec<_>>();
        let cfg = ForestConfig {
            n_estimators: 8,
            ..ForestConfig::default()
        };
        let a = RandomForest::fit(&rows, &targets, cfg).expect("fit a");
        let b = RandomForest::fit(&rows, &targets, cfg).expect("fit b");
        assert_eq!(a, b);
        let c = RandomForest::fit(&rows, &targets, ForestConfig { seed: 43, ..cfg }).expect("fit c");
        assert_ne!(a, c);
    }

    #[test]
    fn forest_averages_trees() {
        let forest = RandomForest::from_trees(
            ForestConfig::default(),
            vec![RegressionTree::constant(170.0), RegressionTree::constant(190.0)],
        )
        .expect("forest");
        assert_eq!(forest.predict(&row(0.0)), 180.0);
    }

    #[test]
    fn mismatched_lengths_fail() {
        assert!(RandomForest::fit(&[row(1.0)], &[1.0, 2.0], ForestConfig::default()).is_err());
    }
}
