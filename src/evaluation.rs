use anyhow::{Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub rmse: f64,
    pub mae: f64,
}

/// Seeded shuffle of `0..n`; the test side gets `ceil(n * test_fraction)` rows,
/// clamped so both sides keep at least one row.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    if n < 2 {
        return Err(anyhow!("need at least 2 rows to hold out a test set, got {n}"));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(anyhow!("test fraction must be in (0, 1), got {test_fraction}"));
    }
    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.clamp(1, n - 1);

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let train = order.split_off(n_test);
    Ok(Split { train, test: order })
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    evaluate(actual, predicted).rmse
}

pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Metrics {
    if actual.is_empty() || actual.len() != predicted.len() {
        return Metrics {
            samples: 0,
            rmse: 0.0,
            mae: 0.0,
        };
    }
    let n = actual.len() as f64;
    let mut sq = 0.0;
    let mut abs = 0.0;
    for (a, p) in actual.iter().zip(predicted) {
        let d = a - p;
        sq += d * d;
        abs += d.abs();
    }
    Metrics {
        samples: actual.len(),
        rmse: (sq / n).sqrt(),
        mae: abs / n,
    }
}
