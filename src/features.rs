use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 8;

/// Column order of every feature row, at fit time and at predict time alike.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "bat_team",
    "bowl_team",
    "venue",
    "runs",
    "wickets",
    "overs",
    "runs_last_5",
    "wickets_last_5",
];

pub type FeatureRow = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedState {
    pub bat_team: usize,
    pub bowl_team: usize,
    pub venue: usize,
    pub runs: u32,
    pub wickets: u32,
    pub overs: f64,
    pub runs_last_5: u32,
    pub wickets_last_5: u32,
}

pub fn feature_row(state: &EncodedState) -> FeatureRow {
    [
        state.bat_team as f64,
        state.bowl_team as f64,
        state.venue as f64,
        state.runs as f64,
        state.wickets as f64,
        state.overs,
        state.runs_last_5 as f64,
        state.wickets_last_5 as f64,
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStat {
    pub name: String,
    pub mean: f64,
    pub std: f64,
}

/// Zero-mean / unit-variance transform with statistics frozen at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub features: Vec<FeatureStat>,
}

impl StandardScaler {
    pub fn fit(rows: &[FeatureRow]) -> Result<Self> {
        if rows.is_empty() {
            return Err(anyhow!("cannot fit scaler on zero rows"));
        }
        let n = rows.len() as f64;
        let mut mean = [0.0_f64; FEATURE_COUNT];
        for row in rows {
            for (acc, v) in mean.iter_mut().zip(row) {
                *acc += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut var = [0.0_f64; FEATURE_COUNT];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                var[i] += (v - mean[i]).powi(2);
            }
        }

        let features = FEATURE_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| FeatureStat {
                name: name.to_string(),
                mean: mean[i],
                std: (var[i] / n).sqrt(),
            })
            .collect();
        Ok(Self { features })
    }

    /// Errors unless the stored statistics line up with `FEATURE_NAMES`.
    pub fn check_layout(&self) -> Result<()> {
        if self.features.len() != FEATURE_COUNT {
            return Err(anyhow!(
                "scaler has {} features, expected {}",
                self.features.len(),
                FEATURE_COUNT
            ));
        }
        for (i, (stat, expected)) in self.features.iter().zip(FEATURE_NAMES).enumerate() {
            if stat.name != expected {
                return Err(anyhow!(
                    "scaler feature {} is '{}', expected '{}'",
                    i,
                    stat.name,
                    expected
                ));
            }
            if !stat.mean.is_finite() || !stat.std.is_finite() || stat.std < 0.0 {
                return Err(anyhow!("scaler feature '{}' has invalid statistics", stat.name));
            }
        }
        Ok(())
    }

    pub fn transform(&self, row: &FeatureRow) -> FeatureRow {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, stat) in self.features.iter().take(FEATURE_COUNT).enumerate() {
            out[i] = (row[i] - stat.mean) / scale_of(stat.std);
        }
        out
    }

    pub fn transform_all(&self, rows: &[FeatureRow]) -> Vec<FeatureRow> {
        rows.iter().map(|row| self.transform(row)).collect()
    }
}

// Constant columns are centred but left unscaled.
fn scale_of(std: f64) -> f64 {
    if std < 1e-12 { 1.0 } else { std }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_row_follows_declared_order() {
        let row = feature_row(&EncodedState {
            bat_team: 1,
            bowl_team: 2,
            venue: 3,
            runs: 4,
            wickets: 5,
            overs: 6.5,
            runs_last_5: 7,
            wickets_last_5: 8,
        });
        assert_eq!(row, [1.0, 2.0, 3.0, 4.0, 5.0, 6.5, 7.0, 8.0]);
    }

    #[test]
    fn fitted_rows_are_standardised() {
        let rows = vec![
            [0.0, 1.0, 0.0, 10.0, 0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 30.0, 2.0, 3.0, 0.0, 0.0],
        ];
        let scaler = StandardScaler::fit(&rows).expect("fit");
        let out = scaler.transform(&rows[0]);
        assert!((out[0] + 1.0).abs() < 1e-12);
        assert!((out[3] + 1.0).abs() < 1e-12);
        // venue is constant
        assert_eq!(out[2], 0.0);
        assert_eq!(scaler.features[3].mean, 20.0);
        assert_eq!(scaler.features[3].std, 10.0);
    }

    #[test]
    fn layout_check_rejects_swapped_names() {
        let rows = vec![[0.0; FEATURE_COUNT]];
        let mut scaler = StandardScaler::fit(&rows).expect("fit");
        assert!(scaler.check_layout().is_ok());
        scaler.features.swap(3, 4);
        assert!(scaler.check_layout().is_err());
    }

    #[test]
    fn empty_fit_fails() {
        assert!(StandardScaler::fit(&[]).is_err());
    }
}
