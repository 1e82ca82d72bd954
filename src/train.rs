use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};

use crate::artifacts::{self, ArtifactBundle, BundleMeta};
use crate::config::TrainConfig;
use crate::dataset::{LoadedDataset, MatchRecord};
use crate::encoding::CategoryEncoder;
use crate::evaluation::{self, Metrics};
use crate::features::{EncodedState, FeatureRow, StandardScaler, feature_row};
use crate::forest::RandomForest;

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub bundle_id: String,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub teams: usize,
    pub venues: usize,
    pub trees: usize,
    pub metrics: Metrics,
}

/// Encodes every record with freshly fitted encoders. Team vocabulary is the union
/// of both roles so either side of a fixture encodes with the same table.
pub fn encode_records(
    records: &[MatchRecord],
) -> Result<(CategoryEncoder, CategoryEncoder, Vec<FeatureRow>, Vec<f64>)> {
    let team_encoder = CategoryEncoder::fit(
        "team",
        records
            .iter()
            .flat_map(|r| [r.bat_team.as_str(), r.bowl_team.as_str()]),
    );
    let venue_encoder = CategoryEncoder::fit("venue", records.iter().map(|r| r.venue.as_str()));

    let mut rows = Vec::with_capacity(records.len());
    let mut targets = Vec::with_capacity(records.len());
    for record in records {
        let state = EncodedState {
            bat_team: team_encoder.encode(&record.bat_team)?,
            bowl_team: team_encoder.encode(&record.bowl_team)?,
            venue: venue_encoder.encode(&record.venue)?,
            runs: record.runs,
            wickets: record.wickets,
            overs: record.overs,
            runs_last_5: record.runs_last_5,
            wickets_last_5: record.wickets_last_5,
        };
        rows.push(feature_row(&state));
        targets.push(record.total as f64);
    }
    Ok((team_encoder, venue_encoder, rows, targets))
}

pub fn train_bundle(dataset: &LoadedDataset, cfg: &TrainConfig) -> Result<(ArtifactBundle, TrainReport)> {
    let (team_encoder, venue_encoder, rows, targets) = encode_records(&dataset.records)?;

    let split = evaluation::train_test_split(rows.len(), cfg.test_fraction, cfg.forest.seed)
        .context("split training data")?;
    let train_x = pick(&rows, &split.train);
    let train_y = pick(&targets, &split.train);
    let test_x = pick(&rows, &split.test);
    let test_y = pick(&targets, &split.test);

    // Scaler statistics come from the training partition only.
    let scaler = StandardScaler::fit(&train_x).context("fit scaler")?;
    let train_scaled = scaler.transform_all(&train_x);
    let test_scaled = scaler.transform_all(&test_x);

    let model = RandomForest::fit(&train_scaled, &train_y, cfg.forest).context("fit forest")?;
    let predicted = model.predict_all(&test_scaled);
    let metrics = evaluation::evaluate(&test_y, &predicted);

    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let bundle_id = artifacts::new_bundle_id(&generated_at, &dataset.fingerprint);
    let report = TrainReport {
        bundle_id: bundle_id.clone(),
        rows: rows.len(),
        train_rows: train_x.len(),
        test_rows: test_x.len(),
        teams: team_encoder.len(),
        venues: venue_encoder.len(),
        trees: model.trees().len(),
        metrics,
    };
    let bundle = ArtifactBundle {
        bundle_id,
        meta: BundleMeta {
            generated_at,
            train_rows: report.train_rows,
            test_rows: report.test_rows,
            rmse: metrics.rmse,
            mae: metrics.mae,
            source_fingerprint: dataset.fingerprint.clone(),
        },
        model,
        team_encoder,
        venue_encoder,
        scaler,
    };
    Ok((bundle, report))
}

/// Load, train and persist in one go. Nothing is written unless every step succeeds.
pub fn run(cfg: &TrainConfig) -> Result<TrainReport> {
    let dataset = crate::dataset::load_dataset(&cfg.data_path)?;
    if !dataset.dropped_columns.is_empty() {
        eprintln!("[INFO] dropped columns: {}", dataset.dropped_columns.join(", "));
    }
    eprintln!(
        "[INFO] loaded {} rows from {}",
        dataset.records.len(),
        cfg.data_path.display()
    );
    let (bundle, report) = train_bundle(&dataset, cfg)?;
    artifacts::save_bundle(&cfg.artifact_dir, &bundle)?;
    Ok(report)
}

fn pick<T: Copy>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bat: &str, bowl: &str, runs: u32, total: u32) -> MatchRecord {
        MatchRecord {
            bat_team: bat.to_string(),
            bowl_team: bowl.to_string(),
            venue: "Eden Gardens".to_string(),
            runs,
            wickets: 1,
            overs: 6.0,
            runs_last_5: 30,
            wickets_last_5: 1,
            total,
        }
    }

    #[test]
    fn team_vocabulary_covers_both_roles() {
        // "Gamma" only ever bowls; it must still be encodable as a batting side.
        let records = vec![record("Alpha", "Gamma", 40, 160), record("Beta", "Alpha", 50, 170)];
        let (teams, venues, rows, targets) = encode_records(&records).expect("encode");
        assert_eq!(teams.classes(), ["Alpha", "Beta", "Gamma"]);
        assert_eq!(venues.len(), 1);
        assert_eq!(rows[0][0], 0.0);
        assert_eq!(rows[0][1], 2.0);
        assert_eq!(rows[1][0], 1.0);
        assert_eq!(targets, vec![160.0, 170.0]);
    }
}
