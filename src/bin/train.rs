use anyhow::Result;

use ipl_score::config::{self, TrainConfig};
use ipl_score::train;

fn main() -> Result<()> {
    config::load_dotenv();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = TrainConfig::from_env();
    cfg.apply_args(&args);

    println!("Training Random Forest Model...");
    println!("Data: {}", cfg.data_path.display());
    println!(
        "Trees: {} | seed: {} | max depth: {}",
        cfg.forest.n_estimators,
        cfg.forest.seed,
        cfg.forest
            .max_depth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    let report = train::run(&cfg)?;

    println!("Training Complete. RMSE: {:.2}", report.metrics.rmse);
    println!("MAE: {:.2}", report.metrics.mae);
    println!(
        "Rows: {} (train {}, test {}) | teams: {} | venues: {}",
        report.rows, report.train_rows, report.test_rows, report.teams, report.venues
    );
    println!(
        "Model saved to {} (bundle {})",
        cfg.artifact_dir.display(),
        report.bundle_id
    );
    Ok(())
}
