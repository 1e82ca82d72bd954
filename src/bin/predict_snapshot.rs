use std::fs;
use std::path::PathBuf;

use anyhow::{Context, anyhow};

use ipl_score::artifacts;
use ipl_score::config;
use ipl_score::predict::{self, MatchInput};

fn main() -> anyhow::Result<()> {
    config::load_dotenv();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let path = args
        .iter()
        .find(|arg| !arg.starts_with("--"))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: predict_snapshot <match.json> [--artifacts DIR]"))?;
    let dir = config::flag_value(&args, "--artifacts")
        .map(PathBuf::from)
        .unwrap_or_else(config::artifact_dir);

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let input: MatchInput =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

    // Snapshots skip the form's clamping, so impossible states are refused up front.
    predict::validate(&input)?;

    // Loads from disk directly so a bad bundle surfaces as a non-zero exit.
    let bundle = artifacts::load_bundle(&dir)?;
    let forecast = predict::predict(&bundle, &input)?;

    println!(
        "{} vs {} at {} | {}/{} after {}.{} overs",
        input.bat_team,
        input.bowl_team,
        input.venue,
        input.runs,
        input.wickets,
        input.overs,
        input.balls
    );
    println!("Bundle: {}", bundle.bundle_id);
    println!("Projected score: {}", forecast.predicted);
    println!(
        "Expected range: {} - {}",
        forecast.range.lower, forecast.range.upper
    );
    println!(
        "Current run rate: {}",
        forecast.metrics.current_run_rate_label()
    );
    println!("Projected (at CRR): {}", forecast.metrics.projected_label());
    println!(
        "RPO required (to reach {}): {}",
        forecast.predicted,
        forecast.metrics.required_run_rate_label()
    );
    Ok(())
}
