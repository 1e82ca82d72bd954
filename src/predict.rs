use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifacts::ArtifactBundle;
use crate::encoding::EncodeError;
use crate::features::{EncodedState, FeatureRow, feature_row};

pub const INNINGS_OVERS: f64 = 20.0;
pub const BALLS_PER_OVER: u32 = 6;
/// Recent-form inputs only mean something once five overs are complete.
pub const RECENT_FORM_MIN_OVERS: f64 = 5.0;
pub const RANGE_HALF_WIDTH: i64 = 5;
pub const MAX_WICKETS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictError {
    #[error("Teams must be different!")]
    SameTeams,
    #[error("Match hasn't started yet!")]
    NotStarted,
    #[error("Invalid match state: {0}")]
    OutOfRange(String),
    #[error("Unknown input: {0}")]
    UnknownCategory(#[from] EncodeError),
}

/// One hypothetical match state as entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInput {
    pub bat_team: String,
    pub bowl_team: String,
    pub venue: String,
    pub runs: u32,
    pub wickets: u32,
    /// Completed overs.
    pub overs: u32,
    /// Legal balls bowled in the current over.
    #[serde(default)]
    pub balls: u32,
    #[serde(default)]
    pub runs_last_5: u32,
    #[serde(default)]
    pub wickets_last_5: u32,
}

impl MatchInput {
    pub fn fractional_overs(&self) -> f64 {
        self.overs as f64 + self.balls as f64 / BALLS_PER_OVER as f64
    }

    /// Last-five-overs runs and wickets as fed to the model: zero before the
    /// five-over mark whatever was typed.
    pub fn recent_form(&self) -> (u32, u32) {
        if self.fractional_overs() < RECENT_FORM_MIN_OVERS {
            (0, 0)
        } else {
            (self.runs_last_5, self.wickets_last_5)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    pub current_run_rate: f64,
    pub projected_at_crr: i64,
    /// `None` once the innings has no overs left.
    pub required_run_rate: Option<f64>,
}

impl DerivedMetrics {
    pub fn compute(runs: u32, fractional_overs: f64, predicted: i64) -> Self {
        let current_run_rate = runs as f64 / fractional_overs;
        let projected_at_crr = (current_run_rate * INNINGS_OVERS) as i64;
        let remaining = INNINGS_OVERS - fractional_overs;
        let required_run_rate = if fractional_overs < INNINGS_OVERS && remaining > 0.0 {
            Some((predicted - runs as i64) as f64 / remaining)
        } else {
            None
        };
        Self {
            current_run_rate,
            projected_at_crr,
            required_run_rate,
        }
    }

    pub fn current_run_rate_label(&self) -> String {
        format!("{:.2}", self.current_run_rate)
    }

    pub fn projected_label(&self) -> String {
        self.projected_at_crr.to_string()
    }

    pub fn required_run_rate_label(&self) -> String {
        match self.required_run_rate {
            Some(rate) => format!("{rate:.2}"),
            None => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRange {
    pub lower: i64,
    pub upper: i64,
}

impl ScoreRange {
    /// Fixed-width band; not a statistical interval.
    pub fn around(predicted: i64) -> Self {
        Self {
            lower: predicted - RANGE_HALF_WIDTH,
            upper: predicted + RANGE_HALF_WIDTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub predicted: i64,
    pub raw: f64,
    pub range: ScoreRange,
    pub metrics: DerivedMetrics,
    pub features: FeatureRow,
}

impl Forecast {
    pub fn from_raw(input: &MatchInput, raw: f64, features: FeatureRow) -> Self {
        // Truncation toward zero, matching an integer cast of the model output.
        let predicted = raw.trunc() as i64;
        Self {
            predicted,
            raw,
            range: ScoreRange::around(predicted),
            metrics: DerivedMetrics::compute(input.runs, input.fractional_overs(), predicted),
            features,
        }
    }
}

/// Hard rejections, checked in this order before any encoding happens. The
/// range checks only bite for inputs that bypass the form, e.g. JSON snapshots.
pub fn validate(input: &MatchInput) -> Result<(), PredictError> {
    if input.bat_team == input.bowl_team {
        return Err(PredictError::SameTeams);
    }
    if input.fractional_overs() <= 0.0 {
        return Err(PredictError::NotStarted);
    }
    if input.balls >= BALLS_PER_OVER {
        return Err(PredictError::OutOfRange(format!(
            "balls must be 0-{}, got {}",
            BALLS_PER_OVER - 1,
            input.balls
        )));
    }
    if input.fractional_overs() > INNINGS_OVERS {
        return Err(PredictError::OutOfRange(format!(
            "innings is {INNINGS_OVERS} overs, got {}.{}",
            input.overs, input.balls
        )));
    }
    if input.wickets > MAX_WICKETS || input.wickets_last_5 > MAX_WICKETS {
        return Err(PredictError::OutOfRange(format!(
            "at most {MAX_WICKETS} wickets can fall, got {}/{} (last 5)",
            input.wickets, input.wickets_last_5
        )));
    }
    Ok(())
}

pub fn encode_input(bundle: &ArtifactBundle, input: &MatchInput) -> Result<EncodedState, PredictError> {
    let (runs_last_5, wickets_last_5) = input.recent_form();
    Ok(EncodedState {
        bat_team: bundle.team_encoder.encode(&input.bat_team)?,
        bowl_team: bundle.team_encoder.encode(&input.bowl_team)?,
        venue: bundle.venue_encoder.encode(&input.venue)?,
        runs: input.runs,
        wickets: input.wickets,
        overs: input.fractional_overs(),
        runs_last_5,
        wickets_last_5,
    })
}

/// validate -> encode -> assemble -> scale -> predict.
pub fn predict(bundle: &ArtifactBundle, input: &MatchInput) -> Result<Forecast, PredictError> {
    validate(input)?;
    let encoded = encode_input(bundle, input)?;
    let row = feature_row(&encoded);
    let scaled = bundle.scaler.transform(&row);
    let raw = bundle.model.predict(&scaled);
    Ok(Forecast::from_raw(input, raw, row))
}
