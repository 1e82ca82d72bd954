use std::collections::VecDeque;

use crate::artifacts::ArtifactBundle;
use crate::predict::{self, Forecast, MatchInput, RECENT_FORM_MIN_OVERS};
use crate::teams;

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    BatTeam,
    BowlTeam,
    Venue,
    Runs,
    Wickets,
    Overs,
    Balls,
    RunsLast5,
    WicketsLast5,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::BatTeam,
        Field::BowlTeam,
        Field::Venue,
        Field::Runs,
        Field::Wickets,
        Field::Overs,
        Field::Balls,
        Field::RunsLast5,
        Field::WicketsLast5,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::BatTeam => "Batting Team",
            Field::BowlTeam => "Bowling Team",
            Field::Venue => "Stadium",
            Field::Runs => "Current Runs",
            Field::Wickets => "Wickets Down",
            Field::Overs => "Overs Done",
            Field::Balls => "Balls (This Over)",
            Field::RunsLast5 => "Runs Scored",
            Field::WicketsLast5 => "Wickets Lost",
        }
    }

    /// Inclusive upper bound for numeric fields.
    pub fn max(&self) -> Option<u32> {
        match self {
            Field::Runs => Some(300),
            Field::Wickets => Some(9),
            Field::Overs => Some(19),
            Field::Balls => Some(5),
            Field::RunsLast5 => Some(100),
            Field::WicketsLast5 => Some(10),
            Field::BatTeam | Field::BowlTeam | Field::Venue => None,
        }
    }

    pub fn is_recent_form(&self) -> bool {
        matches!(self, Field::RunsLast5 | Field::WicketsLast5)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Empty,
    Forecast(Forecast),
    Rejected(String),
}

/// Input state of one interactive session. The bundle it predicts against is
/// shared and read-only; nothing here is.
#[derive(Debug, Clone)]
pub struct FormState {
    pub teams: Vec<String>,
    pub venues: Vec<String>,
    pub bat_idx: usize,
    pub bowl_idx: usize,
    pub venue_idx: usize,
    pub runs: u32,
    pub wickets: u32,
    pub overs: u32,
    pub balls: u32,
    pub runs_last_5: u32,
    pub wickets_last_5: u32,
    pub focus: Field,
    pub outcome: Outcome,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
}

impl FormState {
    pub fn new(bundle: &ArtifactBundle) -> Self {
        Self::with_choices(
            teams::selectable_teams(&bundle.team_encoder),
            bundle.venue_encoder.classes().to_vec(),
        )
    }

    pub fn with_choices(teams: Vec<String>, venues: Vec<String>) -> Self {
        // Bowling side starts on the second team so the defaults are a valid fixture.
        let bowl_idx = if teams.len() > 1 { 1 } else { 0 };
        Self {
            teams,
            venues,
            bat_idx: 0,
            bowl_idx,
            venue_idx: 0,
            runs: 0,
            wickets: 0,
            overs: 0,
            balls: 0,
            runs_last_5: 0,
            wickets_last_5: 0,
            focus: Field::BatTeam,
            outcome: Outcome::Empty,
            help_overlay: false,
            logs: VecDeque::new(),
        }
    }

    pub fn fractional_overs(&self) -> f64 {
        self.to_input().fractional_overs()
    }

    pub fn recent_form_enabled(&self) -> bool {
        self.fractional_overs() >= RECENT_FORM_MIN_OVERS
    }

    pub fn bat_team(&self) -> &str {
        self.teams.get(self.bat_idx).map(String::as_str).unwrap_or("")
    }

    pub fn bowl_team(&self) -> &str {
        self.teams.get(self.bowl_idx).map(String::as_str).unwrap_or("")
    }

    pub fn venue(&self) -> &str {
        self.venues.get(self.venue_idx).map(String::as_str).unwrap_or("")
    }

    pub fn to_input(&self) -> MatchInput {
        MatchInput {
            bat_team: self.bat_team().to_string(),
            bowl_team: self.bowl_team().to_string(),
            venue: self.venue().to_string(),
            runs: self.runs,
            wickets: self.wickets,
            overs: self.overs,
            balls: self.balls,
            runs_last_5: self.runs_last_5,
            wickets_last_5: self.wickets_last_5,
        }
    }

    /// Fields the user can currently reach; recent form is hidden before five overs.
    pub fn visible_fields(&self) -> Vec<Field> {
        let recent = self.recent_form_enabled();
        Field::ALL
            .into_iter()
            .filter(|f| recent || !f.is_recent_form())
            .collect()
    }

    pub fn focus_next(&mut self) {
        self.step_focus(1);
    }

    pub fn focus_prev(&mut self) {
        self.step_focus(-1);
    }

    fn step_focus(&mut self, dir: isize) {
        let fields = self.visible_fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0) as isize;
        let len = fields.len() as isize;
        let next = (pos + dir).rem_euclid(len) as usize;
        self.focus = fields[next];
    }

    /// Moves the focused selector or number by `delta`. Selectors wrap, numbers clamp.
    pub fn adjust(&mut self, delta: i32) {
        match self.focus {
            Field::BatTeam => self.bat_idx = cycle(self.bat_idx, self.teams.len(), delta),
            Field::BowlTeam => self.bowl_idx = cycle(self.bowl_idx, self.teams.len(), delta),
            Field::Venue => self.venue_idx = cycle(self.venue_idx, self.venues.len(), delta),
            field => {
                let max = field.max().unwrap_or(u32::MAX);
                let slot = match field {
                    Field::Runs => &mut self.runs,
                    Field::Wickets => &mut self.wickets,
                    Field::Overs => &mut self.overs,
                    Field::Balls => &mut self.balls,
                    Field::RunsLast5 => &mut self.runs_last_5,
                    _ => &mut self.wickets_last_5,
                };
                *slot = (i64::from(*slot) + i64::from(delta)).clamp(0, i64::from(max)) as u32;
            }
        }
        // Dropping below five overs hides the recent-form fields.
        if self.focus.is_recent_form() && !self.recent_form_enabled() {
            self.focus = Field::Balls;
        }
    }

    pub fn submit(&mut self, bundle: &ArtifactBundle) {
        let input = self.to_input();
        match predict::predict(bundle, &input) {
            Ok(forecast) => {
                self.push_log(format!(
                    "[INFO] {} vs {} at {}: projected {}",
                    input.bat_team, input.bowl_team, input.venue, forecast.predicted
                ));
                self.outcome = Outcome::Forecast(forecast);
            }
            Err(err) => {
                self.push_log(format!("[WARN] prediction rejected: {err}"));
                self.outcome = Outcome::Rejected(err.to_string());
            }
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }
}

fn cycle(idx: usize, len: usize, delta: i32) -> usize {
    if len == 0 {
        return 0;
    }
    (idx as i64 + i64::from(delta)).rem_euclid(len as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> FormState {
        FormState::with_choices(
            vec!["Chennai Super Kings".to_string(), "Mumbai Indians".to_string()],
            vec!["Wankhede Stadium".to_string()],
        )
    }

    #[test]
    fn defaults_pick_distinct_teams() {
        let f = form();
        assert_eq!(f.bat_team(), "Chennai Super Kings");
        assert_eq!(f.bowl_team(), "Mumbai Indians");
    }

    #[test]
    fn numbers_clamp_and_selectors_wrap() {
        let mut f = form();
        f.focus = Field::Wickets;
        f.adjust(25);
        assert_eq!(f.wickets, 9);
        f.adjust(-100);
        assert_eq!(f.wickets, 0);
        f.focus = Field::BowlTeam;
        f.adjust(1);
        assert_eq!(f.bowl_idx, 0);
    }

    #[test]
    fn recent_form_fields_hidden_early() {
        let mut f = form();
        assert!(!f.visible_fields().contains(&Field::RunsLast5));
        f.overs = 5;
        assert!(f.visible_fields().contains(&Field::RunsLast5));
        f.focus = Field::WicketsLast5;
        f.focus_next();
        assert_eq!(f.focus, Field::BatTeam);
    }

    #[test]
    fn dropping_below_five_overs_moves_focus() {
        let mut f = form();
        f.overs = 5;
        f.focus = Field::RunsLast5;
        f.adjust(30);
        assert_eq!(f.runs_last_5, 30);
        f.overs = 4;
        f.adjust(1);
        assert_eq!(f.focus, Field::Balls);
    }

    #[test]
    fn log_ring_is_bounded() {
        let mut f = form();
        for i in 0..(MAX_LOGS + 5) {
            f.push_log(format!("{i}"));
        }
        assert_eq!(f.logs.len(), MAX_LOGS);
        assert_eq!(f.logs.front().map(String::as_str), Some("5"));
    }
}
