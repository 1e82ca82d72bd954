use ratatui::style::Color;

use crate::encoding::CategoryEncoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamStyle {
    pub short: &'static str,
    pub color: Color,
}

/// Franchises with a known badge. Anything else renders with `default_badge`.
pub const TEAM_CONFIG: [(&str, TeamStyle); 8] = [
    (
        "Chennai Super Kings",
        TeamStyle {
            short: "CSK",
            color: Color::Yellow,
        },
    ),
    (
        "Delhi Daredevils",
        TeamStyle {
            short: "DD",
            color: Color::Blue,
        },
    ),
    (
        "Kings XI Punjab",
        TeamStyle {
            short: "KXIP",
            color: Color::Red,
        },
    ),
    (
        "Kolkata Knight Riders",
        TeamStyle {
            short: "KKR",
            color: Color::Magenta,
        },
    ),
    (
        "Mumbai Indians",
        TeamStyle {
            short: "MI",
            color: Color::LightBlue,
        },
    ),
    (
        "Rajasthan Royals",
        TeamStyle {
            short: "RR",
            color: Color::LightMagenta,
        },
    ),
    (
        "Royal Challengers Bangalore",
        TeamStyle {
            short: "RCB",
            color: Color::LightRed,
        },
    ),
    (
        "Sunrisers Hyderabad",
        TeamStyle {
            short: "SRH",
            color: Color::LightYellow,
        },
    ),
];

pub fn team_style(name: &str) -> Option<TeamStyle> {
    TEAM_CONFIG
        .iter()
        .find(|(team, _)| *team == name)
        .map(|(_, style)| *style)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub short: String,
    pub color: Color,
}

pub fn badge(name: &str) -> Badge {
    match team_style(name) {
        Some(style) => Badge {
            short: style.short.to_string(),
            color: style.color,
        },
        None => default_badge(name),
    }
}

/// Initials in a neutral colour, e.g. "Gujarat Lions" -> "GL".
pub fn default_badge(name: &str) -> Badge {
    let short = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .take(4)
        .collect::<String>();
    Badge {
        short: if short.is_empty() { "?".to_string() } else { short },
        color: Color::Gray,
    }
}

/// Teams offered in the selectors: the encoder's teams that have a badge. If that
/// leaves fewer than two, every encoder team is offered and the unknown ones use
/// the default badge. Never returns a team the encoder cannot encode.
pub fn selectable_teams(encoder: &CategoryEncoder) -> Vec<String> {
    let styled = encoder
        .classes()
        .iter()
        .filter(|name| team_style(name).is_some())
        .cloned()
        .collect::<Vec<_>>();
    if styled.len() >= 2 {
        styled
    } else {
        encoder.classes().to_vec()
    }
}
