use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::services::FeatureVector;

/// Half-time score, present only when the source reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfTimeScore {
    pub home: u32,
    pub away: u32,
}

/// One finished fixture as delivered by ingestion. Absent detail columns stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub half_time: Option<HalfTimeScore>,
    pub home_shots_on_target: Option<u32>,
    pub away_shots_on_target: Option<u32>,
    pub home_corners: Option<u32>,
    pub away_corners: Option<u32>,
    pub league: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

impl Outcome {
    pub fn from_goals(home: u32, away: u32) -> Self {
        match home.cmp(&away) {
            Ordering::Greater => Outcome::HomeWin,
            Ordering::Equal => Outcome::Draw,
            Ordering::Less => Outcome::AwayWin,
        }
    }

    /// Ordinal class used by the result markets: away-win 0, draw 1, home-win 2.
    pub fn class_index(self) -> usize {
        match self {
            Outcome::AwayWin => 0,
            Outcome::Draw => 1,
            Outcome::HomeWin => 2,
        }
    }
}

impl MatchRecord {
    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    pub fn opponent_of(&self, team: &str) -> Option<&str> {
        if self.home_team == team {
            Some(&self.away_team)
        } else if self.away_team == team {
            Some(&self.home_team)
        } else {
            None
        }
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_goals(self.home_goals, self.away_goals)
    }

    pub fn total_goals(&self) -> u32 {
        self.home_goals + self.away_goals
    }

    /// Team that won the match, `None` for a draw.
    pub fn winner(&self) -> Option<&str> {
        match self.outcome() {
            Outcome::HomeWin => Some(&self.home_team),
            Outcome::AwayWin => Some(&self.away_team),
            Outcome::Draw => None,
        }
    }

    /// Shot data counts as recorded only if one side reports a non-zero shots-on-target value.
    pub fn has_shot_data(&self) -> bool {
        self.home_shots_on_target.unwrap_or(0) > 0 || self.away_shots_on_target.unwrap_or(0) > 0
    }
}

/// Venue filter for a team's form window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    All,
    Home,
    Away,
}

impl Venue {
    /// Whether `record` counts toward `team`'s window under this filter.
    pub fn admits(self, record: &MatchRecord, team: &str) -> bool {
        match self {
            Venue::All => record.involves(team),
            Venue::Home => record.home_team == team,
            Venue::Away => record.away_team == team,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::All => write!(f, "all"),
            Venue::Home => write!(f, "home"),
            Venue::Away => write!(f, "away"),
        }
    }
}

/// Aggregate form of one team over its last N qualifying matches before a cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WindowStats {
    /// Rows selected into the window (goal and point metrics divide by this).
    pub matches: usize,
    pub avg_scored: f64,
    pub avg_conceded: f64,
    pub avg_points: f64,
    pub ht_avg_scored: f64,
    pub ht_avg_conceded: f64,
    pub avg_shots_on_target: f64,
    pub avg_shots_conceded: f64,
    pub avg_corners: f64,
    pub current_rating: f64,
}

impl WindowStats {
    pub fn empty(current_rating: f64) -> Self {
        Self {
            current_rating,
            ..Self::default()
        }
    }
}

/// Head-to-head record between two teams, from the first team's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct H2HStats {
    pub meetings: usize,
    pub home_win_rate: f64,
    pub away_win_rate: f64,
    pub draw_rate: f64,
    pub avg_goals: f64,
}

/// Rating of a team right after one of its matches was applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub date: NaiveDate,
    pub rating: f64,
}

/// Prediction markets, each backed by its own classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Over15,
    Over25,
    Over35,
    Btts,
    Result,
    HtResult,
    HtOver05,
}

impl Market {
    pub const ALL: [Market; 7] = [
        Market::Over15,
        Market::Over25,
        Market::Over35,
        Market::Btts,
        Market::Result,
        Market::HtResult,
        Market::HtOver05,
    ];

    /// Artifact key for the market.
    pub fn name(self) -> &'static str {
        match self {
            Market::Over15 => "over15",
            Market::Over25 => "over25",
            Market::Over35 => "over35",
            Market::Btts => "btts",
            Market::Result => "result",
            Market::HtResult => "ht_result",
            Market::HtOver05 => "ht_over05",
        }
    }

    pub fn n_classes(self) -> usize {
        match self {
            Market::Result | Market::HtResult => 3,
            _ => 2,
        }
    }

    /// Label of a finished match for this market. `None` when the match lacks half-time data
    /// and the market needs it.
    pub fn label(self, record: &MatchRecord) -> Option<usize> {
        let total = record.total_goals();
        let label = match self {
            Market::Over15 => usize::from(total > 1),
            Market::Over25 => usize::from(total > 2),
            Market::Over35 => usize::from(total > 3),
            Market::Btts => usize::from(record.home_goals > 0 && record.away_goals > 0),
            Market::Result => record.outcome().class_index(),
            Market::HtResult => {
                let ht = record.half_time?;
                Outcome::from_goals(ht.home, ht.away).class_index()
            }
            Market::HtOver05 => {
                let ht = record.half_time?;
                usize::from(ht.home + ht.away > 0)
            }
        };
        Some(label)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Probabilities for every market, with complements filled in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MarketProbabilities {
    pub over15: f64,
    pub under15: f64,
    pub over25: f64,
    pub under25: f64,
    pub over35: f64,
    pub under35: f64,
    pub btts_yes: f64,
    pub btts_no: f64,
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
    pub ht_home: f64,
    pub ht_draw: f64,
    pub ht_away: f64,
    pub ht_over05: f64,
    pub ht_under05: f64,
}

impl MarketProbabilities {
    /// Applies `f` to every entry, e.g. to turn probabilities into fair odds.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            over15: f(self.over15),
            under15: f(self.under15),
            over25: f(self.over25),
            under25: f(self.under25),
            over35: f(self.over35),
            under35: f(self.under35),
            btts_yes: f(self.btts_yes),
            btts_no: f(self.btts_no),
            home_win: f(self.home_win),
            draw: f(self.draw),
            away_win: f(self.away_win),
            ht_home: f(self.ht_home),
            ht_draw: f(self.ht_draw),
            ht_away: f(self.ht_away),
            ht_over05: f(self.ht_over05),
            ht_under05: f(self.ht_under05),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchPrediction {
    pub home_team: String,
    pub away_team: String,
    pub as_of: NaiveDate,
    pub probabilities: MarketProbabilities,
    pub home_rating: f64,
    pub away_rating: f64,
    pub features: FeatureVector,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRating {
    pub team: String,
    pub rating: f64,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(home_goals: u32, away_goals: u32, half_time: Option<(u32, u32)>) -> MatchRecord {
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            home_goals,
            away_goals,
            half_time: half_time.map(|(home, away)| HalfTimeScore { home, away }),
            home_shots_on_target: None,
            away_shots_on_target: None,
            home_corners: None,
            away_corners: None,
            league: "E0".to_string(),
        }
    }

    #[test]
    fn test_market_labels() {
        let m = record(2, 1, Some((0, 0)));
        assert_eq!(Market::Over15.label(&m), Some(1));
        assert_eq!(Market::Over25.label(&m), Some(1));
        assert_eq!(Market::Over35.label(&m), Some(0));
        assert_eq!(Market::Btts.label(&m), Some(1));
        assert_eq!(Market::Result.label(&m), Some(2));
        assert_eq!(Market::HtResult.label(&m), Some(1));
        assert_eq!(Market::HtOver05.label(&m), Some(0));
    }

    #[test]
    fn test_half_time_markets_need_half_time_data() {
        let m = record(0, 3, None);
        assert_eq!(Market::Result.label(&m), Some(0));
        assert_eq!(Market::Btts.label(&m), Some(0));
        assert_eq!(Market::HtResult.label(&m), None);
        assert_eq!(Market::HtOver05.label(&m), None);
    }

    #[test]
    fn test_shot_data_presence() {
        let mut m = record(1, 1, None);
        assert!(!m.has_shot_data());
        m.home_shots_on_target = Some(0);
        m.away_shots_on_target = Some(0);
        assert!(!m.has_shot_data());
        m.away_shots_on_target = Some(4);
        assert!(m.has_shot_data());
    }

    #[test]
    fn test_venue_filter() {
        let m = record(1, 0, None);
        assert!(Venue::All.admits(&m, "Chelsea"));
        assert!(Venue::Home.admits(&m, "Arsenal"));
        assert!(!Venue::Home.admits(&m, "Chelsea"));
        assert!(Venue::Away.admits(&m, "Chelsea"));
        assert!(!Venue::All.admits(&m, "Everton"));
    }
}
