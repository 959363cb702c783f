use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::RatingConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{MatchRecord, RatingPoint};

/// Elo-style team strength ratings, driven by one ordered pass over match history.
///
/// The engine owns the rating map outright. Ratings are path dependent, so matches must be
/// applied in ascending date order and each exactly once.
#[derive(Debug, Clone)]
pub struct RatingEngine {
    ratings: HashMap<String, f64>,
    history: HashMap<String, Vec<RatingPoint>>,
    config: RatingConfig,
    matches_applied: usize,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self::new(RatingConfig::default())
    }
}

impl RatingEngine {
    pub fn new(config: RatingConfig) -> Self {
        Self {
            ratings: HashMap::new(),
            history: HashMap::new(),
            config,
            matches_applied: 0,
        }
    }

    /// Runs the full rating pass: seeds every participating team, sorts once by date, folds.
    pub fn process(matches: &[MatchRecord], config: RatingConfig) -> EngineResult<Self> {
        if matches.is_empty() {
            return Err(EngineError::EmptyHistory);
        }

        let mut ordered: Vec<&MatchRecord> = matches.iter().collect();
        ordered.sort_by_key(|m| m.date);

        let initial = config.initial_rating;
        let mut engine = Self::new(config);
        engine.initialize(
            ordered
                .iter()
                .flat_map(|m| [m.home_team.as_str(), m.away_team.as_str()]),
            initial,
        );

        for record in ordered {
            engine.apply(record);
        }

        tracing::info!(
            "Rating pass complete: {} matches, {} teams",
            engine.matches_applied,
            engine.ratings.len()
        );
        Ok(engine)
    }

    pub fn initialize<'a, I>(&mut self, teams: I, initial_rating: f64)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.config.initial_rating = initial_rating;
        for team in teams {
            self.ratings.insert(team.to_string(), initial_rating);
        }
    }

    /// Calculate expected score based on ELO ratings
    pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / 400.0))
    }

    /// New ratings for both sides, computed from the pre-match ratings only.
    pub fn update_ratings(
        &self,
        home_rating: f64,
        away_rating: f64,
        home_goals: u32,
        away_goals: u32,
        weight: f64,
    ) -> (f64, f64) {
        let expected_home = Self::expected_score(home_rating, away_rating);
        let expected_away = 1.0 - expected_home;

        let actual_home = match home_goals.cmp(&away_goals) {
            Ordering::Greater => 1.0,
            Ordering::Equal => 0.5,
            Ordering::Less => 0.0,
        };
        let actual_away = 1.0 - actual_home;

        let k = self.config.k_factor * weight;
        (
            home_rating + k * (actual_home - expected_home),
            away_rating + k * (actual_away - expected_away),
        )
    }

    /// Applies one finished match. Not idempotent: applying it again counts it again.
    pub fn apply(&mut self, record: &MatchRecord) {
        let home_rating = self.rating_of(&record.home_team);
        let away_rating = self.rating_of(&record.away_team);
        let weight = self.config.league_weights.weight(&record.league);

        let (new_home, new_away) = self.update_ratings(
            home_rating,
            away_rating,
            record.home_goals,
            record.away_goals,
            weight,
        );

        self.set_rating(&record.home_team, record, new_home);
        self.set_rating(&record.away_team, record, new_away);
        self.matches_applied += 1;

        tracing::trace!(
            "{} {}-{} {}: {:.1} -> {:.1}, {:.1} -> {:.1}",
            record.home_team,
            record.home_goals,
            record.away_goals,
            record.away_team,
            home_rating,
            new_home,
            away_rating,
            new_away
        );
    }

    fn set_rating(&mut self, team: &str, record: &MatchRecord, rating: f64) {
        self.ratings.insert(team.to_string(), rating);
        self.history
            .entry(team.to_string())
            .or_default()
            .push(RatingPoint {
                date: record.date,
                rating,
            });
    }

    /// Current rating, or the initial rating for a team the engine has never seen.
    pub fn rating_of(&self, team: &str) -> f64 {
        self.ratings
            .get(team)
            .copied()
            .unwrap_or(self.config.initial_rating)
    }

    pub fn history_of(&self, team: &str) -> &[RatingPoint] {
        self.history.get(team).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Teams sorted by rating, strongest first.
    pub fn leaderboard(&self, limit: usize) -> Vec<(String, f64)> {
        let mut table: Vec<(String, f64)> = self
            .ratings
            .iter()
            .map(|(team, rating)| (team.clone(), *rating))
            .collect();
        table.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        table.truncate(limit);
        table
    }

    pub fn team_count(&self) -> usize {
        self.ratings.len()
    }

    pub fn matches_applied(&self) -> usize {
        self.matches_applied
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::LeagueWeights;

    fn make_match(day: u32, home: &str, away: &str, home_goals: u32, away_goals: u32) -> MatchRecord {
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals,
            away_goals,
            half_time: None,
            home_shots_on_target: None,
            away_shots_on_target: None,
            home_corners: None,
            away_corners: None,
            league: "E0".to_string(),
        }
    }

    fn unit_config() -> RatingConfig {
        RatingConfig {
            k_factor: 30.0,
            initial_rating: 1500.0,
            league_weights: LeagueWeights::new(0.5).with("E0", 1.0),
        }
    }

    #[test]
    fn test_unseen_team_gets_initial_rating() {
        let engine = RatingEngine::default();
        assert_eq!(engine.rating_of("Nobody FC"), 1500.0);
    }

    #[test]
    fn test_expected_score_equal_ratings() {
        assert!((RatingEngine::expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
        assert!(RatingEngine::expected_score(1600.0, 1500.0) > 0.5);
    }

    #[test]
    fn test_home_win_scenario() {
        let mut engine = RatingEngine::new(unit_config());
        engine.initialize(["A", "B"], 1500.0);
        engine.apply(&make_match(1, "A", "B", 2, 0));

        assert!((engine.rating_of("A") - 1515.0).abs() < 1e-9);
        assert!((engine.rating_of("B") - 1485.0).abs() < 1e-9);
    }

    #[test]
    fn test_league_weight_scales_update() {
        let mut engine = RatingEngine::new(unit_config());
        let mut m = make_match(1, "A", "B", 1, 0);
        m.league = "ZZ".to_string();
        engine.apply(&m);

        assert!((engine.rating_of("A") - 1507.5).abs() < 1e-9);
    }

    #[test]
    fn test_draw_deltas_cancel() {
        let mut engine = RatingEngine::new(unit_config());
        engine.apply(&make_match(1, "A", "C", 3, 0));
        engine.apply(&make_match(2, "B", "D", 0, 1));

        let (a_before, b_before) = (engine.rating_of("A"), engine.rating_of("B"));
        engine.apply(&make_match(3, "A", "B", 1, 1));
        let home_delta = engine.rating_of("A") - a_before;
        let away_delta = engine.rating_of("B") - b_before;

        assert!(home_delta < 0.0);
        assert!((home_delta + away_delta).abs() < 1e-9);
    }

    #[test]
    fn test_updates_use_pre_match_ratings() {
        let engine = RatingEngine::new(unit_config());
        let (home, away) = engine.update_ratings(1600.0, 1400.0, 0, 1, 1.0);
        let expected_home = RatingEngine::expected_score(1600.0, 1400.0);

        assert!((home - (1600.0 - 30.0 * expected_home)).abs() < 1e-9);
        assert!((away - (1400.0 + 30.0 * expected_home)).abs() < 1e-9);
    }

    #[test]
    fn test_order_sensitivity() {
        let m1 = make_match(1, "A", "B", 2, 0);
        let m2 = make_match(2, "B", "C", 3, 1);

        let mut forward = RatingEngine::new(unit_config());
        forward.apply(&m1);
        forward.apply(&m2);

        let mut reversed = RatingEngine::new(unit_config());
        reversed.apply(&m2);
        reversed.apply(&m1);

        assert_ne!(forward.rating_of("B"), reversed.rating_of("B"));
    }

    #[test]
    fn test_apply_twice_double_counts() {
        let m = make_match(1, "A", "B", 2, 0);
        let mut engine = RatingEngine::new(unit_config());
        engine.apply(&m);
        let once = engine.rating_of("A");
        engine.apply(&m);

        assert!(engine.rating_of("A") > once);
        assert_eq!(engine.matches_applied(), 2);
    }

    #[test]
    fn test_process_sorts_by_date() {
        let m1 = make_match(1, "A", "B", 2, 0);
        let m2 = make_match(2, "B", "C", 3, 1);

        let shuffled = RatingEngine::process(&[m2.clone(), m1.clone()], unit_config()).unwrap();
        let ordered = RatingEngine::process(&[m1, m2], unit_config()).unwrap();

        assert_eq!(shuffled.rating_of("B"), ordered.rating_of("B"));
        assert_eq!(ordered.history_of("B").len(), 2);
        assert_eq!(ordered.team_count(), 3);
    }

    #[test]
    fn test_process_rejects_empty_history() {
        assert!(matches!(
            RatingEngine::process(&[], unit_config()),
            Err(EngineError::EmptyHistory)
        ));
    }

    #[test]
    fn test_leaderboard_sorted_descending() {
        let engine = RatingEngine::process(
            &[make_match(1, "A", "B", 2, 0), make_match(2, "C", "B", 1, 0)],
            unit_config(),
        )
        .unwrap();
        let table = engine.leaderboard(2);

        assert_eq!(table.len(), 2);
        assert!(table[0].1 >= table[1].1);
        assert!(table.iter().all(|(team, _)| team != "B"));
    }
}
