use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::models::{Market, MarketProbabilities, MatchPrediction, MatchRecord};
use crate::services::{calibrate_goal_lines, Classifier, EngineSnapshot, ModelRegistry, GOAL_LINE_EPSILON};
use crate::utils::closest_team_names;

/// Answers fixture queries against one engine snapshot and one classifier per market.
pub struct PredictionService {
    snapshot: Arc<EngineSnapshot>,
    models: HashMap<Market, Box<dyn Classifier>>,
}

impl PredictionService {
    pub fn new(snapshot: Arc<EngineSnapshot>, models: HashMap<Market, Box<dyn Classifier>>) -> EngineResult<Self> {
        for (market, model) in &models {
            if model.n_classes() != market.n_classes() {
                return Err(EngineError::InvalidModel(format!(
                    "{} model has {} classes, expected {}",
                    market,
                    model.n_classes(),
                    market.n_classes()
                )));
            }
        }
        Ok(Self { snapshot, models })
    }

    /// Loads every market's artifact. Fails on the first market that has not been trained.
    pub fn from_registry(snapshot: Arc<EngineSnapshot>, registry: &ModelRegistry) -> EngineResult<Self> {
        let mut models: HashMap<Market, Box<dyn Classifier>> = HashMap::new();
        for market in Market::ALL {
            let artifact = registry.load(market)?;
            tracing::debug!(
                "Loaded {} model trained {} (held-out accuracy {:.3})",
                market,
                artifact.trained_at,
                artifact.test_accuracy
            );
            models.insert(market, Box::new(artifact.model));
        }
        Self::new(snapshot, models)
    }

    /// Prediction for a fixture played today.
    pub fn predict(&self, home_team: &str, away_team: &str) -> EngineResult<MatchPrediction> {
        self.predict_as_of(home_team, away_team, Utc::now().date_naive())
    }

    pub fn predict_as_of(&self, home_team: &str, away_team: &str, as_of: NaiveDate) -> EngineResult<MatchPrediction> {
        let home_team = home_team.trim();
        let away_team = away_team.trim();
        if home_team.is_empty() || away_team.is_empty() {
            return Err(EngineError::InvalidRequest("team names must not be empty".to_string()));
        }
        if home_team == away_team {
            return Err(EngineError::InvalidRequest(format!(
                "{} cannot play itself",
                home_team
            )));
        }

        for team in [home_team, away_team] {
            if !self.snapshot.history().contains_team(team) {
                tracing::warn!("{} has no match history, using default rating and empty form", team);
            }
        }

        let features = self.snapshot.feature_builder().build(home_team, away_team, as_of);
        let x = features.to_vec();

        let over15 = self.positive_class(Market::Over15, &x)?;
        let over25 = self.positive_class(Market::Over25, &x)?;
        let over35 = self.positive_class(Market::Over35, &x)?;
        let btts_yes = self.positive_class(Market::Btts, &x)?;
        let ht_over05 = self.positive_class(Market::HtOver05, &x)?;
        let result = self.distribution(Market::Result, &x)?;
        let ht_result = self.distribution(Market::HtResult, &x)?;

        let mut probabilities = MarketProbabilities {
            over15,
            over25,
            over35,
            btts_yes,
            btts_no: 1.0 - btts_yes,
            away_win: result[0],
            draw: result[1],
            home_win: result[2],
            ht_away: ht_result[0],
            ht_draw: ht_result[1],
            ht_home: ht_result[2],
            ht_over05,
            ht_under05: 1.0 - ht_over05,
            ..Default::default()
        };
        calibrate_goal_lines(&mut probabilities, GOAL_LINE_EPSILON);

        let ratings = self.snapshot.ratings();
        Ok(MatchPrediction {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            as_of,
            probabilities,
            home_rating: ratings.rating_of(home_team),
            away_rating: ratings.rating_of(away_team),
            features,
        })
    }

    /// The team's last `n` matches, oldest first.
    pub fn recent_matches(&self, team: &str, n: usize) -> Vec<MatchRecord> {
        self.snapshot.history().recent_matches(team, n)
    }

    /// Known team names closest to `name`, best match first.
    pub fn suggest_teams(&self, name: &str, limit: usize) -> Vec<String> {
        closest_team_names(name, &self.snapshot.history().teams(), limit)
    }

    fn distribution(&self, market: Market, x: &[f64]) -> EngineResult<Vec<f64>> {
        let model = self.models.get(&market).ok_or_else(|| EngineError::ModelNotTrained {
            market: market.name().to_string(),
        })?;
        let proba = model.predict_proba(x);
        if proba.len() != market.n_classes() {
            return Err(EngineError::InvalidModel(format!(
                "{} model returned {} probabilities",
                market,
                proba.len()
            )));
        }
        Ok(proba)
    }

    fn positive_class(&self, market: Market, x: &[f64]) -> EngineResult<f64> {
        Ok(self.distribution(market, x)?[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::HalfTimeScore;

    struct Fixed(Vec<f64>);

    impl Classifier for Fixed {
        fn n_classes(&self) -> usize {
            self.0.len()
        }

        fn predict_proba(&self, _features: &[f64]) -> Vec<f64> {
            self.0.clone()
        }
    }

    /// Home-win probability rises with the rating gap in the first feature.
    struct RatingGap;

    impl Classifier for RatingGap {
        fn n_classes(&self) -> usize {
            3
        }

        fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
            let home = 1.0 / (1.0 + (-features[0] / 100.0).exp());
            vec![(1.0 - home) * 0.7, (1.0 - home) * 0.3, home]
        }
    }

    fn make_match(day: u32, home: &str, away: &str, home_goals: u32, away_goals: u32) -> MatchRecord {
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2023, 9, day).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals,
            away_goals,
            half_time: Some(HalfTimeScore { home: 0, away: 0 }),
            home_shots_on_target: None,
            away_shots_on_target: None,
            home_corners: None,
            away_corners: None,
            league: "E0".to_string(),
        }
    }

    fn snapshot() -> Arc<EngineSnapshot> {
        let matches = vec![
            make_match(1, "Arsenal", "Chelsea", 3, 0),
            make_match(8, "Chelsea", "Everton", 0, 1),
            make_match(15, "Everton", "Arsenal", 0, 2),
        ];
        Arc::new(EngineSnapshot::build(matches, &EngineConfig::default()).unwrap())
    }

    fn models(over: [f64; 3], result: Box<dyn Classifier>) -> HashMap<Market, Box<dyn Classifier>> {
        let mut models: HashMap<Market, Box<dyn Classifier>> = HashMap::new();
        models.insert(Market::Over15, Box::new(Fixed(vec![1.0 - over[0], over[0]])));
        models.insert(Market::Over25, Box::new(Fixed(vec![1.0 - over[1], over[1]])));
        models.insert(Market::Over35, Box::new(Fixed(vec![1.0 - over[2], over[2]])));
        models.insert(Market::Btts, Box::new(Fixed(vec![0.45, 0.55])));
        models.insert(Market::Result, result);
        models.insert(Market::HtResult, Box::new(Fixed(vec![0.3, 0.4, 0.3])));
        models.insert(Market::HtOver05, Box::new(Fixed(vec![0.25, 0.75])));
        models
    }

    fn service(over: [f64; 3]) -> PredictionService {
        PredictionService::new(snapshot(), models(over, Box::new(RatingGap))).unwrap()
    }

    #[test]
    fn test_goal_lines_are_monotone() {
        let prediction = service([0.5, 0.7, 0.9]).predict("Arsenal", "Chelsea").unwrap();
        let p = prediction.probabilities;

        assert!(p.over15 >= p.over25);
        assert!(p.over25 >= p.over35);
        assert!((p.over25 + p.under25 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_multiclass_markets_sum_to_one() {
        let p = service([0.8, 0.5, 0.2])
            .predict("Arsenal", "Chelsea")
            .unwrap()
            .probabilities;

        assert!((p.home_win + p.draw + p.away_win - 1.0).abs() < 1e-9);
        assert!((p.ht_home + p.ht_draw + p.ht_away - 1.0).abs() < 1e-9);
        assert!((p.btts_yes + p.btts_no - 1.0).abs() < 1e-12);
        assert!((p.ht_over05 + p.ht_under05 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_stronger_home_side_is_favoured() {
        let svc = service([0.8, 0.5, 0.2]);
        let strong = svc.predict("Arsenal", "Chelsea").unwrap();
        let weak = svc.predict("Chelsea", "Arsenal").unwrap();

        assert!(strong.home_rating > strong.away_rating);
        assert!(strong.probabilities.home_win > weak.probabilities.home_win);
    }

    #[test]
    fn test_same_team_is_invalid() {
        assert!(matches!(
            service([0.8, 0.5, 0.2]).predict("Arsenal", "Arsenal"),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_unknown_team_uses_defaults() {
        let prediction = service([0.8, 0.5, 0.2]).predict("Arsenal", "Wrexham").unwrap();
        assert_eq!(prediction.away_rating, 1500.0);
        assert_eq!(prediction.features.a_gen_points, 0.0);
    }

    #[test]
    fn test_missing_market_is_not_trained() {
        let mut partial = models([0.8, 0.5, 0.2], Box::new(RatingGap));
        partial.remove(&Market::Btts);
        let svc = PredictionService::new(snapshot(), partial).unwrap();

        match svc.predict("Arsenal", "Chelsea") {
            Err(EngineError::ModelNotTrained { market }) => assert_eq!(market, "btts"),
            other => panic!("unexpected: {:?}", other.map(|p| p.home_team)),
        }
    }

    #[test]
    fn test_wrong_class_count_rejected() {
        let bad = models([0.8, 0.5, 0.2], Box::new(Fixed(vec![0.5, 0.5])));
        assert!(matches!(
            PredictionService::new(snapshot(), bad),
            Err(EngineError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_recent_matches_and_suggestions() {
        let svc = service([0.8, 0.5, 0.2]);
        let recent = svc.recent_matches("Arsenal", 1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].home_team, "Everton");

        assert_eq!(svc.suggest_teams("Arsenl", 1), vec!["Arsenal".to_string()]);
    }
}
