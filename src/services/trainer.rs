//! Training rows and the per-market fit/evaluate/persist loop.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{EngineError, EngineResult};
use crate::models::Market;
use crate::services::{Classifier, ClassifierTrainer, EngineSnapshot, ModelArtifact, ModelRegistry, FEATURE_NAMES};

pub const SPLIT_SEED: u64 = 42;
pub const TEST_FRACTION: f64 = 0.2;

/// Feature rows plus one label column per market, aligned by index.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub rows: Vec<Vec<f64>>,
    pub labels: BTreeMap<Market, Vec<usize>>,
}

impl TrainingSet {
    /// One row per rating-eligible match that has half-time data, in date order.
    ///
    /// Each row is built as of its own match date, so the match never sees itself.
    pub fn build(snapshot: &EngineSnapshot) -> EngineResult<Self> {
        let matches: Vec<_> = snapshot
            .eligible_matches()
            .iter()
            .filter(|m| m.half_time.is_some())
            .collect();
        if matches.is_empty() {
            return Err(EngineError::TrainingData(
                "no rating-eligible matches with half-time scores".to_string(),
            ));
        }

        let builder = snapshot.feature_builder();
        let rows: Vec<Vec<f64>> = matches
            .par_iter()
            .map(|m| builder.build(&m.home_team, &m.away_team, m.date).to_vec())
            .collect();

        let mut labels = BTreeMap::new();
        for market in Market::ALL {
            let column = matches
                .iter()
                .map(|m| market.label(m))
                .collect::<Option<Vec<usize>>>()
                .ok_or_else(|| EngineError::TrainingData(format!("missing {} label", market)))?;
            labels.insert(market, column);
        }

        tracing::info!("Built {} training rows", rows.len());
        Ok(Self { rows, labels })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn labels_for(&self, market: Market) -> EngineResult<&[usize]> {
        self.labels
            .get(&market)
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::TrainingData(format!("no labels for {}", market)))
    }
}

/// Seeded shuffle of row indices, split into (train, test).
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let test = indices.split_off(n - n_test.min(n));
    (indices, test)
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketReport {
    pub market: Market,
    pub train_rows: usize,
    pub test_rows: usize,
    pub accuracy: f64,
    pub path: PathBuf,
}

/// Fits one classifier per market on the train split, scores it on the held-out split and
/// writes the artifact.
pub struct TrainingPipeline<T> {
    trainer: T,
    registry: ModelRegistry,
    seed: u64,
    test_fraction: f64,
}

impl<T: ClassifierTrainer> TrainingPipeline<T> {
    pub fn new(trainer: T, registry: ModelRegistry) -> Self {
        Self {
            trainer,
            registry,
            seed: SPLIT_SEED,
            test_fraction: TEST_FRACTION,
        }
    }

    pub fn run(&self, set: &TrainingSet) -> EngineResult<Vec<MarketReport>> {
        let (train_idx, test_idx) = split_indices(set.len(), self.test_fraction, self.seed);
        if train_idx.is_empty() || test_idx.is_empty() {
            return Err(EngineError::TrainingData(format!(
                "{} rows is too few to hold out a test split",
                set.len()
            )));
        }
        tracing::info!("Split {} rows: train={}, test={}", set.len(), train_idx.len(), test_idx.len());

        let train_rows = select(&set.rows, &train_idx);
        let test_rows = select(&set.rows, &test_idx);

        let mut reports = Vec::with_capacity(Market::ALL.len());
        for market in Market::ALL {
            let labels = set.labels_for(market)?;
            let train_labels = select(labels, &train_idx);
            let test_labels = select(labels, &test_idx);

            let model = self.trainer.fit(&train_rows, &train_labels, market.n_classes())?;
            let accuracy = accuracy(&model, &test_rows, &test_labels);
            tracing::info!("{} accuracy on held-out split: {:.3}", market, accuracy);

            let path = self.registry.save(&ModelArtifact {
                market,
                feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
                trained_at: Utc::now(),
                train_rows: train_rows.len(),
                test_accuracy: accuracy,
                model,
            })?;

            reports.push(MarketReport {
                market,
                train_rows: train_rows.len(),
                test_rows: test_rows.len(),
                accuracy,
                path,
            });
        }
        Ok(reports)
    }
}

fn select<V: Clone>(values: &[V], indices: &[usize]) -> Vec<V> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

fn accuracy<C: Classifier>(model: &C, rows: &[Vec<f64>], labels: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let correct = rows
        .iter()
        .zip(labels)
        .filter(|(row, label)| model.predict(row) == **label)
        .count();
    correct as f64 / rows.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{HalfTimeScore, MatchRecord};
    use crate::services::{SoftmaxTrainer, FEATURE_COUNT};
    use chrono::{Duration, NaiveDate};

    fn season() -> Vec<MatchRecord> {
        let teams = ["A", "B", "C", "D"];
        let start = NaiveDate::from_ymd_opt(2022, 8, 6).unwrap();
        let mut matches = Vec::new();
        for round in 0..12 {
            for (i, home) in teams.iter().enumerate() {
                let away = teams[(i + 1 + round % 3) % teams.len()];
                if *home == away {
                    continue;
                }
                let home_goals = ((round + i) % 4) as u32;
                let away_goals = ((round * 3 + i) % 3) as u32;
                matches.push(MatchRecord {
                    date: start + Duration::days((round * 7 + i) as i64),
                    home_team: home.to_string(),
                    away_team: away.to_string(),
                    home_goals,
                    away_goals,
                    half_time: if round % 5 == 4 {
                        None
                    } else {
                        Some(HalfTimeScore {
                            home: home_goals.min(1),
                            away: away_goals / 2,
                        })
                    },
                    home_shots_on_target: Some(home_goals + 2),
                    away_shots_on_target: Some(away_goals + 1),
                    home_corners: Some(5),
                    away_corners: Some(4),
                    league: "E0".to_string(),
                });
            }
        }
        matches
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let (train, test) = split_indices(50, TEST_FRACTION, SPLIT_SEED);
        assert_eq!(train.len(), 40);
        assert_eq!(test.len(), 10);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());

        assert_eq!(split_indices(50, TEST_FRACTION, SPLIT_SEED), (train, test));
    }

    #[test]
    fn test_training_set_skips_rows_without_half_time() {
        let matches = season();
        let with_ht = matches.iter().filter(|m| m.half_time.is_some()).count();
        let snapshot = EngineSnapshot::build(matches, &EngineConfig::default()).unwrap();
        let set = TrainingSet::build(&snapshot).unwrap();

        assert_eq!(set.len(), with_ht);
        assert!(set.rows.iter().all(|r| r.len() == FEATURE_COUNT));
        for market in Market::ALL {
            assert_eq!(set.labels_for(market).unwrap().len(), with_ht);
        }
    }

    #[test]
    fn test_rows_follow_match_order() {
        let snapshot = EngineSnapshot::build(season(), &EngineConfig::default()).unwrap();
        let set = TrainingSet::build(&snapshot).unwrap();
        let builder = snapshot.feature_builder();

        let first = snapshot
            .eligible_matches()
            .iter()
            .find(|m| m.half_time.is_some())
            .unwrap();
        let expected = builder.build(&first.home_team, &first.away_team, first.date).to_vec();
        assert_eq!(set.rows[0], expected);
    }

    #[test]
    fn test_pipeline_writes_every_market() {
        let dir = std::env::temp_dir().join(format!("goalcast-train-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let snapshot = EngineSnapshot::build(season(), &EngineConfig::default()).unwrap();
        let set = TrainingSet::build(&snapshot).unwrap();
        let registry = ModelRegistry::new(&dir);
        let reports = TrainingPipeline::new(SoftmaxTrainer::default(), registry.clone())
            .run(&set)
            .unwrap();

        assert_eq!(reports.len(), Market::ALL.len());
        for report in &reports {
            assert!(report.path.exists());
            assert!((0.0..=1.0).contains(&report.accuracy));
            assert_eq!(report.train_rows + report.test_rows, set.len());
            assert!(registry.load(report.market).is_ok());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_pipeline_rejects_tiny_sets() {
        let set = TrainingSet {
            rows: vec![vec![0.0; FEATURE_COUNT]],
            labels: Market::ALL.iter().map(|&m| (m, vec![0])).collect(),
        };
        let registry = ModelRegistry::new(std::env::temp_dir().join("goalcast-unused"));
        assert!(TrainingPipeline::new(SoftmaxTrainer::default(), registry)
            .run(&set)
            .is_err());
    }
}
