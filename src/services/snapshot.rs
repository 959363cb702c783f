use crate::config::{EngineConfig, WindowConfig};
use crate::error::{EngineError, EngineResult};
use crate::models::MatchRecord;
use crate::services::{FeatureBuilder, MatchHistory, RatingEngine};

/// A loaded match table together with its finished rating pass.
///
/// Built once per data load and then only read. Replacing the data means building a new
/// snapshot, never mutating this one.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    history: MatchHistory,
    ratings: RatingEngine,
    eligible: Vec<MatchRecord>,
    windows: WindowConfig,
}

impl EngineSnapshot {
    pub fn build(matches: Vec<MatchRecord>, config: &EngineConfig) -> EngineResult<Self> {
        let history = MatchHistory::new(matches).with_cutoff(config.cutoff_date);
        if history.is_empty() {
            return Err(EngineError::EmptyHistory);
        }

        let eligible = history.rating_eligible(&config.eligibility);
        tracing::info!(
            "Loaded {} matches, {} eligible for ratings",
            history.len(),
            eligible.len()
        );
        let ratings = RatingEngine::process(&eligible, config.rating.clone())?;

        Ok(Self {
            history,
            ratings,
            eligible,
            windows: config.windows,
        })
    }

    pub fn history(&self) -> &MatchHistory {
        &self.history
    }

    pub fn ratings(&self) -> &RatingEngine {
        &self.ratings
    }

    /// Rating-eligible matches in date order.
    pub fn eligible_matches(&self) -> &[MatchRecord] {
        &self.eligible
    }

    pub fn windows(&self) -> WindowConfig {
        self.windows
    }

    pub fn feature_builder(&self) -> FeatureBuilder<'_> {
        FeatureBuilder::new(&self.history, &self.ratings, self.windows)
    }
}
