//! Fixed-schema feature vectors shared by training and inference.
//!
//! The field list below is the only place the schema is declared. The struct, the
//! name table and the ordered array all come from it, so a training row and a live
//! fixture can never disagree on field order. Changing the list means retraining every
//! market.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::WindowConfig;
use crate::models::Venue;
use crate::services::{FormWindow, HeadToHeadWindow, MatchHistory, RatingEngine};

macro_rules! feature_schema {
    ($($field:ident),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        pub struct FeatureVector {
            $(pub $field: f64,)+
        }

        /// Field names in model-input order.
        pub const FEATURE_NAMES: &[&str] = &[$(stringify!($field)),+];

        impl FeatureVector {
            /// Values in model-input order.
            pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
                [$(self.$field),+]
            }
        }
    };
}

feature_schema! {
    // Ratings
    elo_diff,
    elo_home,
    elo_away,
    // General form
    h_gen_points,
    a_gen_points,
    h_gen_scored,
    a_gen_scored,
    // Home side at home
    h_home_points,
    h_home_scored,
    h_home_conceded,
    h_home_sot,
    h_home_sot_c,
    h_home_corn,
    // Away side away
    a_away_points,
    a_away_scored,
    a_away_conceded,
    a_away_sot,
    a_away_sot_c,
    a_away_corn,
    // Half time
    h_ht_scored,
    a_ht_scored,
    h_ht_conceded,
    a_ht_conceded,
    // Head to head
    h2h_home_win_rate,
    h2h_draw_rate,
    h2h_avg_goals,
}

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

impl FeatureVector {
    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.iter().copied().zip(self.to_vec())
    }
}

/// Builds one feature vector per (home, away, as-of date). Pure: no I/O, no mutation.
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder<'a> {
    form: FormWindow<'a>,
    h2h: HeadToHeadWindow<'a>,
    ratings: &'a RatingEngine,
    windows: WindowConfig,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(history: &'a MatchHistory, ratings: &'a RatingEngine, windows: WindowConfig) -> Self {
        Self {
            form: FormWindow::new(history, ratings),
            h2h: HeadToHeadWindow::new(history),
            ratings,
            windows,
        }
    }

    /// For a historical row pass the match date, which excludes the match itself from
    /// every window. For a live fixture pass today.
    pub fn build(&self, home_team: &str, away_team: &str, as_of: NaiveDate) -> FeatureVector {
        let n = self.windows.form_matches;

        let h_gen = self.form.stats(home_team, as_of, n, Venue::All);
        let a_gen = self.form.stats(away_team, as_of, n, Venue::All);
        let h_home = self.form.stats(home_team, as_of, n, Venue::Home);
        let a_away = self.form.stats(away_team, as_of, n, Venue::Away);
        let h2h = self
            .h2h
            .stats(home_team, away_team, as_of, self.windows.h2h_meetings);

        let elo_home = self.ratings.rating_of(home_team);
        let elo_away = self.ratings.rating_of(away_team);

        FeatureVector {
            elo_diff: elo_home - elo_away,
            elo_home,
            elo_away,

            h_gen_points: h_gen.avg_points,
            a_gen_points: a_gen.avg_points,
            h_gen_scored: h_gen.avg_scored,
            a_gen_scored: a_gen.avg_scored,

            h_home_points: h_home.avg_points,
            h_home_scored: h_home.avg_scored,
            h_home_conceded: h_home.avg_conceded,
            h_home_sot: h_home.avg_shots_on_target,
            h_home_sot_c: h_home.avg_shots_conceded,
            h_home_corn: h_home.avg_corners,

            a_away_points: a_away.avg_points,
            a_away_scored: a_away.avg_scored,
            a_away_conceded: a_away.avg_conceded,
            a_away_sot: a_away.avg_shots_on_target,
            a_away_sot_c: a_away.avg_shots_conceded,
            a_away_corn: a_away.avg_corners,

            h_ht_scored: h_home.ht_avg_scored,
            a_ht_scored: a_away.ht_avg_scored,
            h_ht_conceded: h_home.ht_avg_conceded,
            a_ht_conceded: a_away.ht_avg_conceded,

            h2h_home_win_rate: h2h.home_win_rate,
            h2h_draw_rate: h2h.draw_rate,
            h2h_avg_goals: h2h.avg_goals,
        }
    }
}
