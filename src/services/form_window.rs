//! Rolling form statistics for one team before a cutoff date.

use chrono::NaiveDate;

use crate::models::{MatchRecord, Outcome, Venue, WindowStats};
use crate::services::{MatchHistory, RatingEngine};

/// Read-only form queries over a finished history and rating pass.
#[derive(Debug, Clone, Copy)]
pub struct FormWindow<'a> {
    history: &'a MatchHistory,
    ratings: &'a RatingEngine,
}

impl<'a> FormWindow<'a> {
    pub fn new(history: &'a MatchHistory, ratings: &'a RatingEngine) -> Self {
        Self { history, ratings }
    }

    /// Aggregates the team's last `n` matches strictly before `before` that pass `venue`.
    pub fn stats(&self, team: &str, before: NaiveDate, n: usize, venue: Venue) -> WindowStats {
        let current_rating = self.ratings.rating_of(team);

        let window = self
            .history
            .team_matches_before(team, before)
            .rev()
            .filter(|m| venue.admits(m, team))
            .take(n);

        let mut acc = FormAccumulator::default();
        for record in window {
            acc.add(record, team);
        }
        acc.finish(current_rating)
    }
}

/// Sums per metric family, each with its own row count.
#[derive(Debug, Default)]
struct FormAccumulator {
    rows: u32,
    scored: u32,
    conceded: u32,
    points: u32,
    ht_rows: u32,
    ht_scored: u32,
    ht_conceded: u32,
    shot_rows: u32,
    shots_for: u32,
    shots_against: u32,
    corners_for: u32,
}

impl FormAccumulator {
    fn add(&mut self, record: &MatchRecord, team: &str) {
        let is_home = record.home_team == team;
        let pick = |home: u32, away: u32| if is_home { (home, away) } else { (away, home) };

        let (scored, conceded) = pick(record.home_goals, record.away_goals);
        self.rows += 1;
        self.scored += scored;
        self.conceded += conceded;
        self.points += match Outcome::from_goals(scored, conceded) {
            Outcome::HomeWin => 3,
            Outcome::Draw => 1,
            Outcome::AwayWin => 0,
        };

        if let Some(ht) = record.half_time {
            let (ht_scored, ht_conceded) = pick(ht.home, ht.away);
            self.ht_rows += 1;
            self.ht_scored += ht_scored;
            self.ht_conceded += ht_conceded;
        }

        if record.has_shot_data() {
            let (shots_for, shots_against) = pick(
                record.home_shots_on_target.unwrap_or(0),
                record.away_shots_on_target.unwrap_or(0),
            );
            let (corners_for, _) = pick(
                record.home_corners.unwrap_or(0),
                record.away_corners.unwrap_or(0),
            );
            self.shot_rows += 1;
            self.shots_for += shots_for;
            self.shots_against += shots_against;
            self.corners_for += corners_for;
        }
    }

    fn finish(self, current_rating: f64) -> WindowStats {
        if self.rows == 0 {
            return WindowStats::empty(current_rating);
        }

        WindowStats {
            matches: self.rows as usize,
            avg_scored: mean(self.scored, self.rows),
            avg_conceded: mean(self.conceded, self.rows),
            avg_points: mean(self.points, self.rows),
            ht_avg_scored: mean(self.ht_scored, self.ht_rows),
            ht_avg_conceded: mean(self.ht_conceded, self.ht_rows),
            avg_shots_on_target: mean(self.shots_for, self.shot_rows),
            avg_shots_conceded: mean(self.shots_against, self.shot_rows),
            avg_corners: mean(self.corners_for, self.shot_rows),
            current_rating,
        }
    }
}

fn mean(total: u32, count: u32) -> f64 {
    if count == 0 {
        0.0
    } else {
        f64::from(total) / f64::from(count)
    }
}
