use chrono::NaiveDate;

use crate::models::H2HStats;
use crate::services::MatchHistory;

/// Average combined goals reported when two teams have never met.
pub const NO_MEETINGS_AVG_GOALS: f64 = 2.5;

/// Past meetings between two specific teams, in either venue orientation.
#[derive(Debug, Clone, Copy)]
pub struct HeadToHeadWindow<'a> {
    history: &'a MatchHistory,
}

impl<'a> HeadToHeadWindow<'a> {
    pub fn new(history: &'a MatchHistory) -> Self {
        Self { history }
    }

    /// Record over the last `n` meetings before `before`, from `home_team`'s side.
    pub fn stats(&self, home_team: &str, away_team: &str, before: NaiveDate, n: usize) -> H2HStats {
        let meetings = self
            .history
            .team_matches_before(home_team, before)
            .rev()
            .filter(|m| m.opponent_of(home_team) == Some(away_team))
            .take(n);

        let (mut count, mut home_wins, mut away_wins, mut draws, mut goals) = (0u32, 0u32, 0u32, 0u32, 0u32);
        for meeting in meetings {
            count += 1;
            goals += meeting.total_goals();
            match meeting.winner() {
                Some(winner) if winner == home_team => home_wins += 1,
                Some(_) => away_wins += 1,
                None => draws += 1,
            }
        }

        if count == 0 {
            return H2HStats {
                meetings: 0,
                home_win_rate: 0.0,
                away_win_rate: 0.0,
                draw_rate: 0.0,
                avg_goals: NO_MEETINGS_AVG_GOALS,
            };
        }

        let total = f64::from(count);
        H2HStats {
            meetings: count as usize,
            home_win_rate: f64::from(home_wins) / total,
            away_win_rate: f64::from(away_wins) / total,
            draw_rate: f64::from(draws) / total,
            avg_goals: f64::from(goals) / total,
        }
    }
}
