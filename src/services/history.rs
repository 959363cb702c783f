//! Date-ordered match table with a per-team row index.
//!
//! Window queries walk a team's rows backwards from a cutoff instead of scanning
//! the whole table.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

use crate::config::RatingEligibility;
use crate::models::MatchRecord;

#[derive(Debug, Clone, Default)]
pub struct MatchHistory {
    matches: Vec<MatchRecord>,
    by_team: HashMap<String, Vec<usize>>,
}

impl MatchHistory {
    /// Sorts by date (stable, so same-day rows keep their input order) and indexes by team.
    pub fn new(mut matches: Vec<MatchRecord>) -> Self {
        matches.sort_by_key(|m| m.date);

        let mut by_team: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, record) in matches.iter().enumerate() {
            by_team.entry(record.home_team.clone()).or_default().push(idx);
            if record.away_team != record.home_team {
                by_team.entry(record.away_team.clone()).or_default().push(idx);
            }
        }

        Self { matches, by_team }
    }

    /// Drops every match played after `cutoff` (inclusive backtest cutoff).
    pub fn with_cutoff(self, cutoff: Option<NaiveDate>) -> Self {
        match cutoff {
            Some(cutoff) => {
                tracing::info!("Backtest mode: keeping matches up to {}", cutoff);
                Self::new(self.matches.into_iter().filter(|m| m.date <= cutoff).collect())
            }
            None => self,
        }
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The team's matches played strictly before `before`, oldest first.
    pub fn team_matches_before<'a>(
        &'a self,
        team: &str,
        before: NaiveDate,
    ) -> impl DoubleEndedIterator<Item = &'a MatchRecord> + 'a {
        let rows: &'a [usize] = self.by_team.get(team).map(Vec::as_slice).unwrap_or(&[]);
        let cut = rows.partition_point(|&idx| self.matches[idx].date < before);
        rows[..cut].iter().map(move |&idx| &self.matches[idx])
    }

    /// The team's last `n` matches, oldest first.
    pub fn recent_matches(&self, team: &str, n: usize) -> Vec<MatchRecord> {
        let rows = self.by_team.get(team).map(Vec::as_slice).unwrap_or(&[]);
        let start = rows.len().saturating_sub(n);
        rows[start..].iter().map(|&idx| self.matches[idx].clone()).collect()
    }

    pub fn contains_team(&self, team: &str) -> bool {
        self.by_team.contains_key(team)
    }

    pub fn teams(&self) -> Vec<String> {
        let mut teams: Vec<String> = self.by_team.keys().cloned().collect();
        teams.sort();
        teams
    }

    pub fn leagues(&self) -> Vec<String> {
        self.matches
            .iter()
            .map(|m| m.league.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn teams_in_league(&self, league: &str) -> Vec<String> {
        self.matches
            .iter()
            .filter(|m| m.league == league)
            .flat_map(|m| [m.home_team.clone(), m.away_team.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Matches that feed the rating pass, in date order.
    pub fn rating_eligible(&self, policy: &RatingEligibility) -> Vec<MatchRecord> {
        self.matches
            .iter()
            .filter(|m| policy.admits(&m.league, m.date))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_match(y: i32, m: u32, d: u32, home: &str, away: &str, league: &str) -> MatchRecord {
        MatchRecord {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: 1,
            away_goals: 0,
            half_time: None,
            home_shots_on_target: None,
            away_shots_on_target: None,
            home_corners: None,
            away_corners: None,
            league: league.to_string(),
        }
    }

    fn sample() -> MatchHistory {
        MatchHistory::new(vec![
            make_match(2024, 3, 1, "A", "B", "E0"),
            make_match(2024, 1, 1, "A", "C", "E0"),
            make_match(2024, 2, 1, "B", "C", "E0"),
            make_match(2024, 4, 1, "Spain", "Italy", "INT"),
        ])
    }

    #[test]
    fn test_rows_sorted_by_date() {
        let history = sample();
        let dates: Vec<_> = history.matches().iter().map(|m| m.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn test_team_matches_before_is_strict() {
        let history = sample();
        let cutoff = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rows: Vec<_> = history.team_matches_before("A", cutoff).collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].away_team, "C");
        assert_eq!(history.team_matches_before("Nobody", cutoff).count(), 0);
    }

    #[test]
    fn test_recent_matches_oldest_first() {
        let history = sample();
        let recent = history.recent_matches("C", 5);
        assert_eq!(recent.len(), 2);
        assert!(recent[0].date < recent[1].date);
        assert_eq!(history.recent_matches("A", 1)[0].away_team, "B");
    }

    #[test]
    fn test_cutoff_and_leagues() {
        let history = sample().with_cutoff(NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(history.len(), 2);
        assert_eq!(history.leagues(), vec!["E0"]);
        assert_eq!(history.teams_in_league("E0"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_rating_eligibility_filter() {
        let history = MatchHistory::new(vec![
            make_match(2018, 5, 1, "A", "B", "E0"),
            make_match(2020, 5, 1, "A", "B", "E0"),
            make_match(2016, 5, 1, "Spain", "Italy", "INT"),
        ]);
        let eligible = history.rating_eligible(&RatingEligibility::default());

        assert_eq!(eligible.len(), 2);
        assert!(eligible[0].date < eligible[1].date);
    }
}
