use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::config::INTERNATIONAL_LEAGUE;
use crate::error::EngineResult;
use crate::models::{HalfTimeScore, MatchRecord};
use crate::utils::clean_team_name;

const FOOTBALL_DATA_BASE: &str = "https://www.football-data.co.uk/mmz4281";
const INTERNATIONAL_RESULTS_URL: &str =
    "https://raw.githubusercontent.com/martj42/international_results/master/results.csv";
const SEASONS_TO_FETCH: i32 = 4;

// ── football-data.co.uk rows ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FootballDataRow {
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(rename = "HomeTeam", default)]
    home_team: Option<String>,
    #[serde(rename = "AwayTeam", default)]
    away_team: Option<String>,
    #[serde(rename = "FTHG", default, deserialize_with = "csv::invalid_option")]
    home_goals: Option<u32>,
    #[serde(rename = "FTAG", default, deserialize_with = "csv::invalid_option")]
    away_goals: Option<u32>,
    #[serde(rename = "HTHG", default, deserialize_with = "csv::invalid_option")]
    ht_home_goals: Option<u32>,
    #[serde(rename = "HTAG", default, deserialize_with = "csv::invalid_option")]
    ht_away_goals: Option<u32>,
    #[serde(rename = "HST", default, deserialize_with = "csv::invalid_option")]
    home_shots_on_target: Option<u32>,
    #[serde(rename = "AST", default, deserialize_with = "csv::invalid_option")]
    away_shots_on_target: Option<u32>,
    #[serde(rename = "HC", default, deserialize_with = "csv::invalid_option")]
    home_corners: Option<u32>,
    #[serde(rename = "AC", default, deserialize_with = "csv::invalid_option")]
    away_corners: Option<u32>,
}

// ── martj42 international results rows ─────────────────────────────────────

#[derive(Debug, Deserialize)]
struct InternationalRow {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    home_team: Option<String>,
    #[serde(default)]
    away_team: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    home_score: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    away_score: Option<u32>,
}

/// Accepts `dd/mm/yy`, `dd/mm/yyyy` and ISO `yyyy-mm-dd`.
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    ["%d/%m/%y", "%d/%m/%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// football-data files are Latin-1; fall back to it when the bytes are not UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn team_name(raw: Option<String>) -> Option<String> {
    raw.map(|name| clean_team_name(&name)).filter(|name| !name.is_empty())
}

fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

/// Parses one football-data.co.uk season file. Rows missing a date, a team or the full-time
/// score are dropped; blank detail cells stay `None`.
pub fn parse_football_data_csv(text: &str, league: &str) -> EngineResult<Vec<MatchRecord>> {
    let mut reader = csv_reader(text);
    let headers = reader.headers()?.clone();
    for required in ["Date", "HomeTeam", "AwayTeam", "FTHG", "FTAG"] {
        if !headers.iter().any(|h| h == required) {
            tracing::warn!("{} file has no {} column, skipping", league, required);
            return Ok(Vec::new());
        }
    }

    let mut matches = Vec::new();
    let mut skipped = 0usize;
    for row in reader.deserialize::<FootballDataRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!("Skipping malformed {} row: {}", league, e);
                skipped += 1;
                continue;
            }
        };

        let parsed = (|| {
            let date = parse_match_date(row.date.as_deref()?)?;
            let half_time = match (row.ht_home_goals, row.ht_away_goals) {
                (Some(home), Some(away)) => Some(HalfTimeScore { home, away }),
                _ => None,
            };
            Some(MatchRecord {
                date,
                home_team: team_name(row.home_team)?,
                away_team: team_name(row.away_team)?,
                home_goals: row.home_goals?,
                away_goals: row.away_goals?,
                half_time,
                home_shots_on_target: row.home_shots_on_target,
                away_shots_on_target: row.away_shots_on_target,
                home_corners: row.home_corners,
                away_corners: row.away_corners,
                league: league.to_string(),
            })
        })();

        match parsed {
            Some(record) => matches.push(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!("{}: dropped {} incomplete rows", league, skipped);
    }
    Ok(matches)
}

/// Parses the international results file. Score-only: no half-time or shot columns.
pub fn parse_international_csv(text: &str) -> EngineResult<Vec<MatchRecord>> {
    let mut reader = csv_reader(text);
    let mut matches = Vec::new();

    for row in reader.deserialize::<InternationalRow>() {
        let Ok(row) = row else { continue };
        let record = (|| {
            Some(MatchRecord {
                date: parse_match_date(row.date.as_deref()?)?,
                home_team: team_name(row.home_team)?,
                away_team: team_name(row.away_team)?,
                home_goals: row.home_score?,
                away_goals: row.away_score?,
                half_time: None,
                home_shots_on_target: None,
                away_shots_on_target: None,
                home_corners: None,
                away_corners: None,
                league: INTERNATIONAL_LEAGUE.to_string(),
            })
        })();
        matches.extend(record);
    }

    Ok(matches)
}

/// Season directory codes, newest first: the season starting this year and the three before.
pub fn season_codes(today: NaiveDate) -> Vec<String> {
    let yy = today.year() % 100;
    (0..SEASONS_TO_FETCH)
        .map(|back| {
            let start = (yy - back).rem_euclid(100);
            format!("{:02}{:02}", start, (start + 1) % 100)
        })
        .collect()
}

/// Parses every `*.csv` in `dir`. The league code is the file stem up to the first `_`
/// (`E0_2324.csv` -> `E0`); `INT*` or `results*` files are read as international results.
pub fn load_directory(dir: &Path) -> EngineResult<Vec<MatchRecord>> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    entries.sort();

    let mut matches = Vec::new();
    for path in entries {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let code = stem.split('_').next().unwrap_or(stem);
        let text = decode_text(&fs::read(&path)?);

        let parsed = if code.eq_ignore_ascii_case(INTERNATIONAL_LEAGUE) || code.eq_ignore_ascii_case("results") {
            parse_international_csv(&text)?
        } else {
            parse_football_data_csv(&text, code)?
        };
        tracing::info!("{}: {} matches", path.display(), parsed.len());
        matches.extend(parsed);
    }

    Ok(matches)
}

// ── DataFetcher ──────────────────────────────────────────────────────────────

pub struct DataFetcher {
    client: Client,
}

impl DataFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("goalcast/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("{} returned {}", url, response.status()));
        }
        Ok(decode_text(&response.bytes().await?))
    }

    /// Recent seasons of one league. A season that fails to download is logged and skipped.
    pub async fn fetch_league(&self, code: &str) -> Vec<MatchRecord> {
        tracing::info!("Fetching {} from football-data.co.uk…", code);
        let mut matches = Vec::new();

        for season in season_codes(Utc::now().date_naive()) {
            let url = format!("{}/{}/{}.csv", FOOTBALL_DATA_BASE, season, code);
            match self.get_text(&url).await {
                Ok(text) => match parse_football_data_csv(&text, code) {
                    Ok(rows) => {
                        tracing::info!("{} {}: {} matches", code, season, rows.len());
                        matches.extend(rows);
                    }
                    Err(e) => tracing::warn!("{} {}: unreadable file: {}", code, season, e),
                },
                Err(e) => tracing::warn!("{} {}: {}", code, season, e),
            }

            // be polite to the file server between seasons
            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
        }

        matches
    }

    pub async fn fetch_international(&self) -> Result<Vec<MatchRecord>> {
        tracing::info!("Fetching international results…");
        let text = self.get_text(INTERNATIONAL_RESULTS_URL).await?;
        Ok(parse_international_csv(&text)?)
    }

    /// Every configured league. Fails only when nothing at all could be fetched.
    pub async fn fetch_all(&self, codes: &[String]) -> Result<Vec<MatchRecord>> {
        let mut matches = Vec::new();
        for code in codes {
            if code == INTERNATIONAL_LEAGUE {
                match self.fetch_international().await {
                    Ok(rows) => matches.extend(rows),
                    Err(e) => tracing::warn!("International results unavailable: {}", e),
                }
            } else {
                matches.extend(self.fetch_league(code).await);
            }
        }

        if matches.is_empty() {
            return Err(anyhow!("no match data could be fetched for {}", codes.join(",")));
        }
        tracing::info!("Fetched {} matches across {} sources", matches.len(), codes.len());
        Ok(matches)
    }
}
