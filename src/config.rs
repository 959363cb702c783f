use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_K_FACTOR: f64 = 30.0;
pub const DEFAULT_INITIAL_RATING: f64 = 1500.0;
pub const DEFAULT_LEAGUE_WEIGHT: f64 = 0.5;
pub const DEFAULT_WINDOW: usize = 5;

/// League code used for national-team fixtures.
pub const INTERNATIONAL_LEAGUE: &str = "INT";

const DEFAULT_LEAGUE_CODES: &[&str] = &["D1", "E0", "F1", "I1", "INT", "N1", "P1", "SC0", "SP1", "T1"];

/// Per-league multiplier applied to the size of a rating update.
#[derive(Debug, Clone)]
pub struct LeagueWeights {
    weights: HashMap<String, f64>,
    fallback: f64,
}

impl LeagueWeights {
    pub fn new(fallback: f64) -> Self {
        Self {
            weights: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, league: &str, weight: f64) -> Self {
        self.weights.insert(league.to_string(), weight);
        self
    }

    /// Weight for a league, falling back to the default for unknown codes.
    pub fn weight(&self, league: &str) -> f64 {
        self.weights.get(league).copied().unwrap_or(self.fallback)
    }
}

impl Default for LeagueWeights {
    fn default() -> Self {
        Self::new(DEFAULT_LEAGUE_WEIGHT)
            .with("CL", 1.10)
            .with("E0", 1.00)
            .with("I1", 0.87)
            .with("SP1", 0.86)
            .with("D1", 0.83)
            .with("F1", 0.64)
            .with("N1", 0.59)
            .with("P1", 0.54)
            .with("T1", 0.37)
            .with("SC0", 0.35)
            .with(INTERNATIONAL_LEAGUE, 0.90)
    }
}

#[derive(Debug, Clone)]
pub struct RatingConfig {
    pub k_factor: f64,
    pub initial_rating: f64,
    pub league_weights: LeagueWeights,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            initial_rating: DEFAULT_INITIAL_RATING,
            league_weights: LeagueWeights::default(),
        }
    }
}

/// Window sizes shared by training and inference feature construction.
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    pub form_matches: usize,
    pub h2h_meetings: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            form_matches: DEFAULT_WINDOW,
            h2h_meetings: DEFAULT_WINDOW,
        }
    }
}

/// Which matches feed the rating pass. Older fixtures stay available to the windows.
#[derive(Debug, Clone)]
pub struct RatingEligibility {
    pub national_league: String,
    pub national_since: NaiveDate,
    pub club_since: NaiveDate,
}

impl Default for RatingEligibility {
    fn default() -> Self {
        Self {
            national_league: INTERNATIONAL_LEAGUE.to_string(),
            national_since: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            club_since: NaiveDate::from_ymd_opt(2019, 8, 1).unwrap_or_default(),
        }
    }
}

impl RatingEligibility {
    pub fn admits(&self, league: &str, date: NaiveDate) -> bool {
        if league == self.national_league {
            date >= self.national_since
        } else {
            date >= self.club_since
        }
    }
}

/// Everything the engine needs to turn a match table into ratings and features.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub rating: RatingConfig,
    pub windows: WindowConfig,
    pub eligibility: RatingEligibility,
    /// Backtest cutoff: matches after this date are dropped on load.
    pub cutoff_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub models_dir: PathBuf,
    pub data_dir: PathBuf,
    pub league_codes: Vec<String>,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Reads configuration from the process environment (call `dotenv` first).
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/matches.db".to_string());
        let models_dir = PathBuf::from(env::var("MODELS_DIR").unwrap_or_else(|_| "models".to_string()));
        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));

        let league_codes = match env::var("LEAGUE_CODES") {
            Ok(raw) => parse_league_codes(&raw),
            Err(_) => DEFAULT_LEAGUE_CODES.iter().map(|c| c.to_string()).collect(),
        };

        let cutoff_date = match env::var("CUTOFF_DATE") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .with_context(|| format!("CUTOFF_DATE '{}' is not YYYY-MM-DD", raw))?,
            ),
            _ => None,
        };

        let rating = RatingConfig {
            k_factor: env_or("K_FACTOR", DEFAULT_K_FACTOR)?,
            initial_rating: env_or("INITIAL_RATING", DEFAULT_INITIAL_RATING)?,
            league_weights: LeagueWeights::default(),
        };

        let windows = WindowConfig {
            form_matches: env_or("FORM_WINDOW", DEFAULT_WINDOW)?,
            h2h_meetings: env_or("H2H_WINDOW", DEFAULT_WINDOW)?,
        };

        Ok(Self {
            database_url,
            models_dir,
            data_dir,
            league_codes,
            engine: EngineConfig {
                rating,
                windows,
                eligibility: RatingEligibility::default(),
                cutoff_date,
            },
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_league_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect()
}
