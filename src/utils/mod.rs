use std::cmp::Ordering;
use strsim::jaro_winkler;

/// Minimum Jaro-Winkler similarity for a name to be offered as a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Strips country codes that some sources glue onto team names.
///
/// "eng Arsenal" -> "Arsenal", "Ajax nl" -> "Ajax", "es Villarreal" -> "Villarreal",
/// "Arsenal eng" -> "Arsenal".
pub fn clean_team_name(name: &str) -> String {
    let name = strip_code_prefix(name.trim(), 3);
    let name = strip_code_suffix(name.trim(), 2);
    let name = strip_code_prefix(name.trim(), 2);
    let name = strip_code_suffix(name.trim(), 3);
    name.trim().to_string()
}

fn strip_code_prefix(name: &str, len: usize) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() > len
        && bytes[..len].iter().all(u8::is_ascii_lowercase)
        && bytes[len].is_ascii_whitespace()
    {
        &name[len + 1..]
    } else {
        name
    }
}

fn strip_code_suffix(name: &str, len: usize) -> &str {
    let bytes = name.as_bytes();
    let n = bytes.len();
    if n > len && bytes[n - len..].iter().all(u8::is_ascii_lowercase) && bytes[n - len - 1].is_ascii_whitespace() {
        &name[..n - len - 1]
    } else {
        name
    }
}

/// Convert probability to fair decimal odds
pub fn probability_to_odds(probability: f64) -> f64 {
    if probability <= 0.0 || probability >= 1.0 {
        return 1000.0; // Very high odds for impossible/certain events
    }
    1.0 / probability
}

/// Known names most similar to `query`, best first.
pub fn closest_team_names(query: &str, teams: &[String], limit: usize) -> Vec<String> {
    let query = query.trim().to_lowercase();
    let mut scored: Vec<(f64, &String)> = teams
        .iter()
        .map(|team| (jaro_winkler(&query, &team.to_lowercase()), team))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(limit).map(|(_, team)| team.clone()).collect()
}

/// Format a probability as a percentage with one decimal
pub fn format_percent(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}
