use anyhow::{bail, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{count_matches, create_pool, init_database, insert_matches, load_match_history};
use crate::models::{MatchRecord, Venue};
use crate::services::{
    load_directory, DataFetcher, EngineSnapshot, FormWindow, ModelRegistry, PredictionService, SoftmaxTrainer,
    TrainingPipeline, TrainingSet,
};
use crate::utils::{closest_team_names, format_percent, probability_to_odds};

async fn load_snapshot(config: &AppConfig) -> Result<Arc<EngineSnapshot>> {
    let pool = create_pool(&config.database_url).await?;
    init_database(&pool).await?;
    if count_matches(&pool).await? == 0 {
        bail!("No matches stored yet. Run `goalcast fetch` first");
    }
    let matches = load_match_history(&pool).await?;
    Ok(Arc::new(EngineSnapshot::build(matches, &config.engine)?))
}

pub async fn init_db(config: &AppConfig) -> Result<()> {
    let pool = create_pool(&config.database_url).await?;
    init_database(&pool).await?;
    println!("✅ Database ready at {}", config.database_url);
    Ok(())
}

pub async fn fetch_data(config: &AppConfig, source_dir: Option<&Path>) -> Result<()> {
    let pool = create_pool(&config.database_url).await?;
    init_database(&pool).await?;

    let matches = match source_dir {
        Some(dir) => {
            println!("📁 Reading match files from {}...", dir.display());
            load_directory(dir)?
        }
        None => {
            println!("📥 Fetching {}...", config.league_codes.join(", "));
            DataFetcher::new()?.fetch_all(&config.league_codes).await?
        }
    };

    if matches.is_empty() {
        println!("📭 No matches found");
        return Ok(());
    }

    let stored = insert_matches(&pool, &matches).await?;
    let total = count_matches(&pool).await?;
    println!("✅ Stored {} matches ({} in database)", stored, total);
    Ok(())
}

pub async fn train(config: &AppConfig, fetch_first: bool) -> Result<()> {
    if fetch_first {
        fetch_data(config, None).await?;
    }

    let snapshot = load_snapshot(config).await?;
    println!(
        "🧮 Rated {} teams over {} matches",
        snapshot.ratings().team_count(),
        snapshot.ratings().matches_applied()
    );

    let set = tokio::task::spawn_blocking({
        let snapshot = snapshot.clone();
        move || TrainingSet::build(&snapshot)
    })
    .await??;
    println!("📊 Built {} training rows", set.len());

    let registry = ModelRegistry::new(&config.models_dir);
    let reports = tokio::task::spawn_blocking(move || {
        TrainingPipeline::new(SoftmaxTrainer::default(), registry).run(&set)
    })
    .await??;

    println!("\n🎯 Held-out accuracy:");
    for report in &reports {
        println!(
            "   {:<10} {}  ({} train / {} test) -> {}",
            report.market.name(),
            format_percent(report.accuracy),
            report.train_rows,
            report.test_rows,
            report.path.display()
        );
    }
    println!("\n✅ Trained {} markets", reports.len());
    Ok(())
}

pub async fn predict(config: &AppConfig, home_team: &str, away_team: &str) -> Result<()> {
    let snapshot = load_snapshot(config).await?;
    let service = PredictionService::from_registry(snapshot.clone(), &ModelRegistry::new(&config.models_dir))?;

    for team in [home_team, away_team] {
        if !snapshot.history().contains_team(team.trim()) {
            let suggestions = service.suggest_teams(team, 3);
            if suggestions.is_empty() {
                println!("⚠️  No history for '{}', using a default rating", team);
            } else {
                println!("⚠️  No history for '{}'. Did you mean: {}?", team, suggestions.join(", "));
            }
        }
    }

    let prediction = service.predict(home_team, away_team)?;
    let p = &prediction.probabilities;

    println!(
        "\n⚽ {} ({:.0}) vs {} ({:.0})  as of {}",
        prediction.home_team, prediction.home_rating, prediction.away_team, prediction.away_rating, prediction.as_of
    );

    let rows = [
        ("Home win", p.home_win),
        ("Draw", p.draw),
        ("Away win", p.away_win),
        ("Over 1.5", p.over15),
        ("Over 2.5", p.over25),
        ("Over 3.5", p.over35),
        ("Under 2.5", p.under25),
        ("BTTS yes", p.btts_yes),
        ("BTTS no", p.btts_no),
        ("HT home", p.ht_home),
        ("HT draw", p.ht_draw),
        ("HT away", p.ht_away),
        ("HT over 0.5", p.ht_over05),
    ];
    println!("\n   {:<12} {:>8} {:>8}", "Market", "Prob", "Odds");
    for (label, probability) in rows {
        println!(
            "   {:<12} {:>8} {:>8.2}",
            label,
            format_percent(probability),
            probability_to_odds(probability)
        );
    }

    Ok(())
}

pub async fn query_team(config: &AppConfig, team_name: &str, last: usize) -> Result<()> {
    let snapshot = load_snapshot(config).await?;
    let history = snapshot.history();

    println!("🔍 Searching for team: {}", team_name);

    if !history.contains_team(team_name) {
        println!("❌ No matches found for '{}'", team_name);
        let suggestions = closest_team_names(team_name, &history.teams(), 5);
        if !suggestions.is_empty() {
            println!("\n💡 Did you mean:");
            for name in suggestions {
                println!("   • {}", name);
            }
        }
        return Ok(());
    }

    let ratings = snapshot.ratings();
    let form = FormWindow::new(history, ratings).stats(
        team_name,
        Utc::now().date_naive(),
        snapshot.windows().form_matches,
        Venue::All,
    );

    println!("📊 Team Details:");
    println!("   Name: {}", team_name);
    println!("   Elo Rating: {:.1}", ratings.rating_of(team_name));
    if let Some(point) = ratings.history_of(team_name).last() {
        println!("   Last Rated: {}", point.date);
    }
    println!(
        "   Form (last {}): {:.2} pts, {:.2} scored, {:.2} conceded per match",
        form.matches, form.avg_points, form.avg_scored, form.avg_conceded
    );

    println!("\n📅 Recent Matches:");
    for record in history.recent_matches(team_name, last).iter().rev() {
        println!("   {}", describe(record, team_name));
    }

    Ok(())
}

pub async fn show_ratings(config: &AppConfig, limit: usize) -> Result<()> {
    let snapshot = load_snapshot(config).await?;

    println!("🏆 Top {} teams by Elo rating:\n", limit);
    for (rank, (team, rating)) in snapshot.ratings().leaderboard(limit).into_iter().enumerate() {
        println!("{:>4}. {:<28} {:.1}", rank + 1, team, rating);
    }
    Ok(())
}

fn describe(record: &MatchRecord, team: &str) -> String {
    let is_home = record.home_team == team;
    let (scored, conceded) = if is_home {
        (record.home_goals, record.away_goals)
    } else {
        (record.away_goals, record.home_goals)
    };
    let result = if scored > conceded {
        "W"
    } else if scored < conceded {
        "L"
    } else {
        "D"
    };
    let venue = if is_home { "vs" } else { "at" };
    let opponent = record.opponent_of(team).unwrap_or_default();

    format!(
        "{} {} {} ({}-{}) {} [{}]",
        record.date.format("%Y-%m-%d"),
        venue,
        opponent,
        record.home_goals,
        record.away_goals,
        result,
        record.league
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_describe_from_team_perspective() {
        let record = MatchRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, 19).unwrap(),
            home_team: "Feyenoord".to_string(),
            away_team: "Ajax".to_string(),
            home_goals: 1,
            away_goals: 2,
            half_time: None,
            home_shots_on_target: None,
            away_shots_on_target: None,
            home_corners: None,
            away_corners: None,
            league: "N1".to_string(),
        };

        assert_eq!(describe(&record, "Ajax"), "2024-05-19 at Feyenoord (1-2) W [N1]");
        assert_eq!(describe(&record, "Feyenoord"), "2024-05-19 vs Ajax (1-2) L [N1]");
    }
}
