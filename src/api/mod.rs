use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::db::{create_pool, init_database, load_match_history};
use crate::error::EngineError;
use crate::models::{ApiResponse, MarketProbabilities, MatchPrediction, MatchRecord, TeamRating};
use crate::services::{EngineSnapshot, ModelRegistry, PredictionService};
use crate::utils::probability_to_odds;

const DEFAULT_RECENT: usize = 5;
const MAX_RECENT: usize = 50;
const DEFAULT_RATINGS: usize = 20;
const SUGGESTIONS: usize = 3;

/// Built once at startup. A missing model keeps the server up; only `/predict` reports it.
#[derive(Clone)]
pub struct AppState {
    snapshot: Arc<EngineSnapshot>,
    predictor: Arc<Result<PredictionService, EngineError>>,
}

impl AppState {
    pub fn new(snapshot: Arc<EngineSnapshot>, registry: &ModelRegistry) -> Self {
        let predictor = PredictionService::from_registry(snapshot.clone(), registry);
        if let Err(e) = &predictor {
            tracing::warn!("Predictions unavailable: {}", e);
        }
        Self {
            snapshot,
            predictor: Arc::new(predictor),
        }
    }
}

pub async fn serve(config: &AppConfig, port: u16) -> anyhow::Result<()> {
    let pool = create_pool(&config.database_url).await?;
    init_database(&pool).await?;
    let matches = load_match_history(&pool).await?;
    let snapshot = Arc::new(EngineSnapshot::build(matches, &config.engine)?);
    let state = AppState::new(snapshot, &ModelRegistry::new(&config.models_dir));

    let app = create_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("goalcast API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/predict", get(predict_handler))
        .route("/teams/{name}/recent", get(recent_matches_handler))
        .route("/ratings", get(ratings_handler))
        .route("/leagues", get(leagues_handler))
        .route("/leagues/{code}/teams", get(league_teams_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        EngineError::ModelNotTrained { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(error: &EngineError) -> ApiError {
    let status = status_for(error);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    }
    (status, Json(ApiResponse::error(error.to_string())))
}

fn not_found(message: String) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error(message)))
}

// Health check endpoint
#[derive(Debug, Serialize)]
struct HealthInfo {
    status: &'static str,
    matches: usize,
    latest_match: Option<NaiveDate>,
    teams: usize,
    models_loaded: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthInfo>> {
    Json(ApiResponse::success(HealthInfo {
        status: "goalcast API is running",
        matches: state.snapshot.history().len(),
        latest_match: state.snapshot.history().matches().last().map(|m| m.date),
        teams: state.snapshot.ratings().team_count(),
        models_loaded: state.predictor.is_ok(),
    }))
}

// GET /predict?home=&away=
#[derive(Deserialize)]
struct PredictQuery {
    home: String,
    away: String,
}

#[derive(Debug, Serialize)]
struct PredictionView {
    #[serde(flatten)]
    prediction: MatchPrediction,
    fair_odds: MarketProbabilities,
    /// Close matches for any team name without history.
    suggestions: BTreeMap<String, Vec<String>>,
}

async fn predict_handler(
    State(state): State<AppState>,
    Query(params): Query<PredictQuery>,
) -> ApiResult<PredictionView> {
    let service = match &*state.predictor {
        Ok(service) => service,
        Err(e) => return Err(api_error(e)),
    };
    let prediction = service
        .predict(&params.home, &params.away)
        .map_err(|e| api_error(&e))?;

    let history = state.snapshot.history();
    let suggestions = [&prediction.home_team, &prediction.away_team]
        .into_iter()
        .filter(|team| !history.contains_team(team))
        .map(|team| (team.clone(), service.suggest_teams(team, SUGGESTIONS)))
        .collect();

    Ok(Json(ApiResponse::success(PredictionView {
        fair_odds: prediction.probabilities.map(probability_to_odds),
        prediction,
        suggestions,
    })))
}

// GET /teams/{name}/recent?n=
#[derive(Deserialize)]
struct RecentQuery {
    n: Option<usize>,
}

async fn recent_matches_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<RecentQuery>,
) -> ApiResult<Vec<MatchRecord>> {
    let history = state.snapshot.history();
    if !history.contains_team(&name) {
        let suggestions = crate::utils::closest_team_names(&name, &history.teams(), SUGGESTIONS);
        return Err(not_found(if suggestions.is_empty() {
            format!("no matches for '{}'", name)
        } else {
            format!("no matches for '{}', did you mean: {}", name, suggestions.join(", "))
        }));
    }

    let n = params.n.unwrap_or(DEFAULT_RECENT).min(MAX_RECENT);
    Ok(Json(ApiResponse::success(history.recent_matches(&name, n))))
}

// GET /ratings?limit=
#[derive(Deserialize)]
struct RatingsQuery {
    limit: Option<usize>,
}

async fn ratings_handler(
    State(state): State<AppState>,
    Query(params): Query<RatingsQuery>,
) -> ApiResult<Vec<TeamRating>> {
    let table = state
        .snapshot
        .ratings()
        .leaderboard(params.limit.unwrap_or(DEFAULT_RATINGS))
        .into_iter()
        .map(|(team, rating)| TeamRating { team, rating })
        .collect();
    Ok(Json(ApiResponse::success(table)))
}

// GET /leagues
async fn leagues_handler(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(Json(ApiResponse::success(state.snapshot.history().leagues())))
}

// GET /leagues/{code}/teams
async fn league_teams_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Vec<TeamRating>> {
    let teams = state.snapshot.history().teams_in_league(&code);
    if teams.is_empty() {
        return Err(not_found(format!("unknown league '{}'", code)));
    }

    let ratings = state.snapshot.ratings();
    let mut table: Vec<TeamRating> = teams
        .into_iter()
        .map(|team| TeamRating {
            rating: ratings.rating_of(&team),
            team,
        })
        .collect();
    table.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    Ok(Json(ApiResponse::success(table)))
}
