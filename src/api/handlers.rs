use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        CollaborativeRecommendations, Movie, MovieIndex, PreferenceRecord, RatedMovies, Rating,
        RatingValue, Recommendation, Session, SessionKind,
    },
    services::{Catalog, CatalogInfo},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub count: Option<usize>,
    #[serde(default)]
    pub exclude: Vec<MovieIndex>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub kind: SessionKind,
    pub users: Vec<String>,
}

/// Either a transcript to extract preferences from, or an explicit record
#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    pub user_id: Uuid,
    pub transcript: Option<String>,
    pub preferences: Option<PreferenceRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub user_id: Uuid,
    pub movie_index: MovieIndex,
    pub value: RatingValue,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub user_id: Uuid,
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CollaborativeRequest {
    pub count: Option<usize>,
}

/// A recommendation with the movie it points to
#[derive(Debug, Serialize)]
pub struct RecommendedMovie {
    #[serde(flatten)]
    pub movie: Movie,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct CollaborativeResponse {
    pub user1: Vec<RecommendedMovie>,
    pub user2: Vec<RecommendedMovie>,
    pub intersection: Vec<RecommendedMovie>,
}

fn with_movies(catalog: &Catalog, recommendations: Vec<Recommendation>) -> Vec<RecommendedMovie> {
    recommendations
        .into_iter()
        .filter_map(|r| {
            catalog.get_by_index(r.index).map(|movie| RecommendedMovie {
                movie: movie.clone(),
                score: r.score,
            })
        })
        .collect()
}

impl CollaborativeResponse {
    fn new(catalog: &Catalog, recommendations: CollaborativeRecommendations) -> Self {
        Self {
            user1: with_movies(catalog, recommendations.user1),
            user2: with_movies(catalog, recommendations.user2),
            intersection: with_movies(catalog, recommendations.intersection),
        }
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let embedded = state.engine.embedded_count().await;
    (
        StatusCode::OK,
        Json(json!({ "status": "healthy", "embedded_movies": embedded })),
    )
}

pub async fn get_catalog_info(State(state): State<AppState>) -> Json<CatalogInfo> {
    Json(state.engine.catalog().info())
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(index): Path<MovieIndex>,
) -> AppResult<Json<Movie>> {
    state
        .engine
        .catalog()
        .get_by_index(index)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Movie {}", index)))
}

/// Free-text search over the catalog
pub async fn recommend_by_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> AppResult<Json<Vec<RecommendedMovie>>> {
    if request.query.trim().is_empty() {
        return Err(AppError::InvalidInput("Query must not be empty".to_string()));
    }

    let count = request
        .count
        .unwrap_or(state.sessions.settings().initial_count);
    let exclude: HashSet<MovieIndex> = request.exclude.into_iter().collect();

    let recommendations = state
        .engine
        .recommend_by_query_text(&request.query, count, &exclude)
        .await?;
    Ok(Json(with_movies(state.engine.catalog(), recommendations)))
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let session = state
        .sessions
        .create_session(request.kind, &request.users)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Session>> {
    Ok(Json(state.sessions.get_session(id).await?))
}

pub async fn submit_preferences(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PreferencesRequest>,
) -> AppResult<Json<PreferenceRecord>> {
    let preferences = match (request.transcript, request.preferences) {
        (Some(transcript), None) => {
            state
                .sessions
                .submit_transcript(id, request.user_id, &transcript)
                .await?
        }
        (None, Some(preferences)) => {
            state
                .sessions
                .save_preferences(id, request.user_id, preferences)
                .await?
        }
        _ => {
            return Err(AppError::InvalidInput(
                "Provide exactly one of 'transcript' or 'preferences'".to_string(),
            ))
        }
    };
    Ok(Json(preferences))
}

pub async fn rate_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RateRequest>,
) -> AppResult<(StatusCode, Json<Rating>)> {
    let rating = state
        .sessions
        .rate(id, request.user_id, request.movie_index, request.value)
        .await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn get_ratings(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<RatedMovies>> {
    Ok(Json(state.sessions.rated_movies(id, user_id).await?))
}

/// Single-user recommendations refined by the user's ratings
pub async fn recommend(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RecommendRequest>,
) -> AppResult<Json<Vec<RecommendedMovie>>> {
    let recommendations = state
        .sessions
        .recommend(id, request.user_id, request.count)
        .await?;
    Ok(Json(with_movies(state.engine.catalog(), recommendations)))
}

/// Three-bucket recommendations for a two-user session
pub async fn collaborative_recommend(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<CollaborativeRequest>>,
) -> AppResult<Json<CollaborativeResponse>> {
    let count = request.and_then(|Json(r)| r.count);
    let recommendations = state.sessions.collaborative_recommend(id, count).await?;
    Ok(Json(CollaborativeResponse::new(
        state.engine.catalog(),
        recommendations,
    )))
}

pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Session>> {
    Ok(Json(state.sessions.complete(id).await?))
}
