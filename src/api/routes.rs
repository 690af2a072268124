use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalog
        .route("/catalog", get(handlers::get_catalog_info))
        .route("/movies/:index", get(handlers::get_movie))
        .route("/recommendations/query", post(handlers::recommend_by_query))
        // Sessions
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/:id", get(handlers::get_session))
        .route("/sessions/:id/preferences", post(handlers::submit_preferences))
        .route("/sessions/:id/ratings", post(handlers::rate_movie))
        .route(
            "/sessions/:id/users/:user_id/ratings",
            get(handlers::get_ratings),
        )
        .route("/sessions/:id/recommendations", post(handlers::recommend))
        .route(
            "/sessions/:id/collaborative",
            post(handlers::collaborative_recommend),
        )
        .route("/sessions/:id/complete", post(handlers::complete_session))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
