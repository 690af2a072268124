use std::sync::Arc;

use crate::services::{RecommendationEngine, SessionService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(engine: Arc<RecommendationEngine>, sessions: Arc<SessionService>) -> Self {
        Self { engine, sessions }
    }
}
