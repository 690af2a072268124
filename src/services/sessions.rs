use std::sync::Arc;

use uuid::Uuid;

use crate::{
    config::RecommendationSettings,
    db::SessionStore,
    error::{AppError, AppResult},
    models::{
        CollaborativeRecommendations, MovieIndex, PreferenceRecord, RatedMovies, Rating,
        RatingValue, Recommendation, Session, SessionKind, SessionState,
    },
    services::{
        collaborative::{CollaborativeSession, Participant},
        content_filter::ContentFilter,
        providers::PreferenceExtractor,
        recommendations::RecommendationEngine,
    },
};

/// Session lifecycle, preferences and ratings on top of the recommendation engine
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    engine: Arc<RecommendationEngine>,
    filter: ContentFilter,
    extractor: Arc<dyn PreferenceExtractor>,
    settings: RecommendationSettings,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        engine: Arc<RecommendationEngine>,
        extractor: Arc<dyn PreferenceExtractor>,
        settings: RecommendationSettings,
    ) -> Self {
        let filter = ContentFilter::new(engine.catalog().clone());
        Self {
            store,
            engine,
            filter,
            extractor,
            settings,
        }
    }

    pub fn settings(&self) -> &RecommendationSettings {
        &self.settings
    }

    pub async fn create_session(&self, kind: SessionKind, names: &[String]) -> AppResult<Session> {
        if names.len() != kind.participants() {
            return Err(AppError::InvalidInput(format!(
                "A {} session needs {} user name(s), got {}",
                kind,
                kind.participants(),
                names.len()
            )));
        }
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(AppError::InvalidInput(
                "User names must not be blank".to_string(),
            ));
        }

        let session = match kind {
            SessionKind::Single => Session::single(names[0].trim()),
            SessionKind::Collaborative => {
                Session::collaborative(names[0].trim(), names[1].trim())
            }
        };

        self.store.create_session(&session).await?;
        tracing::info!(session_id = %session.id, kind = %kind, "Session started");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> AppResult<Session> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {}", session_id)))
    }

    /// Loads an active session and checks that `user_id` takes part in it
    async fn active_session_for(&self, session_id: Uuid, user_id: Uuid) -> AppResult<Session> {
        let session = self.active_session(session_id).await?;
        if !session.has_user(user_id) {
            return Err(AppError::NotFound(format!(
                "User {} in session {}",
                user_id, session_id
            )));
        }
        Ok(session)
    }

    async fn active_session(&self, session_id: Uuid) -> AppResult<Session> {
        let session = self.get_session(session_id).await?;
        if !session.is_active() {
            return Err(AppError::InvalidInput(format!(
                "Session {} is {}",
                session_id, session.state
            )));
        }
        Ok(session)
    }

    /// Extracts preferences from a conversation transcript and stores them
    ///
    /// An empty extraction leaves the stored record untouched and returns it.
    pub async fn submit_transcript(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        transcript: &str,
    ) -> AppResult<PreferenceRecord> {
        self.active_session_for(session_id, user_id).await?;

        let preferences = self.extractor.extract(transcript).await;
        if preferences.is_empty() {
            tracing::warn!(%session_id, %user_id, extractor = self.extractor.name(), "No preferences extracted, keeping stored ones");
            return self.store.get_preferences(session_id, user_id).await;
        }

        self.store
            .save_preferences(session_id, user_id, &preferences)
            .await?;
        Ok(preferences)
    }

    pub async fn save_preferences(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        preferences: PreferenceRecord,
    ) -> AppResult<PreferenceRecord> {
        self.active_session_for(session_id, user_id).await?;
        self.store
            .save_preferences(session_id, user_id, &preferences)
            .await?;
        Ok(preferences)
    }

    pub async fn rate(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        movie_index: MovieIndex,
        value: RatingValue,
    ) -> AppResult<Rating> {
        self.active_session_for(session_id, user_id).await?;
        if !self.engine.catalog().contains(movie_index) {
            return Err(AppError::NotFound(format!("Movie {}", movie_index)));
        }

        let rating = Rating::new(session_id, user_id, movie_index, value);
        self.store.append_rating(&rating).await?;
        tracing::debug!(%session_id, %user_id, movie_index, ?value, "Rating recorded");
        Ok(rating)
    }

    pub async fn rated_movies(&self, session_id: Uuid, user_id: Uuid) -> AppResult<RatedMovies> {
        let session = self.get_session(session_id).await?;
        if !session.has_user(user_id) {
            return Err(AppError::NotFound(format!(
                "User {} in session {}",
                user_id, session_id
            )));
        }
        self.store.rated_movies(session_id, user_id).await
    }

    /// Single-user recommendations from stored preferences and ratings
    pub async fn recommend(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        count: Option<usize>,
    ) -> AppResult<Vec<Recommendation>> {
        self.active_session_for(session_id, user_id).await?;

        let preferences = self.store.get_preferences(session_id, user_id).await?;
        let rated = self.store.rated_movies(session_id, user_id).await?;
        let count = count.unwrap_or(self.settings.initial_count);

        self.engine
            .refine(&preferences, &rated.liked, &rated.disliked, count)
            .await
    }

    pub async fn collaborative_recommend(
        &self,
        session_id: Uuid,
        count: Option<usize>,
    ) -> AppResult<CollaborativeRecommendations> {
        let session = self.active_session(session_id).await?;
        if session.kind != SessionKind::Collaborative {
            return Err(AppError::InvalidInput(format!(
                "Session {} is not collaborative",
                session_id
            )));
        }

        let (first, second) = match session.users.as_slice() {
            [first, second] => (first.id, second.id),
            _ => {
                return Err(AppError::Internal(format!(
                    "Collaborative session {} does not have two users",
                    session_id
                )))
            }
        };

        let prefs1 = self.store.get_preferences(session_id, first).await?;
        let prefs2 = self.store.get_preferences(session_id, second).await?;
        let rated1 = self.store.rated_movies(session_id, first).await?;
        let rated2 = self.store.rated_movies(session_id, second).await?;

        CollaborativeSession::new(&self.engine, &self.filter, &self.settings)
            .collaborative_recommend(
                Participant {
                    preferences: &prefs1,
                    ratings: &rated1,
                },
                Participant {
                    preferences: &prefs2,
                    ratings: &rated2,
                },
                count.unwrap_or(self.settings.final_count),
            )
            .await
    }

    pub async fn complete(&self, session_id: Uuid) -> AppResult<Session> {
        let mut session = self.active_session(session_id).await?;
        self.store
            .update_session_state(session_id, SessionState::Completed)
            .await?;
        session.state = SessionState::Completed;
        tracing::info!(%session_id, "Session completed");
        Ok(session)
    }
}
