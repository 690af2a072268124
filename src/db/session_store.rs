use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{MovieIndex, PreferenceRecord, RatedMovies, Rating, Session, SessionState},
};

/// Persistence for sessions, per-user preference records and the rating log
///
/// Ratings are append-only; [`rated_movies`](SessionStore::rated_movies)
/// replays them so the latest verdict for a movie wins.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> AppResult<()>;

    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>>;

    async fn update_session_state(&self, session_id: Uuid, state: SessionState) -> AppResult<()>;

    async fn save_preferences(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        preferences: &PreferenceRecord,
    ) -> AppResult<()>;

    /// Stored preferences, or an empty record if none were saved
    async fn get_preferences(&self, session_id: Uuid, user_id: Uuid)
        -> AppResult<PreferenceRecord>;

    async fn append_rating(&self, rating: &Rating) -> AppResult<()>;

    /// Ratings of one user in one session, oldest first
    async fn list_ratings(&self, session_id: Uuid, user_id: Uuid) -> AppResult<Vec<Rating>>;

    async fn rated_movies(&self, session_id: Uuid, user_id: Uuid) -> AppResult<RatedMovies> {
        let ratings = self.list_ratings(session_id, user_id).await?;
        Ok(RatedMovies::from_ratings(&ratings))
    }

    async fn list_liked(&self, session_id: Uuid, user_id: Uuid) -> AppResult<Vec<MovieIndex>> {
        Ok(self.rated_movies(session_id, user_id).await?.liked)
    }

    async fn list_disliked(&self, session_id: Uuid, user_id: Uuid) -> AppResult<Vec<MovieIndex>> {
        Ok(self.rated_movies(session_id, user_id).await?.disliked)
    }
}

#[derive(Default)]
struct InMemoryInner {
    sessions: HashMap<Uuid, Session>,
    preferences: HashMap<(Uuid, Uuid), PreferenceRecord>,
    ratings: Vec<Rating>,
}

/// Process-local [`SessionStore`]; nothing survives a restart
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: RwLock<InMemoryInner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: &Session) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&session.id) {
            return Err(AppError::InvalidInput(format!(
                "Session {} already exists",
                session.id
            )));
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>> {
        Ok(self.inner.read().await.sessions.get(&session_id).cloned())
    }

    async fn update_session_state(&self, session_id: Uuid, state: SessionState) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {}", session_id)))?;
        session.state = state;
        Ok(())
    }

    async fn save_preferences(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        preferences: &PreferenceRecord,
    ) -> AppResult<()> {
        self.inner
            .write()
            .await
            .preferences
            .insert((session_id, user_id), preferences.clone());
        Ok(())
    }

    async fn get_preferences(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<PreferenceRecord> {
        Ok(self
            .inner
            .read()
            .await
            .preferences
            .get(&(session_id, user_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn append_rating(&self, rating: &Rating) -> AppResult<()> {
        self.inner.write().await.ratings.push(rating.clone());
        Ok(())
    }

    async fn list_ratings(&self, session_id: Uuid, user_id: Uuid) -> AppResult<Vec<Rating>> {
        Ok(self
            .inner
            .read()
            .await
            .ratings
            .iter()
            .filter(|r| r.session_id == session_id && r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RatingValue;

    #[test]
    fn test_session_lifecycle() {
        tokio_test::block_on(async {
            let store = InMemorySessionStore::new();
            let session = Session::single("Anna");

            store.create_session(&session).await.unwrap();
            assert!(store.create_session(&session).await.is_err());

            store
                .update_session_state(session.id, SessionState::Completed)
                .await
                .unwrap();
            let loaded = store.get_session(session.id).await.unwrap().unwrap();
            assert_eq!(loaded.state, SessionState::Completed);

            assert!(store.get_session(Uuid::new_v4()).await.unwrap().is_none());
            assert!(matches!(
                store
                    .update_session_state(Uuid::new_v4(), SessionState::Cancelled)
                    .await,
                Err(AppError::NotFound(_))
            ));
        });
    }

    #[tokio::test]
    async fn test_preferences_default_to_empty() {
        let store = InMemorySessionStore::new();
        let session = Session::single("Anna");
        let user = session.users[0].id;

        assert!(store
            .get_preferences(session.id, user)
            .await
            .unwrap()
            .is_empty());

        let prefs = PreferenceRecord {
            genres: vec!["Comedy".to_string()],
            ..Default::default()
        };
        store.save_preferences(session.id, user, &prefs).await.unwrap();
        assert_eq!(store.get_preferences(session.id, user).await.unwrap(), prefs);
    }

    #[tokio::test]
    async fn test_liked_and_disliked_reconcile_rerating() {
        let store = InMemorySessionStore::new();
        let session = Session::collaborative("Anna", "Boris");
        let anna = session.users[0].id;
        let boris = session.users[1].id;

        for (user, index, value) in [
            (anna, 1, RatingValue::Like),
            (anna, 2, RatingValue::Dislike),
            (boris, 1, RatingValue::Dislike),
            (anna, 2, RatingValue::Like),
        ] {
            store
                .append_rating(&Rating::new(session.id, user, index, value))
                .await
                .unwrap();
        }

        assert_eq!(store.list_liked(session.id, anna).await.unwrap(), vec![1, 2]);
        assert!(store.list_disliked(session.id, anna).await.unwrap().is_empty());
        assert_eq!(store.list_disliked(session.id, boris).await.unwrap(), vec![1]);
        assert!(store
            .list_liked(Uuid::new_v4(), anna)
            .await
            .unwrap()
            .is_empty());
    }
}
