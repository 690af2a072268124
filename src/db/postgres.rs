use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use super::SessionStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        MovieIndex, PreferenceRecord, Rating, RatingValue, Session, SessionKind, SessionState, User,
    },
};

/// Creates a PostgreSQL connection pool and applies pending migrations
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    kind: String,
    state: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    name: String,
}

#[derive(FromRow)]
struct RatingRow {
    session_id: Uuid,
    user_id: Uuid,
    movie_index: i64,
    liked: bool,
    created_at: DateTime<Utc>,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Rating {
            session_id: row.session_id,
            user_id: row.user_id,
            movie_index: row.movie_index as MovieIndex,
            value: if row.liked {
                RatingValue::Like
            } else {
                RatingValue::Dislike
            },
            created_at: row.created_at,
        }
    }
}

/// [`SessionStore`] backed by PostgreSQL
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, session: &Session) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO sessions (id, kind, state, created_at) VALUES ($1, $2, $3, $4)")
            .bind(session.id)
            .bind(session.kind.to_string())
            .bind(session.state.to_string())
            .bind(session.created_at)
            .execute(&mut *tx)
            .await?;

        for (position, user) in session.users.iter().enumerate() {
            sqlx::query(
                "INSERT INTO session_users (session_id, user_id, name, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(session.id)
            .bind(user.id)
            .bind(&user.name)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(session_id = %session.id, kind = %session.kind, "Session created");
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT id, kind, state, created_at FROM sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let users: Vec<UserRow> = sqlx::query_as(
            "SELECT user_id, name FROM session_users WHERE session_id = $1 ORDER BY position",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let kind = SessionKind::parse(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown session kind '{}'", row.kind)))?;
        let state = SessionState::parse(&row.state)
            .ok_or_else(|| AppError::Internal(format!("Unknown session state '{}'", row.state)))?;

        Ok(Some(Session {
            id: row.id,
            kind,
            users: users
                .into_iter()
                .map(|u| User {
                    id: u.user_id,
                    name: u.name,
                })
                .collect(),
            state,
            created_at: row.created_at,
        }))
    }

    async fn update_session_state(&self, session_id: Uuid, state: SessionState) -> AppResult<()> {
        let result = sqlx::query("UPDATE sessions SET state = $2 WHERE id = $1")
            .bind(session_id)
            .bind(state.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Session {}", session_id)));
        }
        Ok(())
    }

    async fn save_preferences(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        preferences: &PreferenceRecord,
    ) -> AppResult<()> {
        let json = serde_json::to_string(preferences)
            .map_err(|e| AppError::Internal(format!("Preference serialization error: {}", e)))?;

        let result = sqlx::query(
            "UPDATE session_users SET preferences = $3 WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(json)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "User {} in session {}",
                user_id, session_id
            )));
        }
        Ok(())
    }

    async fn get_preferences(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<PreferenceRecord> {
        let stored: Option<Option<String>> = sqlx::query_scalar(
            "SELECT preferences FROM session_users WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match stored.flatten() {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                AppError::Internal(format!("Preference deserialization error: {}", e))
            }),
            None => Ok(PreferenceRecord::default()),
        }
    }

    async fn append_rating(&self, rating: &Rating) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO ratings (session_id, user_id, movie_index, liked, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(rating.session_id)
        .bind(rating.user_id)
        .bind(rating.movie_index)
        .bind(rating.value == RatingValue::Like)
        .bind(rating.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_ratings(&self, session_id: Uuid, user_id: Uuid) -> AppResult<Vec<Rating>> {
        let rows: Vec<RatingRow> = sqlx::query_as(
            "SELECT session_id, user_id, movie_index, liked, created_at FROM ratings \
             WHERE session_id = $1 AND user_id = $2 ORDER BY id",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Rating::from).collect())
    }
}
