use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::MovieIndex;

/// A user's verdict on a movie
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RatingValue {
    Like,
    Dislike,
}

/// One entry in the append-only rating log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub movie_index: MovieIndex,
    pub value: RatingValue,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(
        session_id: Uuid,
        user_id: Uuid,
        movie_index: MovieIndex,
        value: RatingValue,
    ) -> Self {
        Self {
            session_id,
            user_id,
            movie_index,
            value,
            created_at: Utc::now(),
        }
    }
}

/// Liked and disliked movies of one user within a session
///
/// The two lists never share an index: rating a movie again moves it to the
/// list of the latest verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatedMovies {
    pub liked: Vec<MovieIndex>,
    pub disliked: Vec<MovieIndex>,
}

impl RatedMovies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays a rating log in order
    pub fn from_ratings<'a>(ratings: impl IntoIterator<Item = &'a Rating>) -> Self {
        let mut rated = Self::new();
        for rating in ratings {
            rated.record(rating.movie_index, rating.value);
        }
        rated
    }

    /// Records a verdict; the latest verdict for an index wins
    pub fn record(&mut self, movie_index: MovieIndex, value: RatingValue) {
        self.liked.retain(|&i| i != movie_index);
        self.disliked.retain(|&i| i != movie_index);

        match value {
            RatingValue::Like => self.liked.push(movie_index),
            RatingValue::Dislike => self.disliked.push(movie_index),
        }
    }

    /// Every rated index regardless of verdict
    pub fn all(&self) -> HashSet<MovieIndex> {
        self.liked.iter().chain(&self.disliked).copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.liked.is_empty() && self.disliked.is_empty()
    }
}
