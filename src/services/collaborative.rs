use std::collections::HashSet;

use crate::{
    config::RecommendationSettings,
    embeddings::intersection_by_similarity,
    error::AppResult,
    models::{CollaborativeRecommendations, MovieIndex, PreferenceRecord, RatedMovies, Recommendation},
    services::{content_filter::ContentFilter, recommendations::RecommendationEngine},
};

/// The intersection bucket uses a looser threshold than single-user matching
const INTERSECTION_THRESHOLD_FACTOR: f32 = 0.8;

/// Score given to intersection candidates when similarity cannot be computed
const FLAT_SCORE: f32 = 1.0;

/// Ways to fill a user-specific bucket, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStrategy {
    /// Movies featuring the user's first named actor
    Actor,
    /// Movies by the user's first named director
    Director,
    /// Blended preference and liked-movie ranking over the whole catalog
    General,
}

pub const USER_STRATEGIES: [UserStrategy; 3] =
    [UserStrategy::Actor, UserStrategy::Director, UserStrategy::General];

/// What the engine knows about one participant
#[derive(Debug, Clone, Copy)]
pub struct Participant<'a> {
    pub preferences: &'a PreferenceRecord,
    pub ratings: &'a RatedMovies,
}

/// Splits recommendations for two users into user1, user2 and shared buckets
///
/// Buckets are filled in that order and each one excludes every rated movie
/// plus whatever earlier buckets already hold, so the three lists never
/// overlap.
pub struct CollaborativeSession<'a> {
    engine: &'a RecommendationEngine,
    filter: &'a ContentFilter,
    settings: &'a RecommendationSettings,
}

impl<'a> CollaborativeSession<'a> {
    pub fn new(
        engine: &'a RecommendationEngine,
        filter: &'a ContentFilter,
        settings: &'a RecommendationSettings,
    ) -> Self {
        Self {
            engine,
            filter,
            settings,
        }
    }

    pub async fn collaborative_recommend(
        &self,
        user1: Participant<'_>,
        user2: Participant<'_>,
        total_count: usize,
    ) -> AppResult<CollaborativeRecommendations> {
        let sizes = self.settings.split.allocate(total_count);

        let mut exclude: HashSet<MovieIndex> = user1.ratings.all();
        exclude.extend(user2.ratings.all());

        let first = self.user_bucket(user1, &exclude, sizes.user1).await?;
        exclude.extend(first.iter().map(|r| r.index));

        let second = self.user_bucket(user2, &exclude, sizes.user2).await?;
        exclude.extend(second.iter().map(|r| r.index));

        let shared = self
            .intersection_bucket(user1, user2, &exclude, sizes.intersection)
            .await?;

        tracing::info!(
            user1 = first.len(),
            user2 = second.len(),
            intersection = shared.len(),
            requested = total_count,
            "Collaborative recommendations computed"
        );

        Ok(CollaborativeRecommendations {
            user1: first,
            user2: second,
            intersection: shared,
        })
    }

    async fn user_bucket(
        &self,
        participant: Participant<'_>,
        exclude: &HashSet<MovieIndex>,
        size: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if size == 0 {
            return Ok(Vec::new());
        }

        for strategy in USER_STRATEGIES {
            if let Some(ranked) = self
                .apply_strategy(strategy, participant, exclude, size)
                .await?
            {
                if !ranked.is_empty() {
                    tracing::debug!(?strategy, count = ranked.len(), "User bucket filled");
                    return Ok(ranked);
                }
            }
        }

        Ok(Vec::new())
    }

    /// `None` when the strategy does not apply to this participant
    async fn apply_strategy(
        &self,
        strategy: UserStrategy,
        participant: Participant<'_>,
        exclude: &HashSet<MovieIndex>,
        size: usize,
    ) -> AppResult<Option<Vec<Recommendation>>> {
        let preferences = participant.preferences;

        let candidates = match strategy {
            UserStrategy::Actor => match preferences.primary_actor() {
                Some(actor) => self.filter.filter_by_actor(actor),
                None => return Ok(None),
            },
            UserStrategy::Director => match preferences.primary_director() {
                Some(director) => self.filter.filter_by_director(director),
                None => return Ok(None),
            },
            UserStrategy::General => {
                let ranked = self
                    .engine
                    .refine_excluding(preferences, &participant.ratings.liked, exclude, size)
                    .await?;
                return Ok(Some(ranked));
            }
        };

        let candidates = self.filter.exclude_rated(&candidates, exclude);
        if candidates.len() < size {
            return Ok(None);
        }

        let ranked = self
            .engine
            .rank_candidates(&preferences.to_query_text(), &candidates, size)
            .await?;
        Ok(Some(ranked))
    }

    async fn intersection_bucket(
        &self,
        user1: Participant<'_>,
        user2: Participant<'_>,
        exclude: &HashSet<MovieIndex>,
        size: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if size == 0 {
            return Ok(Vec::new());
        }

        let liked1 = &user1.ratings.liked;
        let liked2 = &user2.ratings.liked;

        let genres1 = self.filter.extract_genres(liked1);
        let genres2 = self.filter.extract_genres(liked2);
        let mut genres = self.filter.genre_intersection(&genres1, &genres2);
        if genres.is_empty() {
            genres = genres1.into_iter().chain(genres2).collect();
        }

        let genres: Vec<String> = genres.into_iter().collect();
        let candidates = self
            .filter
            .exclude_rated(&self.filter.filter_by_any_genre(&genres), exclude);

        if candidates.is_empty() {
            tracing::debug!("No shared-genre candidates, using combined preferences");
            let combined = user1.preferences.combine(user2.preferences);
            return self
                .engine
                .recommend_by_preferences(&combined, size, exclude)
                .await;
        }

        let vectors1: Vec<_> = self
            .engine
            .embeddings_for(liked1)
            .await
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        let vectors2: Vec<_> = self
            .engine
            .embeddings_for(liked2)
            .await
            .into_iter()
            .map(|(_, v)| v)
            .collect();

        if vectors1.is_empty() || vectors2.is_empty() {
            return Ok(candidates
                .into_iter()
                .take(size)
                .map(|index| Recommendation::new(index, FLAT_SCORE))
                .collect());
        }

        let (indices, vectors): (Vec<MovieIndex>, Vec<_>) = self
            .engine
            .embeddings_for(&candidates)
            .await
            .into_iter()
            .unzip();

        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = self.settings.similarity_threshold * INTERSECTION_THRESHOLD_FACTOR;
        Ok(
            intersection_by_similarity(&vectors1, &vectors2, &vectors, threshold, size)?
                .into_iter()
                .map(|(pos, score)| Recommendation::new(indices[pos], score))
                .collect(),
        )
    }
}
