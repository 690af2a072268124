use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    embeddings::{average_vectors, top_k_by_similarity, Embedding, VectorMetadata, VectorStore},
    error::AppResult,
    models::{sort_by_score, MovieIndex, PreferenceRecord, Recommendation},
    services::{catalog::Catalog, providers::EmbeddingProvider},
};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Searches fetch this many times the requested count before truncating
const OVERFETCH: usize = 2;

const PREFERENCE_WEIGHT: f32 = 0.6;
const LIKED_WEIGHT: f32 = 0.4;

/// Outcome of [`RecommendationEngine::initialize_embeddings`]
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct InitializationReport {
    /// Vectors taken from the cache artifact
    pub cached: usize,
    /// Vectors generated during this run
    pub generated: usize,
    /// Movies left without a vector because a batch failed
    pub failed: usize,
    /// Movies with nothing to describe
    pub skipped: usize,
    pub total: usize,
}

/// Embedding-based ranking over the catalog
///
/// Owns the [`VectorStore`]. Reads take the store's read lock; initialization
/// holds the write lock for its whole run so no search ever sees a partially
/// built store.
pub struct RecommendationEngine {
    catalog: Arc<Catalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: RwLock<VectorStore>,
    batch_size: usize,
}

impl RecommendationEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: VectorStore,
        batch_size: usize,
    ) -> Self {
        Self {
            catalog,
            embedder,
            store: RwLock::new(store),
            batch_size: batch_size.max(1),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Number of movies that currently have a vector
    pub async fn embedded_count(&self) -> usize {
        self.store.read().await.size()
    }

    /// Makes sure every catalog movie has a vector
    ///
    /// Without `force_refresh` the cache artifact is reused and only movies it
    /// lacks are embedded. Batches run sequentially; the first failing batch
    /// stops generation, keeping what earlier batches produced. New vectors
    /// are persisted at the end.
    pub async fn initialize_embeddings(
        &self,
        force_refresh: bool,
    ) -> AppResult<InitializationReport> {
        let mut store = self.store.write().await;

        if force_refresh {
            tracing::info!("Forced refresh, discarding cached embeddings");
            store.clear();
        } else {
            store.load();
        }

        let mut report = InitializationReport {
            cached: store.size(),
            total: self.catalog.len(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for movie in self.catalog.movies() {
            if store.has(movie.index) {
                continue;
            }
            let description = Catalog::describe_for_embedding(movie);
            if description.is_empty() {
                tracing::debug!(index = movie.index, "Movie has no describable fields");
                report.skipped += 1;
                continue;
            }
            pending.push((movie.index, movie.name.clone(), description));
        }

        if pending.is_empty() {
            tracing::info!(cached = report.cached, "All embeddings loaded from cache");
            return Ok(report);
        }

        tracing::info!(
            missing = pending.len(),
            cached = report.cached,
            provider = self.embedder.name(),
            "Generating embeddings"
        );

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, _, text)| text.clone()).collect();

            let vectors = match self.embedder.embed_batch(&texts).await {
                Ok(vectors) if vectors.len() == batch.len() => vectors,
                Ok(vectors) => {
                    tracing::warn!(
                        expected = batch.len(),
                        received = vectors.len(),
                        "Embedding batch size mismatch, stopping generation"
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Embedding batch failed, stopping generation");
                    break;
                }
            };

            let expected_dimension = store.dimension().or_else(|| vectors.first().map(Vec::len));
            if vectors.iter().any(|v| Some(v.len()) != expected_dimension) {
                tracing::warn!("Embedding batch has inconsistent dimensions, stopping generation");
                break;
            }

            let indices: Vec<MovieIndex> = batch.iter().map(|(index, _, _)| *index).collect();
            let metadata: Vec<VectorMetadata> = batch
                .iter()
                .map(|(_, name, _)| {
                    name.iter()
                        .map(|n| ("name".to_string(), n.clone()))
                        .collect()
                })
                .collect();

            store.put_batch(&indices, vectors, Some(metadata));
            report.generated += batch.len();
            tracing::debug!(done = report.generated, of = pending.len(), "Embedded batch");
        }

        report.failed = pending.len() - report.generated;

        if report.generated > 0 {
            if let Err(e) = store.persist() {
                tracing::warn!(error = %e, "Failed to persist embeddings cache");
            }
        }

        tracing::info!(
            cached = report.cached,
            generated = report.generated,
            failed = report.failed,
            "Embeddings initialized"
        );
        Ok(report)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        exclude: &HashSet<MovieIndex>,
    ) -> AppResult<Vec<Recommendation>> {
        let store = self.store.read().await;
        let mut results: Vec<Recommendation> = store
            .search(query, top_k.saturating_mul(OVERFETCH), exclude)?
            .into_iter()
            .map(|(index, score)| Recommendation::new(index, score))
            .collect();
        results.truncate(top_k);
        Ok(results)
    }

    /// Embeds `text` and returns the closest movies outside `exclude`
    ///
    /// A provider failure is logged and yields no recommendations.
    pub async fn recommend_by_query_text(
        &self,
        text: &str,
        top_k: usize,
        exclude: &HashSet<MovieIndex>,
    ) -> AppResult<Vec<Recommendation>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query = match self.embedder.embed(text).await {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed, returning no recommendations");
                return Ok(Vec::new());
            }
        };

        self.search(&query, top_k, exclude).await
    }

    pub async fn recommend_by_preferences(
        &self,
        preferences: &PreferenceRecord,
        top_k: usize,
        exclude: &HashSet<MovieIndex>,
    ) -> AppResult<Vec<Recommendation>> {
        self.recommend_by_query_text(&preferences.to_query_text(), top_k, exclude)
            .await
    }

    /// Searches around the mean vector of the liked movies
    ///
    /// Liked movies without a vector are ignored; if none has one, the result
    /// is empty.
    pub async fn recommend_by_liked_items(
        &self,
        liked: &[MovieIndex],
        top_k: usize,
        exclude: &HashSet<MovieIndex>,
    ) -> AppResult<Vec<Recommendation>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query = {
            let store = self.store.read().await;
            let vectors: Vec<&[f32]> = liked.iter().filter_map(|&i| store.get(i)).collect();
            if vectors.is_empty() {
                return Ok(Vec::new());
            }
            average_vectors(&vectors, None)?
        };

        self.search(&query, top_k, exclude).await
    }

    /// Blends preference and liked-movie rankings, never returning rated movies
    pub async fn refine(
        &self,
        preferences: &PreferenceRecord,
        liked: &[MovieIndex],
        disliked: &[MovieIndex],
        top_k: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let exclude: HashSet<MovieIndex> = liked.iter().chain(disliked).copied().collect();
        self.refine_excluding(preferences, liked, &exclude, top_k)
            .await
    }

    /// [`refine`](Self::refine) with a caller-supplied exclusion set
    ///
    /// `exclude` is expected to contain the liked movies.
    pub async fn refine_excluding(
        &self,
        preferences: &PreferenceRecord,
        liked: &[MovieIndex],
        exclude: &HashSet<MovieIndex>,
        top_k: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let depth = top_k.saturating_mul(OVERFETCH);
        let by_preferences = self
            .recommend_by_preferences(preferences, depth, exclude)
            .await?;
        let by_liked = self.recommend_by_liked_items(liked, depth, exclude).await?;

        let mut blended: Vec<Recommendation> = Vec::new();
        let mut positions: HashMap<MovieIndex, usize> = HashMap::new();

        for rec in &by_preferences {
            positions.insert(rec.index, blended.len());
            blended.push(Recommendation::new(rec.index, rec.score * PREFERENCE_WEIGHT));
        }
        for rec in &by_liked {
            match positions.get(&rec.index) {
                Some(&pos) => blended[pos].score += rec.score * LIKED_WEIGHT,
                None => {
                    positions.insert(rec.index, blended.len());
                    blended.push(Recommendation::new(rec.index, rec.score * LIKED_WEIGHT));
                }
            }
        }

        sort_by_score(&mut blended);
        blended.truncate(top_k);
        Ok(blended)
    }

    /// Ranks a given candidate pool against `query_text`
    ///
    /// Candidates without a vector are skipped. A provider failure is logged
    /// and yields an empty ranking.
    pub async fn rank_candidates(
        &self,
        query_text: &str,
        candidates: &[MovieIndex],
        count: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if count == 0 || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query = match self.embedder.embed(query_text).await {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed, cannot rank candidates");
                return Ok(Vec::new());
            }
        };

        let store = self.store.read().await;
        let (indices, vectors): (Vec<MovieIndex>, Vec<&[f32]>) = candidates
            .iter()
            .filter_map(|&i| store.get(i).map(|v| (i, v)))
            .unzip();

        Ok(top_k_by_similarity(&query, &vectors, count)?
            .into_iter()
            .map(|(pos, score)| Recommendation::new(indices[pos], score))
            .collect())
    }

    /// Stored vectors for the given movies, in input order, skipping unembedded ones
    pub async fn embeddings_for(&self, indices: &[MovieIndex]) -> Vec<(MovieIndex, Embedding)> {
        let store = self.store.read().await;
        indices
            .iter()
            .filter_map(|&i| store.get(i).map(|v| (i, v.to_vec())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::Movie,
        services::{
            providers::MockEmbeddingProvider,
            test_support::{sample_catalog, KeywordEmbedder},
        },
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn ready_engine(dir: &tempfile::TempDir) -> RecommendationEngine {
        let engine = RecommendationEngine::new(
            Arc::new(sample_catalog()),
            Arc::new(KeywordEmbedder),
            VectorStore::new(dir.path().join("cache.json.gz")),
            2,
        );
        engine.initialize_embeddings(false).await.unwrap();
        engine
    }

    fn comedy_fan() -> PreferenceRecord {
        PreferenceRecord {
            genres: vec!["Comedy".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_initialize_generates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir).await;

        assert_eq!(engine.embedded_count().await, sample_catalog().len());
        assert!(dir.path().join("cache.json.gz").exists());
    }

    #[tokio::test]
    async fn test_initialize_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        ready_engine(&dir).await;

        let mut mock = MockEmbeddingProvider::new();
        mock.expect_embed_batch().never();
        mock.expect_name().return_const("mock");

        let engine = RecommendationEngine::new(
            Arc::new(sample_catalog()),
            Arc::new(mock),
            VectorStore::new(dir.path().join("cache.json.gz")),
            2,
        );
        let report = engine.initialize_embeddings(false).await.unwrap();

        assert_eq!(report.cached, sample_catalog().len());
        assert_eq!(report.generated, 0);
    }

    #[tokio::test]
    async fn test_initialize_resumes_partial_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json.gz");

        let mut partial = VectorStore::new(&path);
        partial.put(1, vec![1.0, 0.0, 0.0, 0.0], None);
        partial.persist().unwrap();

        let engine = RecommendationEngine::new(
            Arc::new(sample_catalog()),
            Arc::new(KeywordEmbedder),
            VectorStore::new(&path),
            100,
        );
        let report = engine.initialize_embeddings(false).await.unwrap();

        assert_eq!(report.cached, 1);
        assert_eq!(report.generated, sample_catalog().len() - 1);
    }

    #[tokio::test]
    async fn test_initialize_stops_at_first_failed_batch() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut mock = MockEmbeddingProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_embed_batch().returning(move |texts| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            } else {
                Err(AppError::ExternalApi("rate limited".to_string()))
            }
        });

        let engine = RecommendationEngine::new(
            Arc::new(sample_catalog()),
            Arc::new(mock),
            VectorStore::new(dir.path().join("cache.json.gz")),
            2,
        );
        let report = engine.initialize_embeddings(false).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.generated, 2);
        assert_eq!(report.failed, sample_catalog().len() - 2);
        assert_eq!(engine.embedded_count().await, 2);
    }

    #[tokio::test]
    async fn test_initialize_skips_undescribable_movies() {
        let dir = tempfile::tempdir().unwrap();
        let mut blank = Movie::new(99, "x");
        blank.name = None;
        let catalog = Catalog::from_movies(vec![Movie::new(1, "Comedy night"), blank]).unwrap();

        let engine = RecommendationEngine::new(
            Arc::new(catalog),
            Arc::new(KeywordEmbedder),
            VectorStore::new(dir.path().join("cache.json.gz")),
            10,
        );
        let report = engine.initialize_embeddings(false).await.unwrap();

        assert_eq!(report.generated, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_recommend_by_preferences_ranks_matching_genre_first() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir).await;

        let recs = engine
            .recommend_by_preferences(&comedy_fan(), 2, &HashSet::new())
            .await
            .unwrap();

        assert_eq!(recs.len(), 2);
        let comedies: HashSet<MovieIndex> = [1, 2].into_iter().collect();
        assert!(recs.iter().all(|r| comedies.contains(&r.index)));
    }

    #[tokio::test]
    async fn test_recommend_by_query_text_provider_failure_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        ready_engine(&dir).await;

        let mut mock = MockEmbeddingProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_embed()
            .returning(|_| Err(AppError::ExternalApi("down".to_string())));

        let engine = RecommendationEngine::new(
            Arc::new(sample_catalog()),
            Arc::new(mock),
            VectorStore::new(dir.path().join("cache.json.gz")),
            2,
        );
        engine.initialize_embeddings(false).await.unwrap();

        let recs = engine
            .recommend_by_query_text("comedy", 5, &HashSet::new())
            .await
            .unwrap();
        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_recommend_by_liked_items_without_vectors_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir).await;

        let recs = engine
            .recommend_by_liked_items(&[404], 5, &HashSet::new())
            .await
            .unwrap();
        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_refine_never_returns_rated_movies() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir).await;

        let liked = vec![1];
        let disliked = vec![2, 5];
        let recs = engine
            .refine(&comedy_fan(), &liked, &disliked, 10)
            .await
            .unwrap();

        assert!(!recs.is_empty());
        assert!(recs
            .iter()
            .all(|r| !liked.contains(&r.index) && !disliked.contains(&r.index)));
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_refine_blends_weights() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir).await;

        let recs = engine
            .refine(&comedy_fan(), &[], &[], 3)
            .await
            .unwrap();
        let plain = engine
            .recommend_by_preferences(&comedy_fan(), 3, &HashSet::new())
            .await
            .unwrap();

        for (blended, raw) in recs.iter().zip(&plain) {
            assert_eq!(blended.index, raw.index);
            assert!((blended.score - raw.score * PREFERENCE_WEIGHT).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_huge_count_returns_whole_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir).await;
        let total = sample_catalog().len();

        let recs = engine
            .recommend_by_query_text("comedy", usize::MAX, &HashSet::new())
            .await
            .unwrap();
        assert_eq!(recs.len(), total);

        let recs = engine
            .refine(&comedy_fan(), &[1], &[], usize::MAX)
            .await
            .unwrap();
        assert_eq!(recs.len(), total - 1);
        assert!(recs.iter().all(|r| r.index != 1));
    }

    #[tokio::test]
    async fn test_rank_candidates_limits_to_pool() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir).await;

        let recs = engine
            .rank_candidates("Genres: Drama", &[1, 3, 404], 5)
            .await
            .unwrap();

        let indices: Vec<MovieIndex> = recs.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_embeddings_for_skips_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir).await;

        let vectors = engine.embeddings_for(&[2, 404, 1]).await;
        let indices: Vec<MovieIndex> = vectors.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![2, 1]);
    }
}
