use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey},
    embeddings::Embedding,
    error::AppResult,
    services::providers::EmbeddingProvider,
};

/// Wraps an [`EmbeddingProvider`] with a Redis read-through cache for single
/// query embeddings
///
/// Batch calls bypass Redis: they only happen while building the catalog
/// embeddings, which are persisted by the vector store instead.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Cache,
    model: String,
    ttl: u64,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, cache: Cache, model: String, ttl: u64) -> Self {
        Self {
            inner,
            cache,
            model,
            ttl,
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn embed(&self, text: &str) -> AppResult<Embedding> {
        cached!(
            self.cache,
            CacheKey::QueryEmbedding {
                model: self.model.clone(),
                text: text.to_string(),
            },
            self.ttl,
            self.inner.embed(text)
        )
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        self.inner.embed_batch(texts).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
