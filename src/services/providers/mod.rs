/// External model providers
///
/// Embedding generation and preference extraction are reached through these
/// traits so the recommendation services never construct API clients
/// themselves. Production implementations talk to the OpenAI API; the
/// embedding provider can be wrapped in a Redis read-through cache.
use crate::{embeddings::Embedding, error::AppResult, models::PreferenceRecord};

pub mod cached;
pub mod openai;

pub use cached::CachedEmbeddingProvider;
pub use openai::{OpenAiEmbeddingProvider, OpenAiPreferenceExtractor};

/// Turns text into embedding vectors
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text
    async fn embed(&self, text: &str) -> AppResult<Embedding>;

    /// Embeds several texts in one call
    ///
    /// The result is aligned with `texts`. Implementations must fail rather
    /// than return a vector count different from the input count.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Extracts a structured preference record from a conversation transcript
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PreferenceExtractor: Send + Sync {
    /// Never fails: extraction problems yield an empty record
    async fn extract(&self, transcript: &str) -> PreferenceRecord;

    fn name(&self) -> &'static str;
}
