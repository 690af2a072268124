use crate::{
    embeddings::Embedding,
    error::AppResult,
    models::Movie,
    services::{catalog::Catalog, providers::EmbeddingProvider},
};

const AXES: [&str; 4] = ["comedy", "drama", "thriller", "horror"];

/// Deterministic embedder: one axis per genre keyword found in the text
pub(crate) struct KeywordEmbedder;

impl KeywordEmbedder {
    pub(crate) fn vector(text: &str) -> Embedding {
        let text = text.to_lowercase();
        AXES.iter()
            .map(|k| text.matches(k).count() as f32 + 0.1)
            .collect()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Embedding> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

pub(crate) fn sample_catalog() -> Catalog {
    Catalog::from_movies(vec![
        Movie::new(1, "Laugh Riot")
            .with_genres("Comedy")
            .with_actors("Bill Murray")
            .with_director("Harold Ramis"),
        Movie::new(2, "Office Party")
            .with_genres("Comedy")
            .with_actors("Bill Murray, Tina Fey")
            .with_director("Ivan Reitman"),
        Movie::new(3, "Long Goodbye")
            .with_genres("Drama")
            .with_actors("Meryl Streep")
            .with_director("Sofia Coppola"),
        Movie::new(4, "Quiet Tears")
            .with_genres("Drama, Comedy")
            .with_actors("Meryl Streep, Bill Murray")
            .with_director("Sofia Coppola"),
        Movie::new(5, "Night Chase")
            .with_genres("Thriller")
            .with_actors("Tom Hardy")
            .with_director("Ridley Scott"),
        Movie::new(6, "Dark Hall")
            .with_genres("Horror")
            .with_actors("Toni Collette")
            .with_director("Ari Aster"),
        Movie::new(7, "Edge of Fear")
            .with_genres("Thriller, Horror")
            .with_actors("Tom Hardy")
            .with_director("Ari Aster"),
        Movie::new(8, "Sunny Days")
            .with_genres("Comedy, Drama")
            .with_actors("Tina Fey")
            .with_director("Harold Ramis"),
    ])
    .expect("sample catalog has unique indices")
}
