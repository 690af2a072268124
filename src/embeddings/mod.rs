pub mod similarity;
pub mod vector_store;

pub use similarity::{
    average_vectors, cosine_similarity, intersection_by_similarity, top_k_by_similarity, Embedding,
};
pub use vector_store::{VectorMetadata, VectorStore};
