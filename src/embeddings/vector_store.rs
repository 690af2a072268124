use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::similarity::{cosine_similarity, sort_scored, Embedding};
use crate::error::{AppError, AppResult, VectorError};
use crate::models::MovieIndex;

/// Free-form metadata stored next to an embedding
pub type VectorMetadata = BTreeMap<String, String>;

const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct VectorEntry {
    index: MovieIndex,
    vector: Embedding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<VectorMetadata>,
}

/// On-disk layout of the cache artifact (gzip-compressed JSON)
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<VectorEntry>,
}

/// In-memory movie embeddings with exhaustive cosine search
///
/// Entries keep the slot of their first insertion, which is the tie-break
/// order for search results.
#[derive(Debug)]
pub struct VectorStore {
    cache_path: PathBuf,
    entries: Vec<VectorEntry>,
    positions: HashMap<MovieIndex, usize>,
}

impl VectorStore {
    /// Creates an empty store persisting to `cache_path`
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Stores a vector, replacing any previous vector for `index`
    pub fn put(&mut self, index: MovieIndex, vector: Embedding, metadata: Option<VectorMetadata>) {
        let entry = VectorEntry {
            index,
            vector,
            metadata,
        };

        match self.positions.get(&index) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.positions.insert(index, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Stores vectors paired by position with `indices`
    ///
    /// Extra indices or vectors are ignored. A metadata list shorter than the
    /// batch leaves the remaining entries without metadata.
    pub fn put_batch(
        &mut self,
        indices: &[MovieIndex],
        vectors: Vec<Embedding>,
        metadata: Option<Vec<VectorMetadata>>,
    ) {
        let mut metadata = metadata.unwrap_or_default().into_iter();
        for (&index, vector) in indices.iter().zip(vectors) {
            self.put(index, vector, metadata.next());
        }
    }

    pub fn get(&self, index: MovieIndex) -> Option<&[f32]> {
        self.positions
            .get(&index)
            .map(|&pos| self.entries[pos].vector.as_slice())
    }

    pub fn metadata(&self, index: MovieIndex) -> Option<&VectorMetadata> {
        self.positions
            .get(&index)
            .and_then(|&pos| self.entries[pos].metadata.as_ref())
    }

    /// Looks up several vectors; the result is aligned with `indices`
    pub fn get_many(&self, indices: &[MovieIndex]) -> Vec<Option<&[f32]>> {
        indices.iter().map(|&i| self.get(i)).collect()
    }

    pub fn has(&self, index: MovieIndex) -> bool {
        self.positions.contains_key(&index)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension of the stored vectors, if any are stored
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.vector.len())
    }

    /// Stored indices in insertion order
    pub fn indices(&self) -> Vec<MovieIndex> {
        self.entries.iter().map(|e| e.index).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }

    /// Ranks every stored vector outside `exclude` by cosine similarity to `query`
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        exclude: &HashSet<MovieIndex>,
    ) -> Result<Vec<(MovieIndex, f32)>, VectorError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if exclude.contains(&entry.index) {
                continue;
            }
            let similarity = cosine_similarity(query, &entry.vector)?;
            scored.push((entry.index, similarity));
        }

        sort_scored(&mut scored);
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Writes every entry to the cache artifact
    pub fn persist(&self) -> AppResult<()> {
        if let Some(parent) = self.cache_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Internal(format!("Failed to create cache directory: {}", e))
                })?;
            }
        }

        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec(&file)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .and_then(|_| encoder.finish())
            .and_then(|compressed| std::fs::write(&self.cache_path, compressed))
            .map_err(|e| AppError::Internal(format!("Failed to write embeddings cache: {}", e)))?;

        tracing::info!(
            count = self.entries.len(),
            path = %self.cache_path.display(),
            "Saved embeddings cache"
        );

        Ok(())
    }

    /// Replaces the store's contents with the cache artifact
    ///
    /// Returns false, leaving the store untouched, when there is no usable
    /// cache. A missing file is not treated as a failure.
    pub fn load(&mut self) -> bool {
        if !self.cache_path.exists() {
            tracing::info!(path = %self.cache_path.display(), "No embeddings cache found");
            return false;
        }

        match self.read_cache() {
            Ok(entries) => {
                self.entries = entries;
                self.positions = self
                    .entries
                    .iter()
                    .enumerate()
                    .map(|(pos, e)| (e.index, pos))
                    .collect();
                tracing::info!(count = self.entries.len(), "Loaded embeddings cache");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %self.cache_path.display(), "Ignoring embeddings cache");
                false
            }
        }
    }

    fn read_cache(&self) -> AppResult<Vec<VectorEntry>> {
        let compressed = std::fs::read(&self.cache_path)
            .map_err(|e| AppError::CacheUnavailable(e.to_string()))?;

        let mut json = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut json)
            .map_err(|e| AppError::CacheUnavailable(format!("Invalid gzip data: {}", e)))?;

        let file: CacheFile = serde_json::from_slice(&json)
            .map_err(|e| AppError::CacheUnavailable(format!("Invalid cache contents: {}", e)))?;

        if file.version != CACHE_FORMAT_VERSION {
            return Err(AppError::CacheUnavailable(format!(
                "Unsupported cache version {}",
                file.version
            )));
        }

        let mut seen = HashSet::new();
        let dimension = file.entries.first().map(|e| e.vector.len());
        for entry in &file.entries {
            if Some(entry.vector.len()) != dimension {
                return Err(AppError::CacheUnavailable(
                    "Cache holds vectors of mixed dimension".to_string(),
                ));
            }
            if !seen.insert(entry.index) {
                return Err(AppError::CacheUnavailable(format!(
                    "Duplicate index {} in cache",
                    entry.index
                )));
            }
        }

        Ok(file.entries)
    }
}
