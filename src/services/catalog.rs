use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{Movie, MovieIndex},
};

/// Summary of what the catalog contains
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogInfo {
    pub total: usize,
    pub genres: Vec<String>,
    pub countries: Vec<String>,
    pub age_ratings: Vec<f32>,
}

/// Immutable set of movies keyed by their stable index
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    movies: Vec<Movie>,
    positions: HashMap<MovieIndex, usize>,
}

impl Catalog {
    /// Builds a catalog, keeping the given order
    pub fn from_movies(movies: Vec<Movie>) -> AppResult<Self> {
        let mut positions = HashMap::with_capacity(movies.len());
        for (position, movie) in movies.iter().enumerate() {
            if positions.insert(movie.index, position).is_some() {
                return Err(AppError::Catalog(format!(
                    "Duplicate movie index {}",
                    movie.index
                )));
            }
        }

        Ok(Self { movies, positions })
    }

    /// Loads a catalog from a JSON array of movie records
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Catalog(format!("Cannot read catalog {}: {}", path.display(), e))
        })?;
        let movies: Vec<Movie> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Catalog(format!("Invalid catalog {}: {}", path.display(), e))
        })?;

        let catalog = Self::from_movies(movies)?;
        tracing::info!(movies = catalog.len(), path = %path.display(), "Catalog loaded");
        Ok(catalog)
    }

    pub fn get_by_index(&self, index: MovieIndex) -> Option<&Movie> {
        self.positions.get(&index).map(|&p| &self.movies[p])
    }

    /// Movies for the given indices, in input order; unknown indices are skipped
    pub fn get_by_indices(&self, indices: &[MovieIndex]) -> Vec<&Movie> {
        indices
            .iter()
            .filter_map(|&i| self.get_by_index(i))
            .collect()
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn contains(&self, index: MovieIndex) -> bool {
        self.positions.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    /// Text sent to the embedding provider for a movie
    ///
    /// Only present, non-blank fields are rendered, each with its label, in a
    /// fixed order and joined with ". ".
    pub fn describe_for_embedding(movie: &Movie) -> String {
        let fields = [
            ("Title", &movie.name),
            ("Genres", &movie.genres),
            ("Director", &movie.director),
            ("Actors", &movie.actors),
            ("Country", &movie.country),
            ("Description", &movie.description),
        ];

        fields
            .iter()
            .filter_map(|(label, value)| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}: {}", label, v))
            })
            .collect::<Vec<_>>()
            .join(". ")
    }

    pub fn info(&self) -> CatalogInfo {
        let mut genres = BTreeSet::new();
        let mut countries = BTreeSet::new();
        let mut age_ratings: Vec<f32> = Vec::new();

        for movie in &self.movies {
            genres.extend(movie.genre_list().into_iter().map(str::to_string));
            if let Some(country) = movie.country.as_deref().map(str::trim) {
                if !country.is_empty() {
                    countries.insert(country.to_string());
                }
            }
            if let Some(rating) = movie.age_rating {
                age_ratings.push(rating);
            }
        }

        age_ratings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        age_ratings.dedup();

        CatalogInfo {
            total: self.movies.len(),
            genres: genres.into_iter().collect(),
            countries: countries.into_iter().collect(),
            age_ratings,
        }
    }
}
