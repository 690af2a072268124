use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use crate::{
    models::{Movie, MovieIndex, PreferenceRecord},
    services::catalog::Catalog,
};

/// Case-insensitive literal substring match; a blank needle matches nothing
fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

fn contains_any(haystack: Option<&str>, needles: &[String]) -> bool {
    needles.iter().any(|n| contains_ci(haystack, n))
}

/// Attribute-based candidate selection over the catalog
///
/// Every filter returns movie indices in catalog order.
#[derive(Clone)]
pub struct ContentFilter {
    catalog: Arc<Catalog>,
}

impl ContentFilter {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    fn select(&self, predicate: impl Fn(&Movie) -> bool) -> Vec<MovieIndex> {
        self.catalog
            .movies()
            .iter()
            .filter(|m| predicate(m))
            .map(|m| m.index)
            .collect()
    }

    pub fn filter_by_actor(&self, actor: &str) -> Vec<MovieIndex> {
        self.select(|m| contains_ci(m.actors.as_deref(), actor))
    }

    pub fn filter_by_director(&self, director: &str) -> Vec<MovieIndex> {
        self.select(|m| contains_ci(m.director.as_deref(), director))
    }

    pub fn filter_by_genre(&self, genre: &str) -> Vec<MovieIndex> {
        self.select(|m| contains_ci(m.genres.as_deref(), genre))
    }

    /// Movies matching at least one of `genres`
    pub fn filter_by_any_genre(&self, genres: &[String]) -> Vec<MovieIndex> {
        if genres.is_empty() {
            return Vec::new();
        }
        self.select(|m| contains_any(m.genres.as_deref(), genres))
    }

    /// Movies matching every non-empty field among actors, directors and genres
    ///
    /// Within one field any listed value may match. A record with none of
    /// those fields set matches the whole catalog.
    pub fn filter_by_preferences(&self, preferences: &PreferenceRecord) -> Vec<MovieIndex> {
        self.select(|m| {
            (preferences.actors.is_empty() || contains_any(m.actors.as_deref(), &preferences.actors))
                && (preferences.directors.is_empty()
                    || contains_any(m.director.as_deref(), &preferences.directors))
                && (preferences.genres.is_empty()
                    || contains_any(m.genres.as_deref(), &preferences.genres))
        })
    }

    /// Movies rated at most `max_age_rating`; unrated movies are excluded
    pub fn filter_by_age_rating(&self, max_age_rating: f32) -> Vec<MovieIndex> {
        self.select(|m| m.age_rating.is_some_and(|r| r <= max_age_rating))
    }

    /// Drops excluded indices, keeping order
    pub fn exclude_rated(
        &self,
        indices: &[MovieIndex],
        exclude: &HashSet<MovieIndex>,
    ) -> Vec<MovieIndex> {
        indices
            .iter()
            .copied()
            .filter(|i| !exclude.contains(i))
            .collect()
    }

    /// Distinct genres of the given movies, original case, sorted
    pub fn extract_genres(&self, indices: &[MovieIndex]) -> BTreeSet<String> {
        self.catalog
            .get_by_indices(indices)
            .into_iter()
            .flat_map(|m| m.genre_list())
            .map(str::to_string)
            .collect()
    }

    /// Genres present in both sets, compared trimmed and lowercased
    pub fn genre_intersection(
        &self,
        genres1: &BTreeSet<String>,
        genres2: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let normalize = |set: &BTreeSet<String>| -> BTreeSet<String> {
            set.iter()
                .map(|g| g.trim().to_lowercase())
                .filter(|g| !g.is_empty())
                .collect()
        };

        let left = normalize(genres1);
        let right = normalize(genres2);
        left.intersection(&right).cloned().collect()
    }
}
