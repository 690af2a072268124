use serde::{Deserialize, Serialize};

/// Stable, catalog-assigned movie identifier
pub type MovieIndex = i64;

/// A single catalog entry
///
/// Every descriptive field is optional because catalog rows are frequently
/// incomplete. Text fields holding several values (genres, actors) are
/// comma-separated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub index: MovieIndex,
    #[serde(default, alias = "serial_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub actors: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub age_rating: Option<f32>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Movie {
    /// Creates a movie with only its index and name set
    pub fn new(index: MovieIndex, name: impl Into<String>) -> Self {
        Self {
            index,
            name: Some(name.into()),
            genres: None,
            director: None,
            actors: None,
            country: None,
            age_rating: None,
            description: None,
        }
    }

    pub fn with_genres(mut self, genres: impl Into<String>) -> Self {
        self.genres = Some(genres.into());
        self
    }

    pub fn with_director(mut self, director: impl Into<String>) -> Self {
        self.director = Some(director.into());
        self
    }

    pub fn with_actors(mut self, actors: impl Into<String>) -> Self {
        self.actors = Some(actors.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_age_rating(mut self, age_rating: f32) -> Self {
        self.age_rating = Some(age_rating);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Individual genres, trimmed, in the order they appear
    pub fn genre_list(&self) -> Vec<&str> {
        self.genres
            .as_deref()
            .map(|g| {
                g.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_accepts_serial_name() {
        let json = r#"{"index": 7, "serial_name": "Brother", "genres": "Crime, Drama"}"#;
        let movie: Movie = serde_json::from_str(json).unwrap();

        assert_eq!(movie.index, 7);
        assert_eq!(movie.name.as_deref(), Some("Brother"));
        assert_eq!(movie.director, None);
    }

    #[test]
    fn test_genre_list_trims_and_skips_blanks() {
        let movie = Movie::new(1, "Test").with_genres(" Comedy ,Drama,, ");
        assert_eq!(movie.genre_list(), vec!["Comedy", "Drama"]);
    }

    #[test]
    fn test_genre_list_without_genres() {
        assert!(Movie::new(1, "Test").genre_list().is_empty());
    }
}
