use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder query used when a preference record carries nothing
pub const EMPTY_PREFERENCES_QUERY: &str = "Movies";

/// Structured viewing preferences extracted from a conversation
///
/// Deserialization is lenient because records usually come from a language
/// model: list fields accept a single string or `null`, and unknown keys are
/// ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PreferenceRecord {
    #[serde(default, deserialize_with = "one_or_many")]
    pub actors: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub directors: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub genres: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub themes: Vec<String>,
    #[serde(default)]
    pub era: Option<String>,
    #[serde(default)]
    pub other: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

fn non_blank(values: &[String]) -> Vec<&str> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect()
}

fn non_blank_opt(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn union(first: &[String], second: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for value in non_blank(first).into_iter().chain(non_blank(second)) {
        if !merged.iter().any(|m| m == value) {
            merged.push(value.to_string());
        }
    }
    merged
}

impl PreferenceRecord {
    /// True when no field would contribute to a query
    pub fn is_empty(&self) -> bool {
        non_blank(&self.actors).is_empty()
            && non_blank(&self.directors).is_empty()
            && non_blank(&self.genres).is_empty()
            && non_blank(&self.themes).is_empty()
            && non_blank_opt(&self.mood).is_none()
            && non_blank_opt(&self.era).is_none()
            && non_blank_opt(&self.other).is_none()
    }

    /// First named actor; further names are ignored by entity filtering
    pub fn primary_actor(&self) -> Option<&str> {
        non_blank(&self.actors).into_iter().next()
    }

    /// First named director
    pub fn primary_director(&self) -> Option<&str> {
        non_blank(&self.directors).into_iter().next()
    }

    /// Renders the record as the text that gets embedded for similarity search
    ///
    /// Field order is fixed (actors, directors, genres, mood, themes, era,
    /// other) so the same record always yields the same query.
    pub fn to_query_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        let actors = non_blank(&self.actors);
        if !actors.is_empty() {
            parts.push(format!("Actors: {}", actors.join(", ")));
        }

        let directors = non_blank(&self.directors);
        if !directors.is_empty() {
            parts.push(format!("Directors: {}", directors.join(", ")));
        }

        let genres = non_blank(&self.genres);
        if !genres.is_empty() {
            parts.push(format!("Genres: {}", genres.join(", ")));
        }

        if let Some(mood) = non_blank_opt(&self.mood) {
            parts.push(format!("Mood: {}", mood));
        }

        let themes = non_blank(&self.themes);
        if !themes.is_empty() {
            parts.push(format!("Themes: {}", themes.join(", ")));
        }

        if let Some(era) = non_blank_opt(&self.era) {
            parts.push(format!("Era: {}", era));
        }

        if let Some(other) = non_blank_opt(&self.other) {
            parts.push(other.to_string());
        }

        if parts.is_empty() {
            EMPTY_PREFERENCES_QUERY.to_string()
        } else {
            parts.join(". ")
        }
    }

    /// Merges two users' records for a shared query
    ///
    /// List fields are unioned (first-seen order, no duplicates) and moods are
    /// concatenated. Era and free-form notes are personal and not carried over.
    pub fn combine(&self, other: &PreferenceRecord) -> PreferenceRecord {
        let mood = match (non_blank_opt(&self.mood), non_blank_opt(&other.mood)) {
            (Some(a), Some(b)) => Some(format!("{}, {}", a, b)),
            (Some(a), None) => Some(a.to_string()),
            (None, Some(b)) => Some(b.to_string()),
            (None, None) => None,
        };

        PreferenceRecord {
            actors: union(&self.actors, &other.actors),
            directors: union(&self.directors, &other.directors),
            genres: union(&self.genres, &other.genres),
            mood,
            themes: union(&self.themes, &other.themes),
            era: None,
            other: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_deserialization() {
        let json = r#"{
            "actors": "Tom Hanks",
            "directors": null,
            "genres": ["Drama", "War"],
            "mood": "thoughtful",
            "confidence": 0.9
        }"#;
        let prefs: PreferenceRecord = serde_json::from_str(json).unwrap();

        assert_eq!(prefs.actors, vec!["Tom Hanks"]);
        assert!(prefs.directors.is_empty());
        assert_eq!(prefs.genres, vec!["Drama", "War"]);
        assert_eq!(prefs.mood.as_deref(), Some("thoughtful"));
        assert!(prefs.themes.is_empty());
    }

    #[test]
    fn test_empty_object_is_empty_record() {
        let prefs: PreferenceRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs, PreferenceRecord::default());
        assert!(prefs.is_empty());
    }

    #[test]
    fn test_query_text_field_order() {
        let prefs = PreferenceRecord {
            actors: vec!["Keanu Reeves".to_string(), "Carrie-Anne Moss".to_string()],
            directors: vec!["Lana Wachowski".to_string()],
            genres: vec!["Sci-Fi".to_string()],
            mood: Some("tense".to_string()),
            themes: vec!["simulation".to_string()],
            era: Some("90s".to_string()),
            other: Some("no romance".to_string()),
        };

        assert_eq!(
            prefs.to_query_text(),
            "Actors: Keanu Reeves, Carrie-Anne Moss. Directors: Lana Wachowski. \
             Genres: Sci-Fi. Mood: tense. Themes: simulation. Era: 90s. no romance"
        );
    }

    #[test]
    fn test_query_text_placeholder() {
        let prefs = PreferenceRecord {
            actors: vec!["  ".to_string()],
            mood: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(prefs.to_query_text(), EMPTY_PREFERENCES_QUERY);
    }

    #[test]
    fn test_primary_entities_skip_blanks() {
        let prefs = PreferenceRecord {
            actors: vec!["".to_string(), "Jean Reno".to_string(), "Gary Oldman".to_string()],
            ..Default::default()
        };
        assert_eq!(prefs.primary_actor(), Some("Jean Reno"));
        assert_eq!(prefs.primary_director(), None);
    }

    #[test]
    fn test_combine_unions_lists_and_moods() {
        let first = PreferenceRecord {
            genres: vec!["Comedy".to_string(), "Drama".to_string()],
            mood: Some("light".to_string()),
            era: Some("80s".to_string()),
            ..Default::default()
        };
        let second = PreferenceRecord {
            genres: vec!["Drama".to_string(), "Thriller".to_string()],
            actors: vec!["Bill Murray".to_string()],
            mood: Some("cozy".to_string()),
            ..Default::default()
        };

        let combined = first.combine(&second);
        assert_eq!(combined.genres, vec!["Comedy", "Drama", "Thriller"]);
        assert_eq!(combined.actors, vec!["Bill Murray"]);
        assert_eq!(combined.mood.as_deref(), Some("light, cozy"));
        assert_eq!(combined.era, None);
    }

    #[test]
    fn test_combine_single_mood() {
        let first = PreferenceRecord::default();
        let second = PreferenceRecord {
            mood: Some("dark".to_string()),
            ..Default::default()
        };
        assert_eq!(first.combine(&second).mood.as_deref(), Some("dark"));
    }
}
