//! Subject metadata consumed from the upstream metadata provider

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Canonical genre tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Action,
    Adventure,
    Animation,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Family,
    Fantasy,
    History,
    Horror,
    Music,
    Mystery,
    Romance,
    ScienceFiction,
    TvMovie,
    Thriller,
    War,
    Western,
}

impl Genre {
    /// Map a TMDb genre id
    pub fn from_tmdb_id(id: u32) -> Option<Self> {
        let genre = match id {
            28 => Genre::Action,
            12 => Genre::Adventure,
            16 => Genre::Animation,
            35 => Genre::Comedy,
            80 => Genre::Crime,
            99 => Genre::Documentary,
            18 => Genre::Drama,
            10751 => Genre::Family,
            14 => Genre::Fantasy,
            36 => Genre::History,
            27 => Genre::Horror,
            10402 => Genre::Music,
            9648 => Genre::Mystery,
            10749 => Genre::Romance,
            878 => Genre::ScienceFiction,
            10770 => Genre::TvMovie,
            53 => Genre::Thriller,
            10752 => Genre::War,
            37 => Genre::Western,
            _ => return None,
        };
        Some(genre)
    }

    /// Parse a display name ("Science Fiction", "war", "sci-fi")
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace(['-', '_'], " ");
        let genre = match normalized.as_str() {
            "action" => Genre::Action,
            "adventure" => Genre::Adventure,
            "animation" => Genre::Animation,
            "comedy" => Genre::Comedy,
            "crime" => Genre::Crime,
            "documentary" => Genre::Documentary,
            "drama" => Genre::Drama,
            "family" => Genre::Family,
            "fantasy" => Genre::Fantasy,
            "history" => Genre::History,
            "horror" => Genre::Horror,
            "music" => Genre::Music,
            "mystery" => Genre::Mystery,
            "romance" => Genre::Romance,
            "science fiction" | "sci fi" | "sf" => Genre::ScienceFiction,
            "tv movie" => Genre::TvMovie,
            "thriller" => Genre::Thriller,
            "war" => Genre::War,
            "western" => Genre::Western,
            _ => return None,
        };
        Some(genre)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Comedy => "Comedy",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Drama => "Drama",
            Genre::Family => "Family",
            Genre::Fantasy => "Fantasy",
            Genre::History => "History",
            Genre::Horror => "Horror",
            Genre::Music => "Music",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::ScienceFiction => "Science Fiction",
            Genre::TvMovie => "TV Movie",
            Genre::Thriller => "Thriller",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }
}

/// Everything the resolver knows about one subject before resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectMetadata {
    /// Stable external identifier (immutable cache key)
    pub subject_id: String,
    /// Display title (primary locale)
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    /// Synopsis in the primary locale
    #[serde(default)]
    pub synopsis: Option<String>,
    /// Synopsis in the secondary locale
    #[serde(default)]
    pub synopsis_secondary: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl SubjectMetadata {
    pub fn new(subject_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn release_year(&self) -> Option<i32> {
        self.release_date.map(|d| d.year())
    }

    pub fn has_genre(&self, genre: Genre) -> bool {
        self.genres.contains(&genre)
    }

    /// Title used for reference searches (original title preferred)
    pub fn search_title(&self) -> &str {
        self.original_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.title)
    }

    /// Lowercased titles, one per line
    pub fn title_text(&self) -> String {
        let mut parts = vec![self.title.as_str()];
        if let Some(original) = self.original_title.as_deref() {
            if original != self.title {
                parts.push(original);
            }
        }
        parts.join("\n").to_lowercase()
    }

    /// Lowercased titles and both synopses, one per line
    pub fn combined_text(&self) -> String {
        let mut parts = vec![self.title_text()];
        for synopsis in [&self.synopsis, &self.synopsis_secondary].into_iter().flatten() {
            if !synopsis.trim().is_empty() {
                parts.push(synopsis.to_lowercase());
            }
        }
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_mapping() {
        assert_eq!(Genre::from_tmdb_id(10752), Some(Genre::War));
        assert_eq!(Genre::from_tmdb_id(878), Some(Genre::ScienceFiction));
        assert_eq!(Genre::from_tmdb_id(1), None);
        assert_eq!(Genre::from_name("Science Fiction"), Some(Genre::ScienceFiction));
        assert_eq!(Genre::from_name("sci-fi"), Some(Genre::ScienceFiction));
        assert_eq!(Genre::from_name("Unknown"), None);
    }

    #[test]
    fn test_combined_text_merges_locales() {
        let subject = SubjectMetadata {
            subject_id: "1".to_string(),
            title: "硫黄島からの手紙".to_string(),
            original_title: Some("Letters from Iwo Jima".to_string()),
            synopsis: Some("1945年、硫黄島。".to_string()),
            synopsis_secondary: Some("In 1945, Japanese SOLDIERS...".to_string()),
            ..Default::default()
        };

        let text = subject.combined_text();
        assert!(text.starts_with("硫黄島からの手紙\nletters from iwo jima\n"));
        assert!(text.contains("\n1945年、硫黄島。"));
        assert!(text.contains("japanese soldiers"));
        assert_eq!(subject.search_title(), "Letters from Iwo Jima");
    }

    #[test]
    fn test_release_year() {
        let mut subject = SubjectMetadata::new("1", "Dunkirk");
        assert_eq!(subject.release_year(), None);
        subject.release_date = NaiveDate::from_ymd_opt(2017, 7, 21);
        assert_eq!(subject.release_year(), Some(2017));
    }
}
