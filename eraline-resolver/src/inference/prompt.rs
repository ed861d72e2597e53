//! Prompt shared by every inference provider

use crate::models::SubjectMetadata;

const INSTRUCTIONS: &str = r#"Use every information source available:
1. TITLE: check whether the title contains a year ("1917", "2001", "2049", "1984").
2. GENRES: War means identify the war (WWI 1914-1918, WWII 1939-1945, Vietnam 1960s-1970s); Western usually means 1850-1900; History usually means before 1950.
3. YOUR KNOWLEDGE of the work when the synopsis is insufficient ("Seven Samurai" is 1586, "Gladiator" is about 180).
4. SYNOPSIS: explicit time references.

Sequels, prequels and remakes:
- Decide first whether this is a sequel, prequel or remake (look for "sequel", "prequel", "first film", "前作", "第1作目", numbered titles, "II").
- If it is, recall the ORIGINAL work's setting and apply relative phrasing ("10 years after", "decades later", "before the events of") to it to compute an absolute year.
- Fictional settings still have franchise timelines: Avatar (2009) is set in 2154, so "about 10 years after the first film" is 2164 or later.

Rules:
1. A standalone science-fiction work set in a specific future year returns that year.
2. Time travel: put the other significant years in additionalYears.
3. Pure fantasy with no historical period and no computable timeline: startYear null, period "NO_PERIOD".
4. "A long time ago in a galaxy far away" style settings: startYear null, period "LONG_AGO".
5. Unspecified near future ("near future", "近未来"): startYear null, period "NEAR_FUTURE".
6. Century settings return the midpoint with "medium" confidence, computed as (century - 1) * 100 + 50 (19th century is 1850).
7. A contemporary setting uses the release year.

Respond ONLY with one JSON object, no Markdown and no code fences:
{
  "startYear": number or null,
  "endYear": number or null,
  "additionalYears": [number] or null,
  "period": "short description, or NO_PERIOD / LONG_AGO / NEAR_FUTURE",
  "confidence": "high" | "medium" | "low"
}

Examples:
- Gladiator: {"startYear": 180, "endYear": null, "additionalYears": null, "period": "180", "confidence": "high"}
- Star Wars Episode IV: {"startYear": null, "endYear": null, "additionalYears": null, "period": "LONG_AGO", "confidence": "high"}
- Interstellar: {"startYear": 2067, "endYear": null, "additionalYears": [2100, 2130], "period": "2067", "confidence": "high"}
- Blade Runner 2049: {"startYear": 2049, "endYear": null, "additionalYears": null, "period": "2049", "confidence": "high"}
- The Lord of the Rings: {"startYear": null, "endYear": null, "additionalYears": null, "period": "NO_PERIOD", "confidence": "high"}
- Near-future science fiction: {"startYear": null, "endYear": null, "additionalYears": null, "period": "NEAR_FUTURE", "confidence": "high"}

JSON response:"#;

/// Build the prompt for one subject
pub fn build_prompt(subject: &SubjectMetadata) -> String {
    let release_year = subject
        .release_year()
        .map(|y| y.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let genres = if subject.genres.is_empty() {
        "unknown".to_string()
    } else {
        subject
            .genres
            .iter()
            .map(|g| g.name())
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "You are an expert on the in-story time period of films. \
         Determine when this film's story takes place.\n\n\
         Title: {}\n\
         Original Title: {}\n\
         Release Year: {}\n\
         Synopsis (primary locale): {}\n\
         Synopsis (secondary locale): {}\n\
         Genres: {}\n\n\
         {}",
        subject.title,
        subject.original_title.as_deref().unwrap_or(&subject.title),
        release_year,
        subject.synopsis.as_deref().unwrap_or("N/A"),
        subject.synopsis_secondary.as_deref().unwrap_or("N/A"),
        genres,
        INSTRUCTIONS
    )
}
