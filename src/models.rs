use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::utils::{extract_year, format_runtime, format_usd};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const YOUTUBE_EMBED_BASE: &str = "https://www.youtube.com/embed";

pub type MovieId = i64;

/// Trimmed user search text. The empty query means "no filter" and maps to discover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key used for trending counters: lowercase, single-spaced.
    pub fn normalized(&self) -> String {
        self.0
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub original_language: String,
}

impl MovieSummary {
    pub fn year(&self) -> Option<String> {
        self.release_date.as_deref().and_then(extract_year)
    }

    pub fn poster_url(&self) -> Option<String> {
        self.poster_path
            .as_deref()
            .map(|p| format!("{IMAGE_BASE}/w500{p}"))
    }

    /// One decimal, or "N/A" when the catalog has no usable rating.
    pub fn rating_label(&self) -> String {
        match self.vote_average {
            Some(v) if v > 0.0 => format!("{v:.1}"),
            _ => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub summary: MovieSummary,
    pub vote_count: Option<u64>,
    pub runtime_minutes: Option<u32>,
    pub budget: Option<u64>,
    pub revenue: Option<u64>,
    pub genres: Vec<Genre>,
    pub tagline: Option<String>,
    pub overview: Option<String>,
    pub status: Option<String>,
    pub production_countries: Vec<String>,
    pub production_companies: Vec<String>,
}

impl MovieDetail {
    pub fn id(&self) -> MovieId {
        self.summary.id
    }

    pub fn runtime_label(&self) -> String {
        self.runtime_minutes
            .map(format_runtime)
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn budget_label(&self) -> String {
        self.budget
            .map(format_usd)
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn revenue_label(&self) -> String {
        self.revenue
            .map(format_usd)
            .unwrap_or_else(|| "N/A".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub character: String,
    #[serde(default)]
    pub profile_path: Option<String>,
}

impl CastMember {
    pub fn profile_url(&self) -> Option<String> {
        self.profile_path
            .as_deref()
            .map(|p| format!("{IMAGE_BASE}/w200{p}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoKind {
    Trailer,
    Teaser,
    Clip,
    Featurette,
    #[serde(rename = "Behind the Scenes")]
    BehindTheScenes,
    Bloopers,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub key: String,
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: VideoKind,
    #[serde(default)]
    pub official: bool,
}

impl Video {
    pub fn is_youtube(&self) -> bool {
        self.site.eq_ignore_ascii_case("YouTube")
    }

    pub fn embed_url(&self) -> Option<String> {
        self.is_youtube()
            .then(|| format!("{YOUTUBE_EMBED_BASE}/{}", self.key))
    }
}

/// Everything the detail view shows for one movie.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieView {
    pub detail: MovieDetail,
    pub cast: Vec<CastMember>,
    pub videos: Vec<Video>,
    pub trailer: Option<Video>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub term: String,
    pub count: u64,
    pub representative_movie: MovieSummary,
    pub last_updated: DateTime<Utc>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn null_as_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
