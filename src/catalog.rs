use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CatalogError;
use crate::models::{CastMember, Genre, MovieDetail, MovieId, MovieSummary, SearchQuery, Video};

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";

/// Read-only view of the movie catalog. Every call is a single GET; nothing retries.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Most popular first, in the order the catalog returns them.
    async fn discover(&self) -> Result<Vec<MovieSummary>, CatalogError>;
    /// Title search, catalog relevance order.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<MovieSummary>, CatalogError>;
    async fn movie_detail(&self, id: MovieId) -> Result<MovieDetail, CatalogError>;
    async fn credits(&self, id: MovieId) -> Result<Vec<CastMember>, CatalogError>;
    async fn videos(&self, id: MovieId) -> Result<Vec<Video>, CatalogError>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TmdbClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let user_agent = format!("moviescout/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(path = %path, "Catalog request");
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(path = %path, error = %e, "Catalog request failed");
                CatalogError::from(e)
            })?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            warn!(path = %path, status = status.as_u16(), "Catalog returned error status");
            return Err(CatalogError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            warn!(path = %path, error = %e, "Catalog payload did not parse");
            CatalogError::Malformed {
                path: path.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn discover(&self) -> Result<Vec<MovieSummary>, CatalogError> {
        let page: ResultsPage<MovieSummary> = self
            .get_json("/discover/movie?sort_by=popularity.desc")
            .await?;
        Ok(page.results)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MovieSummary>, CatalogError> {
        let path = format!(
            "/search/movie?query={}",
            urlencoding::encode(query.as_str())
        );
        let page: ResultsPage<MovieSummary> = self.get_json(&path).await?;
        Ok(page.results)
    }

    async fn movie_detail(&self, id: MovieId) -> Result<MovieDetail, CatalogError> {
        let path = format!("/movie/{id}");
        let payload: DetailPayload = self.get_json(&path).await?;
        if payload.summary.id != id {
            return Err(CatalogError::Malformed {
                path,
                reason: format!("expected movie {id}, got {}", payload.summary.id),
            });
        }
        Ok(payload.into())
    }

    async fn credits(&self, id: MovieId) -> Result<Vec<CastMember>, CatalogError> {
        let credits: Credits = self.get_json(&format!("/movie/{id}/credits")).await?;
        Ok(credits.cast)
    }

    async fn videos(&self, id: MovieId) -> Result<Vec<Video>, CatalogError> {
        let page: ResultsPage<Video> = self.get_json(&format!("/movie/{id}/videos")).await?;
        Ok(page.results)
    }
}

#[derive(Debug, Deserialize)]
struct ResultsPage<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Credits {
    cast: Vec<CastMember>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DetailPayload {
    #[serde(flatten)]
    summary: MovieSummary,
    vote_count: Option<u64>,
    runtime: Option<u32>,
    budget: Option<u64>,
    revenue: Option<u64>,
    #[serde(default)]
    genres: Vec<Genre>,
    tagline: Option<String>,
    overview: Option<String>,
    status: Option<String>,
    #[serde(default)]
    production_countries: Vec<Named>,
    #[serde(default)]
    production_companies: Vec<Named>,
}

impl From<DetailPayload> for MovieDetail {
    fn from(p: DetailPayload) -> Self {
        MovieDetail {
            summary: p.summary,
            vote_count: p.vote_count,
            runtime_minutes: p.runtime.filter(|r| *r > 0),
            budget: p.budget.filter(|b| *b > 0),
            revenue: p.revenue.filter(|r| *r > 0),
            genres: p.genres,
            tagline: non_blank(p.tagline),
            overview: non_blank(p.overview),
            status: non_blank(p.status),
            production_countries: names(p.production_countries),
            production_companies: names(p.production_companies),
        }
    }
}

fn names(list: Vec<Named>) -> Vec<String> {
    list.into_iter().map(|n| n.name).collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
