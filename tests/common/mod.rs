#![allow(dead_code)]

use moviescout::catalog::CatalogApi;
use moviescout::error::{CatalogError, DetailPart};
use moviescout::models::{
    CastMember, MovieDetail, MovieId, MovieSummary, SearchQuery, Video, VideoKind,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

pub const DISCOVER: &str = "<discover>";

pub fn movie(id: MovieId, title: &str) -> MovieSummary {
    MovieSummary {
        id,
        title: title.to_string(),
        poster_path: Some(format!("/{id}.jpg")),
        release_date: Some("2021-09-15".to_string()),
        vote_average: Some(7.8),
        original_language: "en".to_string(),
    }
}

pub fn detail(id: MovieId, title: &str) -> MovieDetail {
    MovieDetail {
        summary: movie(id, title),
        vote_count: Some(1200),
        runtime_minutes: Some(155),
        budget: Some(165_000_000),
        revenue: None,
        genres: Vec::new(),
        tagline: Some("Beyond fear, destiny awaits.".to_string()),
        overview: None,
        status: Some("Released".to_string()),
        production_countries: vec!["United States of America".to_string()],
        production_companies: Vec::new(),
    }
}

pub fn video(id: &str, kind: VideoKind, official: bool, site: &str) -> Video {
    Video {
        id: id.to_string(),
        key: format!("key-{id}"),
        name: id.to_string(),
        site: site.to_string(),
        kind,
        official,
    }
}

/// Scriptable catalog. Queries are keyed by their trimmed text; [`DISCOVER`] stands for
/// the popular list.
#[derive(Default)]
pub struct FakeCatalog {
    pub results: Mutex<HashMap<String, Vec<MovieSummary>>>,
    pub delays: Mutex<HashMap<String, Duration>>,
    pub failing: Mutex<HashSet<String>>,
    pub detail_delays: Mutex<HashMap<MovieId, Duration>>,
    pub part_delays: Mutex<Vec<(DetailPart, Duration)>>,
    pub failing_part: Mutex<Option<DetailPart>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn with_results(self, key: &str, movies: Vec<MovieSummary>) -> Self {
        self.results.lock().unwrap().insert(key.to_string(), movies);
        self
    }

    pub fn with_delay(self, key: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
        self
    }

    pub fn with_failure(self, key: &str) -> Self {
        self.failing.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn with_detail_delay(self, id: MovieId, delay: Duration) -> Self {
        self.detail_delays.lock().unwrap().insert(id, delay);
        self
    }

    /// Extra latency for one sub-request, on top of any per-movie delay.
    pub fn with_part_delay(self, part: DetailPart, delay: Duration) -> Self {
        self.part_delays.lock().unwrap().push((part, delay));
        self
    }

    pub fn fail_part(&self, part: Option<DetailPart>) {
        *self.failing_part.lock().unwrap() = part;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn lookup(&self, key: &str) -> Result<Vec<MovieSummary>, CatalogError> {
        self.calls.lock().unwrap().push(key.to_string());
        let delay = self.delays.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(key) {
            return Err(CatalogError::Status {
                path: "/search/movie".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn part(&self, id: MovieId, part: DetailPart) -> Result<(), CatalogError> {
        let movie_delay = self.detail_delays.lock().unwrap().get(&id).copied();
        let part_delay = self
            .part_delays
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| *p == part)
            .map(|(_, d)| *d);
        let delay = movie_delay.unwrap_or_default() + part_delay.unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.failing_part.lock().unwrap() == Some(part) {
            return Err(CatalogError::Status {
                path: format!("/movie/{id}/{part}"),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogApi for FakeCatalog {
    async fn discover(&self) -> Result<Vec<MovieSummary>, CatalogError> {
        self.lookup(DISCOVER).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MovieSummary>, CatalogError> {
        self.lookup(query.as_str()).await
    }

    async fn movie_detail(&self, id: MovieId) -> Result<MovieDetail, CatalogError> {
        self.part(id, DetailPart::Detail).await?;
        Ok(detail(id, &format!("Movie {id}")))
    }

    async fn credits(&self, id: MovieId) -> Result<Vec<CastMember>, CatalogError> {
        self.part(id, DetailPart::Credits).await?;
        Ok((0..15)
            .map(|n| CastMember {
                id: n,
                name: format!("Actor {n}"),
                character: format!("Role {n}"),
                profile_path: None,
            })
            .collect())
    }

    async fn videos(&self, id: MovieId) -> Result<Vec<Video>, CatalogError> {
        self.part(id, DetailPart::Videos).await?;
        Ok(vec![
            video("teaser", VideoKind::Teaser, false, "Vimeo"),
            video("official", VideoKind::Trailer, true, "Vimeo"),
            video("yt", VideoKind::Trailer, false, "YouTube"),
        ])
    }
}
