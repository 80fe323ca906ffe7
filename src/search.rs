//! Primary search flow: debounced input, catalog fetch, trending bookkeeping, and the
//! state the presentation layer renders.
//!
//! Every query and every movie selection gets a generation number. A response is only
//! published while its generation is still the latest, so a slow answer to an older
//! query can never overwrite a newer one. The bump and the check both run inside the
//! watch channel's modify closure, which makes compare-and-publish a single step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogApi;
use crate::debounce::Debouncer;
use crate::detail::DetailAggregator;
use crate::error::{CatalogError, PersistenceError};
use crate::models::{MovieId, MovieSummary, MovieView, SearchQuery, TrendingEntry};
use crate::trending::{RecordOutcome, TrendingStore};

pub const SEARCH_ERROR_MESSAGE: &str = "Error fetching movies. Please try again later.";
pub const DETAIL_ERROR_MESSAGE: &str = "Failed to load movie details. Please try again.";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Loading {
        query: SearchQuery,
    },
    Success {
        query: SearchQuery,
        movies: Vec<MovieSummary>,
    },
    Error {
        query: SearchQuery,
        message: String,
    },
}

impl SearchState {
    pub fn results(&self) -> &[MovieSummary] {
        match self {
            SearchState::Success { movies, .. } => movies,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SearchState::Loading { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SearchState::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn query(&self) -> Option<&SearchQuery> {
        match self {
            SearchState::Idle => None,
            SearchState::Loading { query }
            | SearchState::Success { query, .. }
            | SearchState::Error { query, .. } => Some(query),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetailState {
    #[default]
    Closed,
    Loading {
        id: MovieId,
    },
    Open(Box<MovieView>),
    Failed {
        id: MovieId,
        message: String,
    },
}

type RecordResult = Result<RecordOutcome, PersistenceError>;

/// Stateless search: catalog lookup plus best-effort trending bookkeeping.
#[derive(Clone)]
pub struct SearchService {
    catalog: Arc<dyn CatalogApi>,
    trending: TrendingStore,
    recorder: Arc<Mutex<JoinSet<RecordResult>>>,
}

impl SearchService {
    pub fn new(catalog: Arc<dyn CatalogApi>, trending: TrendingStore) -> Self {
        Self {
            catalog,
            trending,
            recorder: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn trending(&self) -> &TrendingStore {
        &self.trending
    }

    /// Discover for the empty query, title search otherwise. A nonempty search with
    /// results is counted towards trending in the background.
    pub async fn fetch(&self, query: &SearchQuery) -> Result<Vec<MovieSummary>, CatalogError> {
        let movies = if query.is_empty() {
            self.catalog.discover().await?
        } else {
            self.catalog.search(query).await?
        };
        info!(query = %query, results = movies.len(), "Movies fetched");

        if let (false, Some(top)) = (query.is_empty(), movies.first()) {
            let task = self.trending.record_task(query.clone(), top.clone());
            let mut recorder = self.recorder.lock().await;
            while recorder.try_join_next().is_some() {}
            recorder.spawn(task);
        }
        Ok(movies)
    }

    /// Waits for every trending write started so far.
    pub async fn flush_trending(&self) {
        let mut pending = std::mem::take(&mut *self.recorder.lock().await);
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Trending task did not complete");
            }
        }
    }
}

struct Inner {
    search: SearchService,
    details: DetailAggregator,
    trending_limit: usize,
    generation: AtomicU64,
    detail_generation: AtomicU64,
    search_tx: watch::Sender<SearchState>,
    detail_tx: watch::Sender<DetailState>,
    trending_tx: watch::Sender<Vec<TrendingEntry>>,
}

/// One user's search session. Must be created inside a tokio runtime.
pub struct SearchController {
    inner: Arc<Inner>,
    debouncer: Debouncer<String>,
}

impl SearchController {
    pub fn new(
        search: SearchService,
        details: DetailAggregator,
        debounce: Duration,
        trending_limit: usize,
    ) -> Self {
        let inner = Arc::new(Inner {
            search,
            details,
            trending_limit,
            generation: AtomicU64::new(0),
            detail_generation: AtomicU64::new(0),
            search_tx: watch::Sender::new(SearchState::Idle),
            detail_tx: watch::Sender::new(DetailState::Closed),
            trending_tx: watch::Sender::new(Vec::new()),
        });

        let (debouncer, mut settled) = Debouncer::spawn(debounce);
        let driver = Arc::clone(&inner);
        tokio::spawn(async move {
            while let Some(text) = settled.recv().await {
                driver.submit(SearchQuery::new(text));
            }
            debug!("Search input closed");
        });

        Self { inner, debouncer }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.search_tx.subscribe()
    }

    pub fn subscribe_detail(&self) -> watch::Receiver<DetailState> {
        self.inner.detail_tx.subscribe()
    }

    pub fn subscribe_trending(&self) -> watch::Receiver<Vec<TrendingEntry>> {
        self.inner.trending_tx.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.inner.search_tx.borrow().clone()
    }

    pub fn detail_state(&self) -> DetailState {
        self.inner.detail_tx.borrow().clone()
    }

    pub fn trending_list(&self) -> Vec<TrendingEntry> {
        self.inner.trending_tx.borrow().clone()
    }

    /// Raw keystrokes; only the settled value is searched.
    pub fn on_search_input(&self, text: &str) {
        self.debouncer.emit(text.to_string());
    }

    /// Runs `query` now, bypassing the debouncer.
    pub fn submit(&self, query: SearchQuery) -> JoinHandle<()> {
        self.inner.submit(query)
    }

    /// Initial load: trending list and the default discover list.
    pub async fn start(&self) {
        let search = self.submit(SearchQuery::default());
        self.load_trending().await;
        if let Err(e) = search.await {
            warn!(error = %e, "Initial discover task did not complete");
        }
    }

    pub async fn load_trending(&self) {
        let inner = &self.inner;
        match inner.search.trending().top_n(inner.trending_limit).await {
            Ok(entries) => {
                debug!(entries = entries.len(), "Trending list loaded");
                inner.trending_tx.send_replace(entries);
            }
            Err(e) => warn!(error = %e, "Failed to load trending searches"),
        }
    }

    pub fn on_movie_selected(&self, id: MovieId) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let mut generation = 0;
        inner.detail_tx.send_modify(|state| {
            generation = inner.detail_generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = DetailState::Loading { id };
        });

        tokio::spawn(async move {
            let next = match inner.details.aggregate(id).await {
                Ok(view) => DetailState::Open(Box::new(view)),
                Err(e) => {
                    error!(movie_id = id, error = %e, "Movie detail unavailable");
                    DetailState::Failed {
                        id,
                        message: DETAIL_ERROR_MESSAGE.to_string(),
                    }
                }
            };
            let published = inner.detail_tx.send_if_modified(|state| {
                if inner.detail_generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *state = next;
                true
            });
            if !published {
                debug!(movie_id = id, "Discarding stale movie detail");
            }
        })
    }

    pub fn on_detail_closed(&self) {
        let inner = &self.inner;
        inner.detail_tx.send_modify(|state| {
            inner.detail_generation.fetch_add(1, Ordering::SeqCst);
            *state = DetailState::Closed;
        });
    }

    pub async fn flush_trending(&self) {
        self.inner.search.flush_trending().await;
    }
}

impl Inner {
    fn submit(self: &Arc<Self>, query: SearchQuery) -> JoinHandle<()> {
        let mut generation = 0;
        self.search_tx.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = SearchState::Loading {
                query: query.clone(),
            };
        });

        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.resolve(generation, query).await })
    }

    async fn resolve(&self, generation: u64, query: SearchQuery) {
        let next = match self.search.fetch(&query).await {
            Ok(movies) => SearchState::Success {
                query: query.clone(),
                movies,
            },
            Err(e) => {
                error!(query = %query, error = %e, "Movie search failed");
                SearchState::Error {
                    query: query.clone(),
                    message: SEARCH_ERROR_MESSAGE.to_string(),
                }
            }
        };

        let published = self.search_tx.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next;
            true
        });
        if !published {
            debug!(query = %query, generation, "Discarding stale search response");
        }
    }
}
