use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::models::{MovieSummary, SearchQuery, TrendingEntry};

mod document;
mod memory;

pub use document::DocumentStoreClient;
pub use memory::MemoryBackend;

/// Result of a create attempt against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Another writer created the key first.
    AlreadyExists,
}

/// Document-store operations the trending counters need. `increment` must be a single
/// atomic update on the store side.
#[async_trait]
pub trait TrendingBackend: Send + Sync {
    async fn get(&self, term: &str) -> Result<Option<TrendingEntry>, PersistenceError>;
    async fn create(&self, entry: &TrendingEntry) -> Result<CreateOutcome, PersistenceError>;
    /// Adds one to `count` and replaces the representative movie and timestamp.
    /// `None` when no entry exists for `term`.
    async fn increment(
        &self,
        term: &str,
        representative: &MovieSummary,
        at: DateTime<Utc>,
    ) -> Result<Option<TrendingEntry>, PersistenceError>;
    /// Highest count first, then most recently updated.
    async fn top(&self, limit: usize) -> Result<Vec<TrendingEntry>, PersistenceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Skipped,
    Created,
    Incremented { count: u64 },
}

#[derive(Clone)]
pub struct TrendingStore {
    backend: Arc<dyn TrendingBackend>,
}

impl TrendingStore {
    pub fn new(backend: Arc<dyn TrendingBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()))
    }

    /// Counts one successful search for `query`. Empty queries are not counted.
    pub async fn record_search(
        &self,
        query: &SearchQuery,
        representative: &MovieSummary,
    ) -> Result<RecordOutcome, PersistenceError> {
        if query.is_empty() {
            return Ok(RecordOutcome::Skipped);
        }
        let term = query.normalized();
        let now = Utc::now();

        if self.backend.get(&term).await?.is_none() {
            let entry = TrendingEntry {
                term: term.clone(),
                count: 1,
                representative_movie: representative.clone(),
                last_updated: now,
            };
            match self.backend.create(&entry).await? {
                CreateOutcome::Created => {
                    info!(term = %term, movie_id = representative.id, "Trending entry created");
                    return Ok(RecordOutcome::Created);
                }
                CreateOutcome::AlreadyExists => {
                    debug!(term = %term, "Lost creation race, incrementing instead");
                }
            }
        }

        let updated = self
            .backend
            .increment(&term, representative, now)
            .await?
            .ok_or_else(|| {
                PersistenceError::Malformed(format!("entry for '{term}' vanished during increment"))
            })?;
        debug!(term = %term, count = updated.count, "Trending entry incremented");
        Ok(RecordOutcome::Incremented {
            count: updated.count,
        })
    }

    /// [`record_search`](Self::record_search) as an owned future for a background task.
    /// A failure is logged here, then returned to whoever joins the task.
    pub fn record_task(
        &self,
        query: SearchQuery,
        representative: MovieSummary,
    ) -> impl Future<Output = Result<RecordOutcome, PersistenceError>> + Send + 'static {
        let store = self.clone();
        async move {
            let result = store.record_search(&query, &representative).await;
            if let Err(e) = &result {
                warn!(query = %query, error = %e, "Failed to record trending search");
            }
            result
        }
    }

    pub fn spawn_record(
        &self,
        query: SearchQuery,
        representative: MovieSummary,
    ) -> JoinHandle<Result<RecordOutcome, PersistenceError>> {
        tokio::spawn(self.record_task(query, representative))
    }

    pub async fn top_n(&self, n: usize) -> Result<Vec<TrendingEntry>, PersistenceError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut entries = self.backend.top(n).await?;
        sort_trending(&mut entries);
        entries.truncate(n);
        Ok(entries)
    }
}

pub(crate) fn sort_trending(entries: &mut [TrendingEntry]) {
    entries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.last_updated.cmp(&a.last_updated))
    });
}
