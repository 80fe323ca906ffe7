use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{sort_trending, CreateOutcome, TrendingBackend};
use crate::error::PersistenceError;
use crate::models::{MovieSummary, TrendingEntry};

/// Process-local store. Each operation runs under one lock, so increments never race.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, TrendingEntry>>,
}

#[async_trait]
impl TrendingBackend for MemoryBackend {
    async fn get(&self, term: &str) -> Result<Option<TrendingEntry>, PersistenceError> {
        Ok(self.entries.lock().await.get(term).cloned())
    }

    async fn create(&self, entry: &TrendingEntry) -> Result<CreateOutcome, PersistenceError> {
        let mut guard = self.entries.lock().await;
        if guard.contains_key(&entry.term) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        guard.insert(entry.term.clone(), entry.clone());
        Ok(CreateOutcome::Created)
    }

    async fn increment(
        &self,
        term: &str,
        representative: &MovieSummary,
        at: DateTime<Utc>,
    ) -> Result<Option<TrendingEntry>, PersistenceError> {
        let mut guard = self.entries.lock().await;
        Ok(guard.get_mut(term).map(|entry| {
            entry.count += 1;
            entry.representative_movie = representative.clone();
            entry.last_updated = at;
            entry.clone()
        }))
    }

    async fn top(&self, limit: usize) -> Result<Vec<TrendingEntry>, PersistenceError> {
        let mut entries: Vec<TrendingEntry> =
            self.entries.lock().await.values().cloned().collect();
        sort_trending(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }
}
