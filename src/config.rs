use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::{TmdbClient, TMDB_BASE};
use crate::trending::{DocumentStoreClient, TrendingStore};

pub const DEFAULT_COLLECTION: &str = "trending_searches";

/// Remote trending store coordinates. Absent means the in-process store is used.
#[derive(Debug, Clone)]
pub struct TrendingStoreSettings {
    pub url: String,
    pub api_key: String,
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub request_timeout: Duration,
    pub search_debounce: Duration,
    pub trending_limit: usize,
    pub trending_store: Option<TrendingStoreSettings>,
    pub bind_addr: SocketAddr,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let tmdb_api_key = required("TMDB_API_KEY")?;
        let tmdb_base_url = optional("TMDB_BASE_URL").unwrap_or_else(|| TMDB_BASE.to_string());
        let request_timeout = Duration::from_secs(parsed("TMDB_TIMEOUT_SECS", 30)?);
        let search_debounce = Duration::from_millis(parsed("SEARCH_DEBOUNCE_MS", 500)?);
        let trending_limit = parsed("TRENDING_LIMIT", 5)?;
        let bind_addr = parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3146)))?;

        let trending_store = match optional("TRENDING_STORE_URL") {
            Some(url) => Some(TrendingStoreSettings {
                url,
                api_key: required("TRENDING_STORE_KEY")
                    .context("TRENDING_STORE_URL is set but its key is not")?,
                collection: optional("TRENDING_COLLECTION")
                    .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            }),
            None => None,
        };

        Ok(Self {
            tmdb_api_key,
            tmdb_base_url,
            request_timeout,
            search_debounce,
            trending_limit,
            trending_store,
            bind_addr,
        })
    }

    pub fn catalog_client(&self) -> Result<TmdbClient> {
        TmdbClient::new(&self.tmdb_base_url, &self.tmdb_api_key, self.request_timeout)
            .context("Failed to build TMDB client")
    }

    pub fn trending_store(&self) -> Result<TrendingStore> {
        match &self.trending_store {
            Some(remote) => {
                let client = DocumentStoreClient::new(
                    &remote.url,
                    &remote.collection,
                    &remote.api_key,
                    self.request_timeout,
                )
                .context("Failed to build trending store client")?;
                info!(url = %remote.url, collection = %remote.collection, "Using remote trending store");
                Ok(TrendingStore::new(Arc::new(client)))
            }
            None => {
                warn!("TRENDING_STORE_URL not set, trending counts are kept in memory only");
                Ok(TrendingStore::in_memory())
            }
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| anyhow::anyhow!("Missing required environment variable: {}", key))
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
