use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CreateOutcome, TrendingBackend};
use crate::error::PersistenceError;
use crate::models::{MovieSummary, TrendingEntry};

/// REST client for the remote document store holding trending entries.
///
/// Documents live under `{base}/collections/{collection}/documents/{term}`; the store
/// applies increments server-side so concurrent writers cannot lose updates.
#[derive(Debug, Clone)]
pub struct DocumentStoreClient {
    client: Client,
    base_url: String,
    collection: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    documents: Vec<TrendingEntry>,
}

#[derive(Debug, Serialize)]
struct IncrementRequest {
    field: &'static str,
    by: u64,
    set: serde_json::Value,
}

impl DocumentStoreClient {
    pub fn new(
        base_url: &str,
        collection: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/collections/{}/documents",
            self.base_url,
            urlencoding::encode(&self.collection)
        )
    }

    fn document_url(&self, term: &str) -> String {
        format!("{}/{}", self.documents_url(), urlencoding::encode(term))
    }

    async fn execute(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String), PersistenceError> {
        let res = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                warn!(operation, error = %e, "Trending store request failed");
                PersistenceError::from(e)
            })?;
        let status = res.status();
        let body = res.text().await?;
        debug!(operation, status = status.as_u16(), "Trending store response");
        Ok((status, body))
    }

    fn rejected(operation: &'static str, status: StatusCode, body: String) -> PersistenceError {
        warn!(operation, status = status.as_u16(), "Trending store rejected request");
        PersistenceError::Rejected {
            operation,
            status: status.as_u16(),
            body,
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, PersistenceError> {
    serde_json::from_str(body).map_err(|e| PersistenceError::Malformed(e.to_string()))
}

#[async_trait]
impl TrendingBackend for DocumentStoreClient {
    async fn get(&self, term: &str) -> Result<Option<TrendingEntry>, PersistenceError> {
        let request = self.client.get(self.document_url(term));
        match self.execute("get", request).await? {
            (StatusCode::NOT_FOUND, _) => Ok(None),
            (status, body) if status.is_success() => parse(&body).map(Some),
            (status, body) => Err(Self::rejected("get", status, body)),
        }
    }

    async fn create(&self, entry: &TrendingEntry) -> Result<CreateOutcome, PersistenceError> {
        let request = self.client.post(self.documents_url()).json(entry);
        match self.execute("create", request).await? {
            (StatusCode::CONFLICT, _) => Ok(CreateOutcome::AlreadyExists),
            (status, _) if status.is_success() => Ok(CreateOutcome::Created),
            (status, body) => Err(Self::rejected("create", status, body)),
        }
    }

    async fn increment(
        &self,
        term: &str,
        representative: &MovieSummary,
        at: DateTime<Utc>,
    ) -> Result<Option<TrendingEntry>, PersistenceError> {
        let payload = IncrementRequest {
            field: "count",
            by: 1,
            set: json!({
                "representative_movie": representative,
                "last_updated": at,
            }),
        };
        let url = format!("{}/increment", self.document_url(term));
        let request = self.client.post(url).json(&payload);
        match self.execute("increment", request).await? {
            (StatusCode::NOT_FOUND, _) => Ok(None),
            (status, body) if status.is_success() => parse(&body).map(Some),
            (status, body) => Err(Self::rejected("increment", status, body)),
        }
    }

    async fn top(&self, limit: usize) -> Result<Vec<TrendingEntry>, PersistenceError> {
        let request = self.client.get(self.documents_url()).query(&[
            ("order_desc", "count,last_updated".to_string()),
            ("limit", limit.to_string()),
        ]);
        match self.execute("top", request).await? {
            (status, body) if status.is_success() => {
                parse::<DocumentList>(&body).map(|list| list.documents)
            }
            (status, body) => Err(Self::rejected("top", status, body)),
        }
    }
}
