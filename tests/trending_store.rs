mod common;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::movie;
use moviescout::error::PersistenceError;
use moviescout::models::{MovieSummary, SearchQuery, TrendingEntry};
use moviescout::trending::{
    CreateOutcome, DocumentStoreClient, RecordOutcome, TrendingBackend, TrendingStore,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const STORE_KEY: &str = "store-secret";
const COLLECTION: &str = "trending_searches";

#[derive(Clone, Default)]
struct FakeStore {
    docs: Arc<Mutex<HashMap<String, TrendingEntry>>>,
    broken: Arc<AtomicBool>,
    last_top_query: Arc<Mutex<Option<HashMap<String, String>>>>,
}

fn authorized(store: &FakeStore, headers: &HeaderMap) -> Result<(), Response> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {STORE_KEY}"))
        .unwrap_or(false);
    if !bearer {
        return Err(StatusCode::UNAUTHORIZED.into_response());
    }
    if store.broken.load(Ordering::SeqCst) {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "disk full").into_response());
    }
    Ok(())
}

async fn get_doc(
    State(store): State<FakeStore>,
    Path((collection, term)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(r) = authorized(&store, &headers) {
        return r;
    }
    assert_eq!(collection, COLLECTION);
    match store.docs.lock().unwrap().get(&term) {
        Some(entry) => Json(entry.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_doc(
    State(store): State<FakeStore>,
    headers: HeaderMap,
    Json(entry): Json<TrendingEntry>,
) -> Response {
    if let Err(r) = authorized(&store, &headers) {
        return r;
    }
    let mut docs = store.docs.lock().unwrap();
    if docs.contains_key(&entry.term) {
        return StatusCode::CONFLICT.into_response();
    }
    docs.insert(entry.term.clone(), entry.clone());
    (StatusCode::CREATED, Json(entry)).into_response()
}

#[derive(Deserialize)]
struct IncrementBody {
    field: String,
    by: u64,
    set: IncrementSet,
}

#[derive(Deserialize)]
struct IncrementSet {
    representative_movie: MovieSummary,
    last_updated: DateTime<Utc>,
}

async fn increment_doc(
    State(store): State<FakeStore>,
    Path((_collection, term)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<IncrementBody>,
) -> Response {
    if let Err(r) = authorized(&store, &headers) {
        return r;
    }
    assert_eq!(body.field, "count");
    let mut docs = store.docs.lock().unwrap();
    match docs.get_mut(&term) {
        Some(entry) => {
            entry.count += body.by;
            entry.representative_movie = body.set.representative_movie;
            entry.last_updated = body.set.last_updated;
            Json(entry.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_docs(
    State(store): State<FakeStore>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(r) = authorized(&store, &headers) {
        return r;
    }
    let limit: usize = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(usize::MAX);
    *store.last_top_query.lock().unwrap() = Some(params);
    let mut documents: Vec<TrendingEntry> = store.docs.lock().unwrap().values().cloned().collect();
    documents.sort_by(|a, b| b.count.cmp(&a.count));
    documents.truncate(limit);
    Json(json!({ "documents": documents })).into_response()
}

async fn spawn_store(store: FakeStore) -> String {
    let app = Router::new()
        .route(
            "/collections/:collection/documents",
            get(list_docs).post(create_doc),
        )
        .route("/collections/:collection/documents/:term", get(get_doc))
        .route(
            "/collections/:collection/documents/:term/increment",
            post(increment_doc),
        )
        .with_state(store);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base: &str, key: &str) -> DocumentStoreClient {
    DocumentStoreClient::new(base, COLLECTION, key, Duration::from_secs(5)).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_searches_count_every_call() {
    let store = TrendingStore::in_memory();
    let mut tasks = Vec::new();
    for i in 0..25 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .record_search(&SearchQuery::new("dune"), &movie(i, "Dune"))
                .await
        }));
    }
    let mut created = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() == RecordOutcome::Created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    let top = store.top_n(5).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].count, 25);
}

/// Always reports the entry missing on read, then loses the create race.
#[derive(Default)]
struct RacingBackend {
    increments: AtomicUsize,
}

#[async_trait::async_trait]
impl TrendingBackend for RacingBackend {
    async fn get(&self, _term: &str) -> Result<Option<TrendingEntry>, PersistenceError> {
        Ok(None)
    }

    async fn create(&self, _entry: &TrendingEntry) -> Result<CreateOutcome, PersistenceError> {
        Ok(CreateOutcome::AlreadyExists)
    }

    async fn increment(
        &self,
        term: &str,
        representative: &MovieSummary,
        at: DateTime<Utc>,
    ) -> Result<Option<TrendingEntry>, PersistenceError> {
        let count = self.increments.fetch_add(1, Ordering::SeqCst) as u64 + 2;
        Ok(Some(TrendingEntry {
            term: term.to_string(),
            count,
            representative_movie: representative.clone(),
            last_updated: at,
        }))
    }

    async fn top(&self, _limit: usize) -> Result<Vec<TrendingEntry>, PersistenceError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn lost_create_race_falls_back_to_increment() {
    let backend = Arc::new(RacingBackend::default());
    let store = TrendingStore::new(backend.clone());

    let outcome = store
        .record_search(&SearchQuery::new("Alien"), &movie(348, "Alien"))
        .await
        .unwrap();

    assert_eq!(outcome, RecordOutcome::Incremented { count: 2 });
    assert_eq!(backend.increments.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn document_store_round_trip() {
    let fake = FakeStore::default();
    let base = spawn_store(fake.clone()).await;
    let store = TrendingStore::new(Arc::new(client(&base, STORE_KEY)));

    let first = store
        .record_search(&SearchQuery::new("Blade Runner"), &movie(78, "Blade Runner"))
        .await
        .unwrap();
    assert_eq!(first, RecordOutcome::Created);

    let second = store
        .record_search(
            &SearchQuery::new("blade   runner"),
            &movie(335984, "Blade Runner 2049"),
        )
        .await
        .unwrap();
    assert_eq!(second, RecordOutcome::Incremented { count: 2 });

    store
        .record_search(&SearchQuery::new("alien"), &movie(348, "Alien"))
        .await
        .unwrap();

    let top = store.top_n(5).await.unwrap();
    let terms: Vec<_> = top.iter().map(|e| (e.term.as_str(), e.count)).collect();
    assert_eq!(terms, vec![("blade runner", 2), ("alien", 1)]);
    assert_eq!(top[0].representative_movie.id, 335984);

    let query = fake.last_top_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.get("order_desc").map(String::as_str), Some("count,last_updated"));
    assert_eq!(query.get("limit").map(String::as_str), Some("5"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn document_store_concurrent_writers_lose_nothing() {
    let fake = FakeStore::default();
    let base = spawn_store(fake.clone()).await;
    let store = TrendingStore::new(Arc::new(client(&base, STORE_KEY)));

    let mut tasks = Vec::new();
    for i in 0..10 {
        tasks.push(store.spawn_record(SearchQuery::new("Dune"), movie(i, "Dune")));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(fake.docs.lock().unwrap().get("dune").map(|e| e.count), Some(10));
}

#[tokio::test]
async fn document_store_rejects_bad_key() {
    let base = spawn_store(FakeStore::default()).await;
    let backend = client(&base, "wrong-key");

    let err = backend.get("dune").await.unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Rejected { operation: "get", status: 401, .. }
    ));
}

#[tokio::test]
async fn document_store_server_error_is_rejected_write() {
    let fake = FakeStore::default();
    fake.broken.store(true, Ordering::SeqCst);
    let base = spawn_store(fake).await;
    let store = TrendingStore::new(Arc::new(client(&base, STORE_KEY)));

    let err = store
        .record_search(&SearchQuery::new("dune"), &movie(1, "Dune"))
        .await
        .unwrap_err();
    match err {
        PersistenceError::Rejected { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "disk full");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_store_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = TrendingStore::new(Arc::new(client(&format!("http://{addr}"), STORE_KEY)));
    let err = store.top_n(5).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Unavailable(_)));
}

#[tokio::test]
async fn top_n_zero_skips_the_store() {
    let store = TrendingStore::new(Arc::new(client("http://127.0.0.1:9", STORE_KEY)));
    assert!(store.top_n(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_document_is_reported() {
    async fn garbage() -> Json<Value> {
        Json(json!({ "unexpected": true }))
    }
    let app = Router::new().route("/collections/:collection/documents/:term", get(garbage));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let err = client(&format!("http://{addr}"), STORE_KEY)
        .get("dune")
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Malformed(_)));
}
