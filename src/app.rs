use crate::catalog::CatalogApi;
use crate::config::Settings;
use crate::detail::DetailAggregator;
use crate::models::{MovieId, SearchQuery};
use crate::search::{SearchService, DETAIL_ERROR_MESSAGE, SEARCH_ERROR_MESSAGE};
use crate::trending::TrendingStore;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const MAX_TRENDING_LIMIT: usize = 20;
const TRENDING_UNAVAILABLE: &str = "Trending searches are unavailable right now.";

#[derive(Clone)]
pub struct AppState {
    pub search: SearchService,
    pub details: DetailAggregator,
    pub trending_limit: usize,
}

impl AppState {
    pub fn new(catalog: Arc<dyn CatalogApi>, trending: TrendingStore, trending_limit: usize) -> Self {
        Self {
            search: SearchService::new(Arc::clone(&catalog), trending),
            details: DetailAggregator::new(catalog),
            trending_limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MoviesParams {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
pub struct TrendingParams {
    limit: Option<usize>,
}

pub async fn run_server(settings: Settings) -> Result<()> {
    let catalog: Arc<dyn CatalogApi> = Arc::new(settings.catalog_client()?);
    let trending = settings.trending_store()?;
    let state = AppState::new(catalog, trending, settings.trending_limit);
    let search = state.search.clone();

    let app = build_router(state);

    info!("Listening on {}", settings.bind_addr);
    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Waiting for pending trending writes");
    search.flush_trending().await;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/movies", get(search_movies))
        .route("/movies/:id", get(movie_view))
        .route("/trending", get(trending))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn search_movies(
    State(state): State<AppState>,
    Query(params): Query<MoviesParams>,
) -> Response {
    let query = SearchQuery::new(params.query);
    match state.search.fetch(&query).await {
        Ok(movies) => Json(json!({ "query": query, "results": movies })).into_response(),
        Err(e) => {
            error!("Search for '{}' failed: {}", query, e);
            error_body(StatusCode::BAD_GATEWAY, SEARCH_ERROR_MESSAGE)
        }
    }
}

async fn movie_view(State(state): State<AppState>, Path(id): Path<MovieId>) -> Response {
    match state.details.aggregate(id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => {
            error!("Movie {} unavailable: {}", id, e);
            error_body(StatusCode::BAD_GATEWAY, DETAIL_ERROR_MESSAGE)
        }
    }
}

async fn trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Response {
    let limit = params
        .limit
        .unwrap_or(state.trending_limit)
        .min(MAX_TRENDING_LIMIT);
    match state.search.trending().top_n(limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            warn!("Failed to load trending searches: {}", e);
            error_body(StatusCode::SERVICE_UNAVAILABLE, TRENDING_UNAVAILABLE)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
