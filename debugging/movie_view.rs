//! Exercise the catalog against the live TMDB API and print what the UI would get.
//! Usage:
//!   cargo run --bin movie_view -- movie <tmdb_id>
//!   cargo run --bin movie_view -- search <title words...>
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use moviescout::config::Settings;
use moviescout::detail::DetailAggregator;
use moviescout::models::{MovieId, MovieView};
use moviescout::search::{SearchController, SearchService, SearchState};
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: cargo run --bin movie_view -- movie <tmdb_id>");
        eprintln!("       cargo run --bin movie_view -- search <title words...>");
        std::process::exit(1);
    }

    let settings = Settings::from_env()?;
    match args[1].to_lowercase().as_str() {
        "movie" => {
            let id: MovieId = args[2].parse().context("tmdb_id must be an integer")?;
            show_movie(&settings, id).await
        }
        "search" => show_search(&settings, &args[2..].join(" ")).await,
        other => Err(anyhow::anyhow!("unknown mode '{}', expected 'movie' or 'search'", other)),
    }
}

async fn show_movie(settings: &Settings, id: MovieId) -> Result<()> {
    let details = DetailAggregator::new(Arc::new(settings.catalog_client()?));
    let view = details.aggregate(id).await?;
    print_view(&view);
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn print_view(view: &MovieView) {
    let detail = &view.detail;
    println!("Title: {}", detail.summary.title);
    println!("Year: {}", detail.summary.year().unwrap_or_else(|| "-".to_string()));
    println!("Rating: {}", detail.summary.rating_label());
    println!("Runtime: {}", detail.runtime_label());
    println!("Budget: {}", detail.budget_label());
    println!("Revenue: {}", detail.revenue_label());
    println!(
        "Cast: {}",
        view.cast.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    match &view.trailer {
        Some(trailer) => println!(
            "Trailer: {} ({})",
            trailer.name,
            trailer.embed_url().unwrap_or_else(|| trailer.site.clone())
        ),
        None => println!("Trailer: -"),
    }
}

/// Types the query one character at a time, the way a user would, and prints the
/// single search that survives debouncing.
async fn show_search(settings: &Settings, text: &str) -> Result<()> {
    let catalog = Arc::new(settings.catalog_client()?);
    let service = SearchService::new(catalog.clone(), settings.trending_store()?);
    let controller = SearchController::new(
        service,
        DetailAggregator::new(catalog),
        settings.search_debounce,
        settings.trending_limit,
    );

    let mut typed = String::new();
    for ch in text.chars() {
        typed.push(ch);
        controller.on_search_input(&typed);
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    let mut states = controller.subscribe();
    let settled = tokio::time::timeout(
        settings.search_debounce + settings.request_timeout,
        states.wait_for(|s| {
            matches!(s, SearchState::Success { query, .. } | SearchState::Error { query, .. }
                if query.as_str() == text.trim())
        }),
    )
    .await
    .context("search did not settle in time")?
    .context("search controller stopped")?
    .clone();

    if let Some(message) = settled.error_message() {
        println!("Error: {}", message);
        return Ok(());
    }
    for movie in settled.results() {
        println!(
            "{:>8}  {} ({})  {}",
            movie.id,
            movie.title,
            movie.year().unwrap_or_else(|| "-".to_string()),
            movie.rating_label()
        );
    }

    controller.flush_trending().await;
    controller.load_trending().await;
    println!("Trending:");
    for entry in controller.trending_list() {
        println!("  {} x{} -> {}", entry.term, entry.count, entry.representative_movie.title);
    }
    Ok(())
}
