//! Fetch a catalog category (or a single movie) and print the flattened summaries.
//! Usage:
//!   cargo run --bin catalog_probe -- popular|inTheatres|topRated|upcoming
//!   cargo run --bin catalog_probe -- id <tmdb_id>
//! Requires TMDB_BEARER_TOKEN in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use marquee::catalog::{CatalogApi, TmdbCatalog};
use marquee::models::Category;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin catalog_probe -- <category>");
        eprintln!("       cargo run --bin catalog_probe -- id <tmdb_id>");
        std::process::exit(1);
    }

    let catalog = TmdbCatalog::from_env()?;

    if args[1] == "id" {
        let id: i64 = args
            .get(2)
            .ok_or_else(|| anyhow::anyhow!("missing tmdb id"))?
            .parse()
            .context("tmdb_id must be an integer")?;
        let movie = catalog.fetch_movie_details(id).await?;
        println!("{}", serde_json::to_string_pretty(&movie)?);
        return Ok(());
    }

    let category = Category::from_slug(&args[1]).ok_or_else(|| {
        anyhow::anyhow!("category must be one of popular, inTheatres, topRated, upcoming")
    })?;
    let movies = catalog.fetch_movies(category).await?;
    eprintln!("{} {} movies", movies.len(), category.title());
    println!("{}", serde_json::to_string_pretty(&movies)?);
    Ok(())
}
