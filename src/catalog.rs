use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{header, Client};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::models::{
    Category, MovieSummary, NO_POSTER, NO_TRAILER_KEY, UNKNOWN_DIRECTOR, UNKNOWN_RELEASE_DATE,
};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const TRAILER_BASE: &str = "https://www.youtube.com/watch?v=";

/// Stubs kept from a listing before the per-movie detail fan-out.
pub const LISTING_LIMIT: usize = 15;
const CAST_LIMIT: usize = 5;

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_movies(&self, category: Category) -> Result<Vec<MovieSummary>>;
    async fn fetch_movie_details(&self, id: i64) -> Result<MovieSummary>;
}

#[derive(Debug, Clone)]
pub struct TmdbCatalog {
    client: Client,
    base_url: String,
    token: String,
}

impl TmdbCatalog {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let user_agent = format!("marquee/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            base_url: TMDB_BASE.to_string(),
            token: token.into(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let token = env::var("TMDB_BEARER_TOKEN").context("TMDB_BEARER_TOKEN not set")?;
        Self::new(token)
    }

    /// Point the client at another API root, e.g. a local stand-in.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let res = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {} {}", path, status, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl CatalogApi for TmdbCatalog {
    async fn fetch_movies(&self, category: Category) -> Result<Vec<MovieSummary>> {
        let listing: Listing = self
            .get_json(category.listing_path())
            .await
            .with_context(|| format!("Failed to fetch {} movies", category.title()))?;

        let ids: Vec<i64> = listing
            .results
            .iter()
            .take(LISTING_LIMIT)
            .map(|stub| stub.id)
            .collect();
        debug!(
            "Fetching details for {} {} movies",
            ids.len(),
            category.title()
        );

        let details = join_all(ids.iter().map(|id| self.fetch_movie_details(*id))).await;
        let movies = ids
            .into_iter()
            .zip(details)
            .filter_map(|(id, res)| match res {
                Ok(movie) => Some(movie),
                Err(e) => {
                    warn!("Error fetching details for movie ID {}: {:#}", id, e);
                    None
                }
            })
            .collect();
        Ok(movies)
    }

    async fn fetch_movie_details(&self, id: i64) -> Result<MovieSummary> {
        let path = format!("movie/{id}?append_to_response=credits,videos");
        let detail: MovieDetail = self
            .get_json(&path)
            .await
            .with_context(|| format!("Failed to fetch movie details for {}", id))?;
        Ok(summarize(id, detail))
    }
}

/// Fetch a category, logging any failure and handing back an empty list.
pub async fn movies_or_empty(api: &dyn CatalogApi, category: Category) -> Vec<MovieSummary> {
    match api.fetch_movies(category).await {
        Ok(movies) => movies,
        Err(e) => {
            error!("Error fetching {} movies: {:#}", category.title(), e);
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    results: Vec<ListingStub>,
}

#[derive(Debug, Deserialize)]
struct ListingStub {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    title: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    credits: Credits,
    #[serde(default)]
    videos: Videos,
}

#[derive(Debug, Default, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    job: Option<String>,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Videos {
    #[serde(default)]
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(rename = "type")]
    video_type: String,
    key: String,
}

fn summarize(id: i64, detail: MovieDetail) -> MovieSummary {
    let director = detail
        .credits
        .crew
        .iter()
        .find(|c| c.job.as_deref() == Some("Director"))
        .map(|c| c.name.clone())
        .unwrap_or_else(|| UNKNOWN_DIRECTOR.to_string());
    let cast = detail
        .credits
        .cast
        .iter()
        .take(CAST_LIMIT)
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let trailer_key = detail
        .videos
        .results
        .iter()
        .find(|v| v.video_type == "Trailer")
        .map(|v| v.key.as_str())
        .unwrap_or(NO_TRAILER_KEY);
    let poster = detail
        .poster_path
        .filter(|p| !p.is_empty())
        .map(|p| format!("{POSTER_BASE}{p}"))
        .unwrap_or_else(|| NO_POSTER.to_string());
    let release_date = detail
        .release_date
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| UNKNOWN_RELEASE_DATE.to_string());

    MovieSummary {
        id,
        title: detail.title,
        director,
        cast,
        overview: detail.overview.unwrap_or_default(),
        rating: detail.vote_average.unwrap_or_default(),
        poster,
        trailer: format!("{TRAILER_BASE}{trailer_key}"),
        release_date,
    }
}
