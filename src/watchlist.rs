use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::env;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::identity::{AuthUser, Session};
use crate::models::MovieSummary;

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";
const LIST_PAGE_SIZE: u32 = 100;

#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Append a movie to the user's watchlist and return the new document name.
    async fn add(&self, user: &AuthUser, movie: &MovieSummary) -> Result<String>;
    async fn list(&self, user: &AuthUser) -> Result<Vec<MovieSummary>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(String),
    NotSignedIn,
    Failed,
}

/// Write the movie into the signed-in user's watchlist. Signed-out sessions
/// are a logged no-op; store failures are logged and swallowed.
pub async fn save_movie(
    session: &Session,
    store: &dyn WatchlistStore,
    movie: &MovieSummary,
) -> SaveOutcome {
    let Some(user) = session.user.as_ref() else {
        info!("User is not logged in.");
        return SaveOutcome::NotSignedIn;
    };
    match store.add(user, movie).await {
        Ok(name) => {
            info!(
                "Movie \"{}\" saved to watchlist for user: {}",
                movie.title, user.uid
            );
            debug!(document = %name, movie_id = movie.id, "Watchlist write");
            SaveOutcome::Saved(name)
        }
        Err(e) => {
            error!("Error adding movie to watchlist: {:#}", e);
            SaveOutcome::Failed
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirestoreWatchlist {
    client: Client,
    base_url: String,
    project_id: String,
}

impl FirestoreWatchlist {
    pub fn new(project_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Firestore HTTP client")?;
        Ok(Self {
            client,
            base_url: FIRESTORE_BASE.to_string(),
            project_id: project_id.into(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let project_id = env::var("FIREBASE_PROJECT_ID").context("FIREBASE_PROJECT_ID not set")?;
        Self::new(project_id)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn collection_url(&self, uid: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.base_url,
            self.project_id,
            collection_path(uid)
        )
    }
}

/// Per-user collection, relative to the database's document root.
pub fn collection_path(uid: &str) -> String {
    format!("users/{}/watchlist", urlencoding::encode(uid))
}

#[async_trait]
impl WatchlistStore for FirestoreWatchlist {
    async fn add(&self, user: &AuthUser, movie: &MovieSummary) -> Result<String> {
        #[derive(Deserialize)]
        struct Created {
            name: String,
        }

        let url = self.collection_url(&user.uid);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&user.id_token)
            .json(&encode_document(movie))
            .send()
            .await
            .context("Firestore create request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!(
                "Failed to add '{}' to watchlist. Status: {} {}",
                movie.title,
                status,
                text
            ));
        }
        let created: Created =
            serde_json::from_str(&text).context("Failed to parse Firestore create JSON")?;
        Ok(created.name)
    }

    async fn list(&self, user: &AuthUser) -> Result<Vec<MovieSummary>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ListResponse {
            #[serde(default)]
            documents: Vec<Document>,
            next_page_token: Option<String>,
        }
        #[derive(Deserialize)]
        struct Document {
            name: String,
            #[serde(default)]
            fields: Map<String, Value>,
        }

        let url = self.collection_url(&user.uid);
        let mut movies = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .client
                .get(&url)
                .bearer_auth(&user.id_token)
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let res = req.send().await.context("Firestore list request failed")?;
            let status = res.status();
            let text = res.text().await.context("reading body failed")?;
            if !status.is_success() {
                return Err(anyhow!("Failed to list watchlist. Status: {} {}", status, text));
            }
            let page: ListResponse =
                serde_json::from_str(&text).context("Failed to parse Firestore list JSON")?;
            for doc in page.documents {
                match decode_document(&doc.fields) {
                    Ok(movie) => movies.push(movie),
                    Err(e) => error!("Skipping unreadable watchlist document {}: {:#}", doc.name, e),
                }
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(movies)
    }
}

/// Firestore typed-value encoding of a movie.
pub fn encode_document(movie: &MovieSummary) -> Value {
    json!({
        "fields": {
            "id": { "integerValue": movie.id.to_string() },
            "title": { "stringValue": movie.title },
            "director": { "stringValue": movie.director },
            "cast": { "stringValue": movie.cast },
            "overview": { "stringValue": movie.overview },
            "rating": { "doubleValue": movie.rating },
            "poster": { "stringValue": movie.poster },
            "trailer": { "stringValue": movie.trailer },
            "release_date": { "stringValue": movie.release_date },
        }
    })
}

pub fn decode_document(fields: &Map<String, Value>) -> Result<MovieSummary> {
    let string = |key: &str| -> Result<String> {
        fields
            .get(key)
            .and_then(|v| v.get("stringValue"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("missing string field '{}'", key))
    };

    let id = fields
        .get("id")
        .and_then(|v| v.get("integerValue"))
        .and_then(|v| match v {
            Value::String(s) => s.parse::<i64>().ok(),
            other => other.as_i64(),
        })
        .ok_or_else(|| anyhow!("missing integer field 'id'"))?;

    // Whole-number ratings may have been written as integers by other clients.
    let rating = fields
        .get("rating")
        .and_then(|v| {
            v.get("doubleValue").and_then(|d| d.as_f64()).or_else(|| {
                v.get("integerValue").and_then(|i| match i {
                    Value::String(s) => s.parse::<f64>().ok(),
                    other => other.as_f64(),
                })
            })
        })
        .unwrap_or_default();

    Ok(MovieSummary {
        id,
        title: string("title")?,
        director: string("director")?,
        cast: string("cast")?,
        overview: string("overview")?,
        rating,
        poster: string("poster")?,
        trailer: string("trailer")?,
        release_date: string("release_date")?,
    })
}
