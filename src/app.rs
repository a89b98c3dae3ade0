use crate::catalog::{movies_or_empty, CatalogApi, TmdbCatalog};
use crate::identity::{resolve_session, FirebaseIdentity, IdentityApi, WebAuthConfig};
use crate::models::{Category, MovieSummary, Selection};
use crate::render::{load_carousel, load_sections, CarouselState, Renderer};
use crate::watchlist::{save_movie, FirestoreWatchlist, SaveOutcome, WatchlistStore};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;
const DEFAULT_ADDR: &str = "0.0.0.0:3146";
const DEFAULT_ASSETS_DIR: &str = "assets";

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogApi>,
    pub identity: Arc<dyn IdentityApi>,
    pub watchlist: Arc<dyn WatchlistStore>,
    pub web_auth: Arc<WebAuthConfig>,
    pub renderer: Arc<Renderer>,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        identity: Arc<dyn IdentityApi>,
        watchlist: Arc<dyn WatchlistStore>,
        web_auth: WebAuthConfig,
    ) -> Result<Self> {
        Ok(Self {
            catalog,
            identity,
            watchlist,
            web_auth: Arc::new(web_auth),
            renderer: Arc::new(Renderer::new()?),
        })
    }
}

pub async fn run_server() -> Result<()> {
    let catalog: Arc<dyn CatalogApi> = Arc::new(TmdbCatalog::from_env()?);
    let identity: Arc<dyn IdentityApi> = Arc::new(FirebaseIdentity::from_env()?);
    let watchlist: Arc<dyn WatchlistStore> = Arc::new(FirestoreWatchlist::from_env()?);
    let web_auth = WebAuthConfig::from_env()?;
    info!("Browser sign-in uses auth domain {}", web_auth.auth_domain);
    let state = AppState::new(catalog, identity, watchlist, web_auth)?;

    let assets_dir = env::var("MARQUEE_ASSETS_DIR").unwrap_or_else(|_| DEFAULT_ASSETS_DIR.into());
    info!("Serving assets from {}", assets_dir);
    let app = build_router(state).nest_service("/assets", ServeDir::new(assets_dir));

    let addr = bind_addr()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn bind_addr() -> Result<SocketAddr> {
    let raw = env::var("MARQUEE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    raw.parse()
        .with_context(|| format!("MARQUEE_ADDR is not a socket address: {}", raw))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/categories/:slug", get(category_sections))
        .route("/api/movies/:slug", get(movies_json))
        .route("/api/movies/id/:id", get(movie_json))
        .route("/carousel/toggle", post(toggle_carousel))
        .route("/watchlist", post(add_to_watchlist).get(list_watchlist))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct HomeQuery {
    category: Option<String>,
}

async fn home(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<HomeQuery>,
) -> Result<Html<String>, StatusCode> {
    let selection = Selection::from_slug(query.category.as_deref());
    let (carousel, sections) = tokio::join!(
        load_carousel(state.catalog.as_ref()),
        load_sections(state.catalog.as_ref(), selection),
    );
    state
        .renderer
        .render_home(
            &carousel,
            CarouselState::from_jar(&jar),
            selection,
            &sections,
            &state.web_auth,
        )
        .map(Html)
        .map_err(|e| {
            error!("Failed to render home page: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn category_sections(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Html<String>, StatusCode> {
    let selection = Selection::from_slug(Some(&slug));
    info!("Loading category selection '{}'", selection.slug());
    let sections = load_sections(state.catalog.as_ref(), selection).await;
    state
        .renderer
        .render_sections(&sections)
        .map(Html)
        .map_err(|e| {
            error!("Failed to render category sections: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn movies_json(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<MovieSummary>>, StatusCode> {
    let Some(category) = Category::from_slug(&slug) else {
        warn!("Unknown category '{}'", slug);
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(movies_or_empty(state.catalog.as_ref(), category).await))
}

async fn movie_json(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MovieSummary>, StatusCode> {
    state
        .catalog
        .fetch_movie_details(id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Error fetching details for movie ID {}: {:#}", id, e);
            StatusCode::BAD_GATEWAY
        })
}

async fn toggle_carousel(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let next = CarouselState::from_jar(&jar).toggled();
    debug!(
        "Carousel {}",
        if next.playing { "resumed" } else { "paused" }
    );
    let body = json!({
        "playing": next.playing,
        "icon": next.icon(),
    });
    (jar.add(next.cookie()), Json(body))
}

async fn add_to_watchlist(
    State(state): State<AppState>,
    bearer: BearerHeader,
    Json(movie): Json<MovieSummary>,
) -> StatusCode {
    let token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let session = resolve_session(state.identity.as_ref(), token).await;
    match save_movie(&session, state.watchlist.as_ref(), &movie).await {
        SaveOutcome::Saved(_) => StatusCode::CREATED,
        SaveOutcome::NotSignedIn => StatusCode::NO_CONTENT,
        SaveOutcome::Failed => StatusCode::BAD_GATEWAY,
    }
}

async fn list_watchlist(
    State(state): State<AppState>,
    bearer: BearerHeader,
) -> Result<Json<Vec<MovieSummary>>, StatusCode> {
    let token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let session = resolve_session(state.identity.as_ref(), token).await;
    let Some(user) = session.user.as_ref() else {
        info!("User is not logged in.");
        return Err(StatusCode::UNAUTHORIZED);
    };
    state.watchlist.list(user).await.map(Json).map_err(|e| {
        error!("Failed to list watchlist for {}: {:#}", user.uid, e);
        StatusCode::BAD_GATEWAY
    })
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
