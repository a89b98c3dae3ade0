//! Home page rendering: the now-playing carousel and the category card rows.
use anyhow::{Context, Result};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use futures::future::join_all;
use minijinja::{context, Environment};
use serde::Serialize;

use crate::catalog::{movies_or_empty, CatalogApi};
use crate::identity::WebAuthConfig;
use crate::models::{Category, MovieSummary, Selection};

pub const CAROUSEL_SIZE: usize = 3;
pub const GRID_SIZE: usize = 4;

pub const PLAY_ICON: &str = "/assets/PlayButton.svg";
pub const PAUSE_ICON: &str = "/assets/PauseButton.svg";

pub const CAROUSEL_COOKIE: &str = "carousel";

/// Whether a visitor's carousel is cycling. Carried in that visitor's
/// `carousel` cookie; a missing or unreadable cookie means playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarouselState {
    pub playing: bool,
}

impl Default for CarouselState {
    fn default() -> Self {
        Self { playing: true }
    }
}

impl CarouselState {
    pub fn from_jar(jar: &CookieJar) -> Self {
        let playing = jar
            .get(CAROUSEL_COOKIE)
            .map(|c| c.value() != "paused")
            .unwrap_or(true);
        Self { playing }
    }

    pub fn toggled(self) -> Self {
        Self {
            playing: !self.playing,
        }
    }

    pub fn cookie(&self) -> Cookie<'static> {
        let value = if self.playing { "playing" } else { "paused" };
        Cookie::build((CAROUSEL_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Icon offered to the visitor: play while paused, pause while playing.
    pub fn icon(&self) -> &'static str {
        if self.playing {
            PAUSE_ICON
        } else {
            PLAY_ICON
        }
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    pub category: Category,
    pub movies: Vec<MovieSummary>,
}

#[derive(Serialize)]
struct MovieView<'a> {
    movie: &'a MovieSummary,
    year: String,
    rating: String,
    has_poster: bool,
}

impl<'a> MovieView<'a> {
    fn new(movie: &'a MovieSummary) -> Self {
        Self {
            movie,
            year: movie.release_year(),
            rating: movie.display_rating(),
            has_poster: movie.has_poster(),
        }
    }
}

#[derive(Serialize)]
struct SectionView<'a> {
    title: &'static str,
    slug: &'static str,
    cards: Vec<MovieView<'a>>,
}

#[derive(Serialize)]
struct Choice {
    slug: &'static str,
    title: &'static str,
}

pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("home.html", include_str!("../templates/home.html"))
            .context("home template failed to parse")?;
        env.add_template("sections.html", include_str!("../templates/sections.html"))
            .context("sections template failed to parse")?;
        Ok(Self { env })
    }

    pub fn render_home(
        &self,
        carousel: &[MovieSummary],
        carousel_state: CarouselState,
        selection: Selection,
        sections: &[Section],
        auth: &WebAuthConfig,
    ) -> Result<String> {
        let carousel: Vec<MovieView> = carousel
            .iter()
            .take(CAROUSEL_SIZE)
            .map(MovieView::new)
            .collect();
        let mut choices: Vec<Choice> = Category::ALL
            .iter()
            .map(|c| Choice {
                slug: c.slug(),
                title: c.title(),
            })
            .collect();
        choices.push(Choice {
            slug: "all",
            title: "All",
        });

        let tmpl = self.env.get_template("home.html")?;
        tmpl.render(context! {
            carousel => carousel,
            playing => carousel_state.playing,
            toggle_icon => carousel_state.icon(),
            firebase => auth,
            choices => choices,
            selected => selection.slug(),
            sections => section_views(sections),
        })
        .context("failed to render home page")
    }

    pub fn render_sections(&self, sections: &[Section]) -> Result<String> {
        let tmpl = self.env.get_template("sections.html")?;
        tmpl.render(context! { sections => section_views(sections) })
            .context("failed to render category sections")
    }
}

fn section_views(sections: &[Section]) -> Vec<SectionView<'_>> {
    sections
        .iter()
        .map(|s| SectionView {
            title: s.category.title(),
            slug: s.category.slug(),
            cards: s.movies.iter().take(GRID_SIZE).map(MovieView::new).collect(),
        })
        .collect()
}

/// Now-playing movies for the carousel.
pub async fn load_carousel(api: &dyn CatalogApi) -> Vec<MovieSummary> {
    let mut movies = movies_or_empty(api, Category::NowPlaying).await;
    movies.truncate(CAROUSEL_SIZE);
    movies
}

/// Fetch every selected category concurrently, keeping selection order.
pub async fn load_sections(api: &dyn CatalogApi, selection: Selection) -> Vec<Section> {
    let categories = selection.categories();
    let listings = join_all(categories.iter().map(|c| movies_or_empty(api, *c))).await;
    categories
        .into_iter()
        .zip(listings)
        .map(|(category, mut movies)| {
            movies.truncate(GRID_SIZE);
            Section { category, movies }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i64, title: &str) -> MovieSummary {
        MovieSummary {
            id,
            title: title.to_string(),
            director: "Unknown".to_string(),
            cast: String::new(),
            overview: format!("{title} overview"),
            rating: 6.56,
            poster: format!("https://image.tmdb.org/t/p/w500/{id}.jpg"),
            trailer: "https://www.youtube.com/watch?v=abc".to_string(),
            release_date: "2023-07-21".to_string(),
        }
    }

    fn auth() -> WebAuthConfig {
        WebAuthConfig {
            api_key: "public-web-key".to_string(),
            auth_domain: "marquee-demo.firebaseapp.com".to_string(),
            project_id: "marquee-demo".to_string(),
        }
    }

    #[test]
    fn toggle_alternates_icon_and_cookie() {
        let state = CarouselState::default();
        assert!(state.playing);
        let paused = state.toggled();
        assert_eq!(paused.icon(), PLAY_ICON);
        assert_eq!(paused.cookie().value(), "paused");
        let resumed = paused.toggled();
        assert_eq!(resumed.icon(), PAUSE_ICON);
        assert_eq!(resumed.cookie().value(), "playing");
    }

    #[test]
    fn carousel_state_reads_visitor_cookie() {
        assert!(CarouselState::from_jar(&CookieJar::new()).playing);
        let jar = CookieJar::new().add(Cookie::new(CAROUSEL_COOKIE, "paused"));
        assert!(!CarouselState::from_jar(&jar).playing);
        let jar = CookieJar::new().add(Cookie::new(CAROUSEL_COOKIE, "garbage"));
        assert!(CarouselState::from_jar(&jar).playing);
    }

    #[test]
    fn home_wires_firebase_sign_in() {
        let renderer = Renderer::new().unwrap();
        let html = renderer
            .render_home(&[], CarouselState::default(), Selection::All, &[], &auth())
            .unwrap();

        assert!(html.contains("firebase-auth.js"));
        assert!(html.contains("\"apiKey\":\"public-web-key\""));
        assert!(html.contains("\"authDomain\":\"marquee-demo.firebaseapp.com\""));
        assert!(html.contains("\"projectId\":\"marquee-demo\""));
        assert!(html.contains("onAuthStateChanged(auth"));
        assert!(html.contains("window.marqueeIdToken = await user.getIdToken()"));
        assert!(html.contains("window.marqueeIdToken = null"));
        assert!(html.contains("id=\"signInButton\""));
    }

    #[test]
    fn carousel_marks_first_slide_active() {
        let renderer = Renderer::new().unwrap();
        let movies: Vec<_> = (1..=5).map(|i| movie(i, &format!("Film {i}"))).collect();
        let html = renderer
            .render_home(&movies, CarouselState::default(), Selection::All, &[], &auth())
            .unwrap();

        assert_eq!(html.matches("class=\"carousel-item").count(), CAROUSEL_SIZE);
        assert_eq!(html.matches("class=\"carousel-item active\"").count(), 1);
        assert_eq!(html.matches("data-bs-slide-to=").count(), CAROUSEL_SIZE);
        assert_eq!(html.matches("aria-current=\"true\"").count(), 1);
        assert!(html.contains("aria-label=\"Slide 3\""));
        assert!(!html.contains("Film 4"));
        assert!(html.contains(PAUSE_ICON));
        assert!(html.contains("<div class=\"movie-duration\">2023</div>"));
    }

    #[test]
    fn cards_are_capped_and_escaped() {
        let renderer = Renderer::new().unwrap();
        let mut movies: Vec<_> = (1..=6).map(|i| movie(i, &format!("Film {i}"))).collect();
        movies[0].title = "<script>alert(1)</script>".to_string();
        let sections = vec![Section {
            category: Category::TopRated,
            movies,
        }];
        let html = renderer.render_sections(&sections).unwrap();

        assert_eq!(html.matches("class=\"col-md-3\"").count(), GRID_SIZE);
        assert!(html.contains("<h3 class=\"category-title\">Top Rated</h3>"));
        assert!(html.contains("Rating: 6.6"));
        assert!(!html.contains("<script>alert(1)</script>"));
    }

    #[test]
    fn missing_poster_skips_image() {
        let renderer = Renderer::new().unwrap();
        let mut m = movie(1, "No Art");
        m.poster = crate::models::NO_POSTER.to_string();
        let html = renderer
            .render_sections(&[Section {
                category: Category::Popular,
                movies: vec![m],
            }])
            .unwrap();
        assert!(!html.contains("card-img-top"));
    }
}
