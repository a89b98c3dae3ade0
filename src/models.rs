use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_DIRECTOR: &str = "Unknown";
pub const UNKNOWN_RELEASE_DATE: &str = "Unknown";
pub const NO_POSTER: &str = "No Poster Available";
pub const NO_TRAILER_KEY: &str = "No Trailer";

/// Flattened per-movie record built from a listing stub plus its detail
/// response. Field names match the stored watchlist document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MovieSummary {
    pub id: i64,
    pub title: String,
    pub director: String,
    pub cast: String,
    pub overview: String,
    pub rating: f64,
    pub poster: String,
    pub trailer: String,
    pub release_date: String,
}

impl MovieSummary {
    /// Year of the release date, or `N/A` when it is missing or unparseable.
    pub fn release_year(&self) -> String {
        NaiveDate::parse_from_str(&self.release_date, "%Y-%m-%d")
            .map(|d| d.year().to_string())
            .unwrap_or_else(|_| "N/A".to_string())
    }

    /// Rating rounded to one decimal; whole numbers print without a fraction.
    pub fn display_rating(&self) -> String {
        let rounded = (self.rating * 10.0).round() / 10.0;
        format!("{}", rounded)
    }

    pub fn has_poster(&self) -> bool {
        self.poster != NO_POSTER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Popular,
    NowPlaying,
    TopRated,
    Upcoming,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Popular,
        Category::NowPlaying,
        Category::TopRated,
        Category::Upcoming,
    ];

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "popular" => Some(Category::Popular),
            "inTheatres" => Some(Category::NowPlaying),
            "topRated" => Some(Category::TopRated),
            "upcoming" => Some(Category::Upcoming),
            _ => None,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Category::Popular => "popular",
            Category::NowPlaying => "inTheatres",
            Category::TopRated => "topRated",
            Category::Upcoming => "upcoming",
        }
    }

    /// Heading shown above the category's card row.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Popular => "Popular",
            Category::NowPlaying => "Premiere",
            Category::TopRated => "Top Rated",
            Category::Upcoming => "Upcoming",
        }
    }

    /// Listing path relative to the catalog API base.
    pub fn listing_path(&self) -> &'static str {
        match self {
            Category::Popular => "movie/popular?language=en-US",
            Category::NowPlaying => "movie/now_playing?language=en-US",
            Category::TopRated => "movie/top_rated?language=en-US&page=1",
            Category::Upcoming => "movie/upcoming?language=en-US&page=1",
        }
    }
}

/// What the visitor picked in the category bar. Anything unrecognised means
/// every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    One(Category),
    All,
}

impl Selection {
    pub fn from_slug(slug: Option<&str>) -> Self {
        slug.and_then(Category::from_slug)
            .map(Selection::One)
            .unwrap_or(Selection::All)
    }

    pub fn categories(&self) -> Vec<Category> {
        match self {
            Selection::One(c) => vec![*c],
            Selection::All => Category::ALL.to_vec(),
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Selection::One(c) => c.slug(),
            Selection::All => "all",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(release_date: &str, rating: f64) -> MovieSummary {
        MovieSummary {
            id: 1,
            title: "Heat".to_string(),
            director: "Michael Mann".to_string(),
            cast: "Al Pacino, Robert De Niro".to_string(),
            overview: String::new(),
            rating,
            poster: NO_POSTER.to_string(),
            trailer: String::new(),
            release_date: release_date.to_string(),
        }
    }

    #[test]
    fn release_year_falls_back_to_na() {
        assert_eq!(movie("1995-12-15", 7.9).release_year(), "1995");
        assert_eq!(movie(UNKNOWN_RELEASE_DATE, 7.9).release_year(), "N/A");
        assert_eq!(movie("", 7.9).release_year(), "N/A");
    }

    #[test]
    fn display_rating_rounds_to_one_decimal() {
        assert_eq!(movie("", 7.25).display_rating(), "7.3");
        assert_eq!(movie("", 7.0).display_rating(), "7");
        assert_eq!(movie("", 8.449).display_rating(), "8.4");
    }

    #[test]
    fn unknown_slug_selects_everything() {
        assert_eq!(Selection::from_slug(Some("topRated")), Selection::One(Category::TopRated));
        assert_eq!(Selection::from_slug(Some("all")), Selection::All);
        assert_eq!(Selection::from_slug(None), Selection::All);
        assert_eq!(Selection::All.categories().len(), 4);
    }
}
