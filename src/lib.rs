pub mod app;
pub mod catalog;
pub mod identity;
pub mod models;
pub mod render;
pub mod watchlist;
