//! NewsHarbor - a small newsroom CMS
//!
//! Articles made of paragraphs and images, tags, reader comments and an
//! editorial workflow, served as HTML pages and a JSON API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod templates;
pub mod web;

pub use api::{build_router, AppState};
