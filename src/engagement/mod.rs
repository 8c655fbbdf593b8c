//! Ratings, bookmarks and comments on recipes.

pub mod dto;
mod handlers;
pub mod rating;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::engagement_routes()
}
