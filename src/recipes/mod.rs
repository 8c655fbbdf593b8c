pub mod dto;
pub mod filter;
mod handlers;
pub mod model;
pub mod recommend;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::recipe_routes()
}
