use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
mod handlers;
pub mod jwt;
mod password;
pub mod repo;
pub mod repo_types;

pub use dto::UserSummary;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
