use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::AppResult,
    ingredients::{
        dto::{CategoryView, IngredientItemView},
        repo,
    },
    state::AppState,
};

pub fn ingredient_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_items))
        .route("/ingredients/categories", get(list_categories))
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<CategoryView>>> {
    let rows = repo::list_categories(&state.db).await?;
    Ok(Json(rows.into_iter().map(CategoryView::from).collect()))
}

#[instrument(skip(state, params))]
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<IngredientItemView>>> {
    let rows = repo::list_items(
        &state.db,
        param(&params, "category"),
        param(&params, "search"),
    )
    .await?;
    Ok(Json(rows.into_iter().map(IngredientItemView::from).collect()))
}
