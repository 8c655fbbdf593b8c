use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::AppResult,
    extract::{JsonBody, PathParam},
    pagination::Page,
    recipes::{
        dto::{CreateRecipeRequest, RecipeDetails, RecipeSummary, UpdateRecipeRequest},
        recommend, services,
    },
    state::AppState,
};

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/mine", get(my_recipes))
        .route("/recipes/recommended", get(recommended_recipes))
        .route(
            "/recipes/:id",
            get(get_recipe)
                .put(update_recipe)
                .patch(update_recipe)
                .delete(delete_recipe),
        )
}

#[instrument(skip(state, params))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Page<RecipeSummary>>> {
    Ok(Json(services::list_public(&state, viewer, &params).await?))
}

#[instrument(skip(state, params))]
pub async fn my_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Page<RecipeSummary>>> {
    Ok(Json(services::list_mine(&state, user_id, &params).await?))
}

#[instrument(skip(state))]
pub async fn recommended_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<RecipeSummary>>> {
    Ok(Json(recommend::recommend(&state, user_id).await?))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<RecipeDetails>> {
    Ok(Json(services::detail(&state, id, viewer).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<CreateRecipeRequest>,
) -> AppResult<(StatusCode, Json<RecipeDetails>)> {
    let recipe = services::create(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateRecipeRequest>,
) -> AppResult<Json<RecipeDetails>> {
    Ok(Json(services::update(&state, user_id, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    services::delete(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
