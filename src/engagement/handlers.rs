use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    engagement::{
        dto::{CommentRequest, CommentView, MessageResponse, RateRequest, SavedRecipeView},
        services::{self, RateOutcome},
    },
    error::AppResult,
    extract::{JsonBody, PathParam},
    pagination::{Page, PageRequest},
    state::AppState,
};

pub fn engagement_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/:id/rate", post(rate_recipe).delete(delete_rating))
        .route("/recipes/:id/save", post(save_recipe))
        .route("/recipes/:id/unsave", delete(unsave_recipe))
        .route("/recipes/:id/comments", get(list_comments).post(add_comment))
        .route("/comments/:id", delete(delete_comment))
        .route("/saved-recipes", get(saved_recipes))
}

#[instrument(skip(state, payload))]
pub async fn rate_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<RateRequest>,
) -> AppResult<Response> {
    let res = match services::rate(&state, user_id, id, &payload.rating).await? {
        RateOutcome::Created(view) => (StatusCode::CREATED, Json(view)).into_response(),
        RateOutcome::Updated(view) => (StatusCode::OK, Json(view)).into_response(),
    };
    Ok(res)
}

#[instrument(skip(state))]
pub async fn delete_rating(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    services::unrate(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn save_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Response> {
    let res = match services::save(&state, user_id, id).await? {
        Some(saved) => (StatusCode::CREATED, Json(saved)).into_response(),
        None => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Recipe already saved",
            }),
        )
            .into_response(),
    };
    Ok(res)
}

#[instrument(skip(state))]
pub async fn unsave_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    services::unsave(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, params))]
pub async fn saved_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Page<SavedRecipeView>>> {
    let page = PageRequest::from_params(&params, &state.config.pagination);
    Ok(Json(services::list_saved(&state, user_id, page).await?))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<Vec<CommentView>>> {
    Ok(Json(services::list_comments(&state, viewer, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<CommentRequest>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let comment = services::add_comment(&state, user_id, id, payload.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_comment(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
