use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    extract::PathParam,
    images::services::{clear_recipe_image, upload_recipe_image, UploadItem, MAX_IMAGE_BYTES},
    state::AppState,
};

pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/recipes/:id/image",
            post(upload_image).delete(delete_image),
        )
        // headroom for multipart framing around the file itself
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: Uuid,
    pub image_url: Option<String>,
}

/// POST /recipes/{id}/image (multipart), field `image`.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
    mut mp: Multipart,
) -> AppResult<Json<RecipeImageResponse>> {
    let mut upload = None;
    while let Some(field) = mp.next_field().await.map_err(|e| {
        warn!(error = %e, "malformed multipart body");
        AppError::validation("Malformed multipart body")
    })? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|_| AppError::validation("Image must be at most 10 MiB"))?;
        upload = Some(UploadItem { body, content_type });
        break;
    }
    let upload = upload.ok_or_else(|| AppError::validation("Field `image` is required"))?;

    let image_url = upload_recipe_image(&state, user_id, id, upload).await?;
    Ok(Json(RecipeImageResponse { id, image_url }))
}

#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    clear_recipe_image(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
