use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::recipes::{repo as recipe_repo, services::owned_record};
use crate::state::AppState;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn object_key(recipe_id: Uuid, ext: &str) -> String {
    format!("recipes/{}/{}.{}", recipe_id, Uuid::new_v4(), ext)
}

/// Presigned GET url for a stored image, if the recipe has one.
pub async fn image_url(st: &AppState, key: Option<&str>) -> anyhow::Result<Option<String>> {
    let Some(key) = key else {
        return Ok(None);
    };
    let url = st
        .storage
        .presign_get(key, st.config.storage.url_ttl_secs)
        .await
        .with_context(|| format!("presign url for key {key}"))?;
    Ok(Some(url))
}

/// Removes an object; failures are logged and swallowed.
pub async fn delete_best_effort(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %format!("{e:#}"), key, "failed to delete stored image");
    }
}

/// Stores the image and points the recipe at it, replacing any previous one.
pub async fn upload_recipe_image(
    st: &AppState,
    user_id: Uuid,
    recipe_id: Uuid,
    item: UploadItem,
) -> AppResult<Option<String>> {
    let record = owned_record(st, recipe_id, user_id).await?;

    let ext = ext_from_mime(&item.content_type)
        .ok_or_else(|| AppError::validation("Unsupported image type"))?;
    if item.body.is_empty() {
        return Err(AppError::validation("Image is empty"));
    }
    if item.body.len() > MAX_IMAGE_BYTES {
        return Err(AppError::validation("Image must be at most 10 MiB"));
    }

    let key = object_key(recipe_id, ext);
    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    if let Err(e) = recipe_repo::set_image_key(&st.db, recipe_id, Some(&key)).await {
        delete_best_effort(st, &key).await;
        return Err(e.into());
    }
    if let Some(old) = record.image_key.as_deref() {
        delete_best_effort(st, old).await;
    }
    info!(%recipe_id, key = %key, "recipe image stored");

    Ok(image_url(st, Some(&key)).await?)
}

pub async fn clear_recipe_image(st: &AppState, user_id: Uuid, recipe_id: Uuid) -> AppResult<()> {
    let record = owned_record(st, recipe_id, user_id).await?;
    let Some(old) = record.image_key else {
        return Err(AppError::not_found("Recipe has no image"));
    };
    recipe_repo::set_image_key(&st.db, recipe_id, None).await?;
    delete_best_effort(st, &old).await;
    info!(%recipe_id, "recipe image removed");
    Ok(())
}
