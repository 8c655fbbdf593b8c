use tracing::{info, warn};
use uuid::Uuid;

use crate::engagement::{
    dto::{CommentView, RatingView, SavedRecipeView},
    rating::RatingValue,
    repo,
};
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageRequest};
use crate::recipes::services::{require_visible, summaries_by_id};
use crate::state::AppState;

/// Outcome of a rate call; both carry the stored rating.
#[derive(Debug)]
pub enum RateOutcome {
    Created(RatingView),
    Updated(RatingView),
}

pub async fn rate(
    st: &AppState,
    user_id: Uuid,
    recipe_id: Uuid,
    raw: &serde_json::Value,
) -> AppResult<RateOutcome> {
    let value = RatingValue::parse(raw).map_err(|e| {
        warn!(%recipe_id, reason = %e, "rating rejected");
        AppError::from(e)
    })?;
    require_visible(st, recipe_id, Some(user_id)).await?;

    let up = repo::upsert_rating(&st.db, recipe_id, user_id, value.get()).await?;
    info!(%recipe_id, %user_id, rating = value.get(), inserted = up.inserted, "recipe rated");
    let view = RatingView::from(up.rating);
    Ok(if up.inserted {
        RateOutcome::Created(view)
    } else {
        RateOutcome::Updated(view)
    })
}

pub async fn unrate(st: &AppState, user_id: Uuid, recipe_id: Uuid) -> AppResult<()> {
    require_visible(st, recipe_id, Some(user_id)).await?;
    if !repo::delete_rating(&st.db, recipe_id, user_id).await? {
        return Err(AppError::not_found("Rating not found"));
    }
    info!(%recipe_id, %user_id, "rating removed");
    Ok(())
}

/// `None` when the bookmark already existed.
pub async fn save(
    st: &AppState,
    user_id: Uuid,
    recipe_id: Uuid,
) -> AppResult<Option<SavedRecipeView>> {
    require_visible(st, recipe_id, Some(user_id)).await?;
    let Some(saved) = repo::save_recipe(&st.db, user_id, recipe_id).await? else {
        return Ok(None);
    };
    info!(%recipe_id, %user_id, "recipe saved");

    let mut by_id = summaries_by_id(st, vec![recipe_id], user_id).await?;
    let recipe = by_id
        .remove(&recipe_id)
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;
    Ok(Some(SavedRecipeView {
        id: saved.id,
        recipe,
        saved_at: saved.saved_at,
    }))
}

pub async fn unsave(st: &AppState, user_id: Uuid, recipe_id: Uuid) -> AppResult<()> {
    if !repo::unsave_recipe(&st.db, user_id, recipe_id).await? {
        return Err(AppError::not_found("Saved recipe not found"));
    }
    info!(%recipe_id, %user_id, "recipe unsaved");
    Ok(())
}

pub async fn list_saved(
    st: &AppState,
    user_id: Uuid,
    page: PageRequest,
) -> AppResult<Page<SavedRecipeView>> {
    let (rows, count) = repo::list_saved(&st.db, user_id, page).await?;
    let mut by_id = summaries_by_id(st, rows.iter().map(|r| r.recipe_id).collect(), user_id).await?;
    let results = rows
        .into_iter()
        .filter_map(|row| {
            by_id.remove(&row.recipe_id).map(|recipe| SavedRecipeView {
                id: row.id,
                recipe,
                saved_at: row.saved_at,
            })
        })
        .collect();
    Ok(Page::new(results, count, page))
}

pub async fn list_comments(
    st: &AppState,
    viewer: Option<Uuid>,
    recipe_id: Uuid,
) -> AppResult<Vec<CommentView>> {
    require_visible(st, recipe_id, viewer).await?;
    let rows = repo::list_comments(&st.db, recipe_id).await?;
    Ok(rows.into_iter().map(CommentView::from).collect())
}

/// Trimmed comment text, or a validation error when there is none.
pub(crate) fn comment_text(text: Option<String>) -> AppResult<String> {
    text.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::validation("Comment text is required"))
}

pub async fn add_comment(
    st: &AppState,
    user_id: Uuid,
    recipe_id: Uuid,
    text: Option<String>,
) -> AppResult<CommentView> {
    let text = comment_text(text)?;
    require_visible(st, recipe_id, Some(user_id)).await?;
    let row = repo::insert_comment(&st.db, recipe_id, user_id, &text).await?;
    info!(%recipe_id, %user_id, comment_id = %row.id, "comment added");
    Ok(CommentView::from(row))
}

pub async fn delete_comment(st: &AppState, user_id: Uuid, comment_id: Uuid) -> AppResult<()> {
    let author = repo::comment_author(&st.db, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;
    if author != user_id {
        warn!(%comment_id, %user_id, "non-author tried to delete comment");
        return Err(AppError::forbidden(
            "You do not have permission to delete this comment",
        ));
    }
    if !repo::delete_comment(&st.db, comment_id).await? {
        return Err(AppError::not_found("Comment not found"));
    }
    info!(%comment_id, %user_id, "comment deleted");
    Ok(())
}
