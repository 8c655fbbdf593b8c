use std::collections::HashMap;

use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engagement::{dto::RatingView, rating::RatingSummary, repo as engagement_repo};
use crate::error::{AppError, AppResult};
use crate::images::services::{delete_best_effort, image_url};
use crate::pagination::{Page, PageRequest};
use crate::recipes::{
    dto::{
        CreateRecipeRequest, IngredientLine, InstructionStep, RecipeDetails, RecipeSummary,
        UpdateRecipeRequest,
    },
    filter::{RecipeFilter, RecipeQuery, Scope},
    model::{
        check_ingredient_lines, normalize_instructions, IngredientLineInput, InstructionInput,
        RecipeFields,
    },
    repo,
    repo_types::{RecipeCardRow, RecipeRecord},
};
use crate::state::AppState;

/// Turns card rows into summaries, presigning image urls.
pub async fn summaries(st: &AppState, rows: Vec<RecipeCardRow>) -> AppResult<Vec<RecipeSummary>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let url = image_url(st, row.image_key.as_deref()).await?;
        out.push(RecipeSummary::from_row(row, url));
    }
    Ok(out)
}

async fn page_of(
    st: &AppState,
    query: RecipeQuery,
    page: PageRequest,
) -> AppResult<Page<RecipeSummary>> {
    let query = query.paginated(page);
    let (rows, count) = repo::list_cards(&st.db, &query, OffsetDateTime::now_utc()).await?;
    let results = summaries(st, rows).await?;
    Ok(Page::new(results, count, page))
}

/// Public listing with filters, ordering and pagination from the query string.
pub async fn list_public(
    st: &AppState,
    viewer: Option<Uuid>,
    params: &HashMap<String, String>,
) -> AppResult<Page<RecipeSummary>> {
    let query = RecipeQuery::new(Scope::Public, viewer).with_filter(RecipeFilter::from_params(params));
    let page = PageRequest::from_params(params, &st.config.pagination);
    page_of(st, query, page).await
}

/// Everything the user authored, public and private.
pub async fn list_mine(
    st: &AppState,
    user_id: Uuid,
    params: &HashMap<String, String>,
) -> AppResult<Page<RecipeSummary>> {
    let query = RecipeQuery::new(Scope::AuthoredBy(user_id), Some(user_id))
        .with_filter(RecipeFilter::from_params(params));
    let page = PageRequest::from_params(params, &st.config.pagination);
    page_of(st, query, page).await
}

/// Summaries for `ids` the viewer may see, keyed by recipe id.
pub async fn summaries_by_id(
    st: &AppState,
    ids: Vec<Uuid>,
    viewer: Uuid,
) -> AppResult<HashMap<Uuid, RecipeSummary>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let query = RecipeQuery::new(Scope::Ids(ids), Some(viewer));
    let rows = repo::fetch_cards(&st.db, &query, OffsetDateTime::now_utc()).await?;
    let list = summaries(st, rows).await?;
    Ok(list.into_iter().map(|s| (s.id, s)).collect())
}

/// The recipe if `viewer` may see it, otherwise not found.
pub async fn require_visible(
    st: &AppState,
    recipe_id: Uuid,
    viewer: Option<Uuid>,
) -> AppResult<RecipeRecord> {
    repo::find_visible_record(&st.db, recipe_id, viewer)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))
}

/// Not found when the recipe is invisible to the requester, forbidden when
/// it is visible but authored by someone else.
pub(crate) fn authorize_author(
    record: Option<RecipeRecord>,
    requester: Uuid,
) -> AppResult<RecipeRecord> {
    let record = record.ok_or_else(|| AppError::not_found("Recipe not found"))?;
    if record.author_id != requester {
        warn!(recipe_id = %record.id, %requester, "non-author tried to modify recipe");
        return Err(AppError::forbidden(
            "You do not have permission to modify this recipe",
        ));
    }
    Ok(record)
}

/// The recipe, provided `user_id` authored it.
pub async fn owned_record(st: &AppState, recipe_id: Uuid, user_id: Uuid) -> AppResult<RecipeRecord> {
    let record = repo::find_visible_record(&st.db, recipe_id, Some(user_id)).await?;
    authorize_author(record, user_id)
}

pub async fn detail(st: &AppState, recipe_id: Uuid, viewer: Option<Uuid>) -> AppResult<RecipeDetails> {
    let query = RecipeQuery::new(Scope::Single(recipe_id), viewer);
    let row = repo::fetch_cards(&st.db, &query, OffsetDateTime::now_utc())
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;

    let lines = repo::list_ingredient_lines(&st.db, recipe_id).await?;
    let steps = repo::list_instructions(&st.db, recipe_id).await?;
    let ratings = engagement_repo::list_ratings(&st.db, recipe_id).await?;

    let url = image_url(st, row.image_key.as_deref()).await?;
    let mut recipe = RecipeSummary::from_row(row, url);
    // Aggregates must agree with the ratings list in the same payload.
    let agg = RatingSummary::from_values(ratings.iter().map(|r| r.rating));
    recipe.average_rating = agg.average_rating;
    recipe.total_ratings = agg.total_ratings;

    Ok(RecipeDetails {
        recipe,
        ingredients: lines.into_iter().map(IngredientLine::from).collect(),
        instructions: steps.into_iter().map(InstructionStep::from).collect(),
        ratings: ratings.into_iter().map(RatingView::from).collect(),
    })
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validated write payload: scalar fields, ingredient lines and step texts.
struct WritePlan {
    fields: RecipeFields,
    lines: Vec<IngredientLineInput>,
    steps: Vec<String>,
}

fn plan_write(
    fields: RecipeFields,
    lines: Vec<IngredientLineInput>,
    steps: Vec<InstructionInput>,
) -> AppResult<WritePlan> {
    let fields = fields.normalized()?;
    check_ingredient_lines(&lines)?;
    let lines = lines
        .into_iter()
        .map(|l| IngredientLineInput {
            ingredient_id: l.ingredient_id,
            amount: clean_text(l.amount),
            unit: clean_text(l.unit),
            notes: clean_text(l.notes),
        })
        .collect();
    let steps = normalize_instructions(steps)?;
    Ok(WritePlan {
        fields,
        lines,
        steps,
    })
}

async fn write_children_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    recipe_id: Uuid,
    plan: &WritePlan,
) -> AppResult<()> {
    let ids: Vec<Uuid> = plan.lines.iter().map(|l| l.ingredient_id).collect();
    let missing = repo::missing_ingredients_tx(tx, &ids).await?;
    if let Some(id) = missing.first() {
        return Err(AppError::validation(format!("Unknown ingredient {id}")));
    }
    repo::insert_ingredient_lines_tx(tx, recipe_id, &plan.lines).await?;
    repo::insert_instructions_tx(tx, recipe_id, &plan.steps).await?;
    Ok(())
}

pub async fn create(
    st: &AppState,
    author_id: Uuid,
    req: CreateRecipeRequest,
) -> AppResult<RecipeDetails> {
    let (fields, lines, steps) = req.into_parts();
    let plan = plan_write(fields, lines, steps)?;

    let mut tx = st.db.begin().await.context("begin tx")?;
    let record = repo::insert_recipe_tx(&mut tx, author_id, &plan.fields).await?;
    write_children_tx(&mut tx, record.id, &plan).await?;
    tx.commit().await.context("commit tx")?;

    info!(recipe_id = %record.id, %author_id, "recipe created");
    detail(st, record.id, Some(author_id)).await
}

/// Merges scalar fields and replaces both child lists in one transaction.
pub async fn update(
    st: &AppState,
    user_id: Uuid,
    recipe_id: Uuid,
    req: UpdateRecipeRequest,
) -> AppResult<RecipeDetails> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    let current = repo::lock_visible_record_tx(&mut tx, recipe_id, user_id).await?;
    let current = authorize_author(current, user_id)?;

    let (fields, lines, steps) = req.merge_into(current.fields());
    let plan = plan_write(fields, lines, steps)?;

    repo::update_recipe_tx(&mut tx, recipe_id, &plan.fields).await?;
    repo::delete_children_tx(&mut tx, recipe_id).await?;
    write_children_tx(&mut tx, recipe_id, &plan).await?;
    tx.commit().await.context("commit tx")?;

    info!(%recipe_id, %user_id, "recipe updated");
    detail(st, recipe_id, Some(user_id)).await
}

pub async fn delete(st: &AppState, user_id: Uuid, recipe_id: Uuid) -> AppResult<()> {
    let record = owned_record(st, recipe_id, user_id).await?;
    if !repo::delete_recipe(&st.db, recipe_id).await? {
        return Err(AppError::not_found("Recipe not found"));
    }
    if let Some(key) = record.image_key.as_deref() {
        delete_best_effort(st, key).await;
    }
    info!(%recipe_id, %user_id, "recipe deleted");
    Ok(())
}
