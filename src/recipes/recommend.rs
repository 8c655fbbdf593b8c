//! Lightweight recommendations: categorical similarity to the user's
//! bookmarks, or the global top-rated list when there are none.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppResult;
use crate::pagination::PageRequest;
use crate::recipes::{
    dto::RecipeSummary,
    filter::{Ordering, RecipeFilter, RecipeQuery, Scope, Taste},
    repo,
    repo_types::{RecipeCardRow, TasteRow},
    services::summaries,
};
use crate::state::AppState;

pub const RECOMMENDATION_LIMIT: usize = 6;
pub const COLD_START_MIN_RATING: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// No bookmarks: best rated recipes overall.
    ColdStart,
    /// Recipes sharing a food type or difficulty with the bookmarks.
    Similar(Taste),
}

impl Strategy {
    pub fn from_saved(rows: &[TasteRow]) -> Self {
        if rows.is_empty() {
            return Strategy::ColdStart;
        }
        let food_types: BTreeSet<&str> = rows.iter().map(|r| r.food_type.as_str()).collect();
        let difficulties: BTreeSet<&str> = rows.iter().map(|r| r.difficulty.as_str()).collect();
        Strategy::Similar(Taste {
            food_types: food_types.into_iter().map(str::to_string).collect(),
            difficulties: difficulties.into_iter().map(str::to_string).collect(),
        })
    }

    fn query(&self, user_id: Uuid) -> RecipeQuery {
        let (taste, min_rating) = match self {
            Strategy::ColdStart => (None, Some(COLD_START_MIN_RATING)),
            Strategy::Similar(taste) => (Some(taste.clone()), None),
        };
        let filter = RecipeFilter {
            min_rating,
            ordering: Ordering::TopRated,
            ..RecipeFilter::default()
        };
        RecipeQuery::new(Scope::Recommendable { user: user_id, taste }, Some(user_id))
            .with_filter(filter)
            .paginated(PageRequest {
                page: 1,
                page_size: RECOMMENDATION_LIMIT as i64,
            })
    }
}

fn by_rank(a: &RecipeCardRow, b: &RecipeCardRow) -> CmpOrdering {
    b.average_rating
        .total_cmp(&a.average_rating)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Highest average first, newer first on ties, then by id; at most
/// [`RECOMMENDATION_LIMIT`] entries.
pub fn rank(strategy: &Strategy, mut candidates: Vec<RecipeCardRow>) -> Vec<RecipeCardRow> {
    if *strategy == Strategy::ColdStart {
        candidates.retain(|c| c.average_rating >= COLD_START_MIN_RATING);
    }
    candidates.sort_by(by_rank);
    candidates.truncate(RECOMMENDATION_LIMIT);
    candidates
}

pub async fn recommend(st: &AppState, user_id: Uuid) -> AppResult<Vec<RecipeSummary>> {
    let taste = repo::saved_taste(&st.db, user_id).await?;
    let strategy = Strategy::from_saved(&taste);
    let candidates =
        repo::fetch_cards(&st.db, &strategy.query(user_id), OffsetDateTime::now_utc()).await?;
    summaries(st, rank(&strategy, candidates)).await
}
