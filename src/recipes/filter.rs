//! Recipe query composition: a base scope, optional AND-ed filters parsed
//! leniently from the query string, an allow-listed ordering and pagination.

use std::collections::HashMap;

use sqlx::{Postgres, QueryBuilder};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::pagination::PageRequest;

/// Sort orders a caller may request. Anything else falls back to the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ordering {
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
    TitleAsc,
    TitleDesc,
    /// Highest average first; only used internally, never parsed from a request.
    TopRated,
}

impl Ordering {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("created_at") => Ordering::CreatedAtAsc,
            Some("-created_at") => Ordering::CreatedAtDesc,
            Some("title") => Ordering::TitleAsc,
            Some("-title") => Ordering::TitleDesc,
            _ => Ordering::default(),
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Ordering::CreatedAtAsc => "r.created_at ASC, r.id ASC",
            Ordering::CreatedAtDesc => "r.created_at DESC, r.id DESC",
            Ordering::TitleAsc => "r.title ASC, r.id ASC",
            Ordering::TitleDesc => "r.title DESC, r.id DESC",
            Ordering::TopRated => {
                "COALESCE(AVG(rt.rating), 0) DESC, r.created_at DESC, r.id ASC"
            }
        }
    }
}

/// Optional listing filters. A value that does not parse is dropped; the
/// remaining filters still apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub search: Option<String>,
    pub food_type: Option<String>,
    pub cuisine: Option<String>,
    pub difficulty: Option<String>,
    pub max_cook_time: Option<i64>,
    pub min_rating: Option<f64>,
    pub hours_ago: Option<i64>,
    pub ordering: Ordering,
}

/// Trimmed value with NUL bytes removed; Postgres rejects them in text.
fn text_param(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params
        .get(key)
        .map(|v| v.replace('\0', ""))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_param<T: std::str::FromStr>(params: &HashMap<String, String>, key: &str) -> Option<T> {
    text_param(params, key).and_then(|v| v.parse::<T>().ok())
}

impl RecipeFilter {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            search: text_param(params, "search"),
            food_type: text_param(params, "food_type"),
            cuisine: text_param(params, "cuisine"),
            difficulty: text_param(params, "difficulty"),
            max_cook_time: parsed_param(params, "max_cook_time"),
            min_rating: parsed_param::<f64>(params, "min_rating").filter(|r| r.is_finite()),
            hours_ago: parsed_param(params, "hours_ago"),
            ordering: Ordering::parse(params.get("ordering").map(String::as_str)),
        }
    }

    /// Lower bound on `created_at` for `hours_ago`, or `None` when the window
    /// cannot be represented.
    pub fn created_after(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let hours = self.hours_ago?;
        let seconds = hours.checked_mul(3600)?;
        now.checked_sub(Duration::seconds(seconds))
    }
}

/// Escapes LIKE metacharacters and wraps the needle for a substring match.
pub fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Categorical profile derived from a user's bookmarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taste {
    pub food_types: Vec<String>,
    pub difficulties: Vec<String>,
}

/// Base set of recipes a query starts from.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// Public listing.
    Public,
    /// Everything the user authored, public or private.
    AuthoredBy(Uuid),
    /// A single recipe, visible when public or authored by the viewer.
    Single(Uuid),
    /// The given recipes, restricted to what the viewer may see.
    Ids(Vec<Uuid>),
    /// Public recipes the user neither authored nor saved, optionally
    /// restricted to a taste profile.
    Recommendable { user: Uuid, taste: Option<Taste> },
}

#[derive(Debug, Clone)]
pub struct RecipeQuery {
    pub scope: Scope,
    pub viewer: Option<Uuid>,
    pub filter: RecipeFilter,
    pub page: Option<PageRequest>,
}

const CARD_COLUMNS: &str = "r.id, r.author_id, u.username AS author_username, \
     u.first_name AS author_first_name, u.last_name AS author_last_name, \
     r.title, r.description, r.image_key, r.prep_time, r.cook_time, r.servings, \
     r.difficulty, r.food_type, r.cuisine, r.is_public, r.created_at, r.updated_at, \
     COALESCE(AVG(rt.rating), 0)::float8 AS average_rating, \
     COUNT(rt.id) AS total_ratings";

impl RecipeQuery {
    pub fn new(scope: Scope, viewer: Option<Uuid>) -> Self {
        Self {
            scope,
            viewer,
            filter: RecipeFilter::default(),
            page: None,
        }
    }

    pub fn with_filter(mut self, filter: RecipeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn paginated(mut self, page: PageRequest) -> Self {
        self.page = Some(page);
        self
    }

    /// Rows of `RecipeCardRow`, ordered and paginated.
    pub fn build_select(&self, now: OffsetDateTime) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(CARD_COLUMNS);
        qb.push(", EXISTS (SELECT 1 FROM saved_recipes sv WHERE sv.recipe_id = r.id AND sv.user_id = ");
        qb.push_bind(self.viewer);
        qb.push(") AS is_saved, (SELECT mine.rating FROM ratings mine WHERE mine.recipe_id = r.id AND mine.user_id = ");
        qb.push_bind(self.viewer);
        qb.push(") AS user_rating");
        qb.push(" FROM recipes r JOIN users u ON u.id = r.author_id");
        qb.push(" LEFT JOIN ratings rt ON rt.recipe_id = r.id");
        self.push_conditions(&mut qb, now);
        qb.push(" GROUP BY r.id, u.id");
        self.push_having(&mut qb);
        qb.push(" ORDER BY ");
        qb.push(self.filter.ordering.sql());
        if let Some(page) = self.page {
            qb.push(" LIMIT ");
            qb.push_bind(page.limit());
            qb.push(" OFFSET ");
            qb.push_bind(page.offset());
        }
        qb
    }

    /// Single-row count of everything `build_select` would return unpaginated.
    pub fn build_count(&self, now: OffsetDateTime) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM (SELECT r.id FROM recipes r");
        qb.push(" LEFT JOIN ratings rt ON rt.recipe_id = r.id");
        self.push_conditions(&mut qb, now);
        qb.push(" GROUP BY r.id");
        self.push_having(&mut qb);
        qb.push(") AS matched");
        qb
    }

    fn push_conditions(&self, qb: &mut QueryBuilder<'static, Postgres>, now: OffsetDateTime) {
        qb.push(" WHERE ");
        match &self.scope {
            Scope::Public => {
                qb.push("r.is_public");
            }
            Scope::AuthoredBy(author) => {
                qb.push("r.author_id = ");
                qb.push_bind(*author);
            }
            Scope::Single(id) => {
                qb.push("r.id = ");
                qb.push_bind(*id);
                self.push_visible_to_viewer(qb);
            }
            Scope::Ids(ids) => {
                qb.push("r.id = ANY(");
                qb.push_bind(ids.clone());
                qb.push(")");
                self.push_visible_to_viewer(qb);
            }
            Scope::Recommendable { user, taste } => {
                qb.push("r.is_public AND r.author_id <> ");
                qb.push_bind(*user);
                qb.push(" AND NOT EXISTS (SELECT 1 FROM saved_recipes sv2 WHERE sv2.recipe_id = r.id AND sv2.user_id = ");
                qb.push_bind(*user);
                qb.push(")");
                if let Some(taste) = taste {
                    qb.push(" AND (r.food_type = ANY(");
                    qb.push_bind(taste.food_types.clone());
                    qb.push(") OR r.difficulty = ANY(");
                    qb.push_bind(taste.difficulties.clone());
                    qb.push("))");
                }
            }
        }

        let f = &self.filter;
        if let Some(search) = &f.search {
            let pattern = like_pattern(search);
            qb.push(" AND (r.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR r.description ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if let Some(food_type) = &f.food_type {
            qb.push(" AND r.food_type = ");
            qb.push_bind(food_type.clone());
        }
        if let Some(cuisine) = &f.cuisine {
            qb.push(" AND r.cuisine = ");
            qb.push_bind(cuisine.clone());
        }
        if let Some(difficulty) = &f.difficulty {
            qb.push(" AND r.difficulty = ");
            qb.push_bind(difficulty.clone());
        }
        if let Some(max) = f.max_cook_time {
            qb.push(" AND r.cook_time <= ");
            qb.push_bind(max);
        }
        if let Some(cutoff) = f.created_after(now) {
            qb.push(" AND r.created_at >= ");
            qb.push_bind(cutoff);
        }
    }

    fn push_visible_to_viewer(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" AND (r.is_public OR r.author_id = ");
        qb.push_bind(self.viewer);
        qb.push(")");
    }

    fn push_having(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        if let Some(min) = self.filter.min_rating {
            qb.push(" HAVING COALESCE(AVG(rt.rating), 0) >= ");
            qb.push_bind(min);
        }
    }
}
