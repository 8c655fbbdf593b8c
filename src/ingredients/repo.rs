use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::ingredients::repo_types::{CategoryRow, ItemRow};
use crate::recipes::filter::like_pattern;

pub async fn list_categories(db: &PgPool) -> anyhow::Result<Vec<CategoryRow>> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, description FROM ingredient_categories ORDER BY name ASC",
    )
    .fetch_all(db)
    .await
    .context("list ingredient categories")?;
    Ok(rows)
}

fn items_query(category: Option<&str>, search: Option<&str>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT i.id, i.name, i.description, i.is_active, \
         c.id AS category_id, c.name AS category_name, c.description AS category_description \
         FROM ingredient_items i \
         LEFT JOIN ingredient_categories c ON c.id = i.category_id \
         WHERE i.is_active",
    );
    if let Some(category) = category {
        qb.push(" AND c.name ILIKE ");
        qb.push_bind(like_pattern(category));
    }
    if let Some(search) = search {
        qb.push(" AND i.name ILIKE ");
        qb.push_bind(like_pattern(search));
    }
    qb.push(" ORDER BY i.name ASC");
    qb
}

/// Active items, optionally narrowed by category name and item name.
pub async fn list_items(
    db: &PgPool,
    category: Option<&str>,
    search: Option<&str>,
) -> anyhow::Result<Vec<ItemRow>> {
    let rows = items_query(category, search)
        .build_query_as::<ItemRow>()
        .fetch_all(db)
        .await
        .context("list ingredient items")?;
    Ok(rows)
}
