//! One-shot loader for the bundled ingredient catalog.

use anyhow::Context;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

const CATALOG_JSON: &str = include_str!("../seed/ingredients.json");

#[derive(Debug, Deserialize)]
pub struct Catalog {
    pub categories: Vec<CatalogCategory>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub items: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: u64,
    pub items: u64,
}

pub fn bundled_catalog() -> anyhow::Result<Catalog> {
    serde_json::from_str(CATALOG_JSON).context("parse bundled ingredient catalog")
}

/// Inserts whatever part of the catalog is missing. Existing rows, matched by
/// name, are left untouched.
pub async fn load(db: &PgPool, catalog: &Catalog) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();
    let mut tx = db.begin().await.context("begin tx")?;

    for category in &catalog.categories {
        let res = sqlx::query(
            "INSERT INTO ingredient_categories (name, description) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(&category.name)
        .bind(category.description.as_deref())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert category {}", category.name))?;
        report.categories += res.rows_affected();

        let (category_id,): (Uuid,) =
            sqlx::query_as("SELECT id FROM ingredient_categories WHERE name = $1")
                .bind(&category.name)
                .fetch_one(&mut *tx)
                .await
                .with_context(|| format!("load category {}", category.name))?;

        if category.items.is_empty() {
            continue;
        }
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredient_items (name, category_id) ");
        qb.push_values(&category.items, |mut b, name| {
            b.push_bind(name.as_str()).push_bind(category_id);
        });
        qb.push(" ON CONFLICT (name) DO NOTHING");
        let res = qb
            .build()
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert items of {}", category.name))?;
        report.items += res.rows_affected();
    }

    tx.commit().await.context("commit tx")?;
    info!(
        categories = report.categories,
        items = report.items,
        "ingredient catalog loaded"
    );
    Ok(report)
}
