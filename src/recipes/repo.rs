use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::recipes::{
    filter::RecipeQuery,
    model::{IngredientLineInput, RecipeFields},
    repo_types::{IngredientLineRow, InstructionRow, RecipeCardRow, RecipeRecord, TasteRow},
};

const RECORD_COLUMNS: &str = "id, author_id, title, description, image_key, prep_time, cook_time, \
     servings, difficulty, food_type, cuisine, is_public";

// ---- Reads ----

/// One page of cards plus the total number of matches.
pub async fn list_cards(
    db: &PgPool,
    query: &RecipeQuery,
    now: OffsetDateTime,
) -> anyhow::Result<(Vec<RecipeCardRow>, i64)> {
    let (count,): (i64,) = query
        .build_count(now)
        .build_query_as()
        .fetch_one(db)
        .await
        .context("count recipes")?;

    let rows = fetch_cards(db, query, now).await?;
    Ok((rows, count))
}

/// All cards matching the query, honouring its page if it has one.
pub async fn fetch_cards(
    db: &PgPool,
    query: &RecipeQuery,
    now: OffsetDateTime,
) -> anyhow::Result<Vec<RecipeCardRow>> {
    let rows = query
        .build_select(now)
        .build_query_as::<RecipeCardRow>()
        .fetch_all(db)
        .await
        .context("select recipe cards")?;
    Ok(rows)
}

pub async fn list_ingredient_lines(
    db: &PgPool,
    recipe_id: Uuid,
) -> anyhow::Result<Vec<IngredientLineRow>> {
    let rows = sqlx::query_as::<_, IngredientLineRow>(
        r#"
        SELECT ri.id, ri.position, ri.amount, ri.unit, ri.notes,
               i.id AS ingredient_id, i.name AS ingredient_name,
               i.description AS ingredient_description, i.is_active AS ingredient_is_active,
               c.id AS category_id, c.name AS category_name,
               c.description AS category_description
          FROM recipe_ingredients ri
          JOIN ingredient_items i ON i.id = ri.ingredient_id
          LEFT JOIN ingredient_categories c ON c.id = i.category_id
         WHERE ri.recipe_id = $1
         ORDER BY ri.position ASC
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list ingredient lines")?;
    Ok(rows)
}

pub async fn list_instructions(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<Vec<InstructionRow>> {
    let rows = sqlx::query_as::<_, InstructionRow>(
        r#"
        SELECT id, step, position
          FROM instructions
         WHERE recipe_id = $1
         ORDER BY position ASC
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list instructions")?;
    Ok(rows)
}

/// The recipe when it is public or authored by `viewer`.
pub async fn find_visible_record(
    db: &PgPool,
    id: Uuid,
    viewer: Option<Uuid>,
) -> anyhow::Result<Option<RecipeRecord>> {
    let row = sqlx::query_as::<_, RecipeRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM recipes WHERE id = $1 AND (is_public OR author_id = $2)"
    ))
    .bind(id)
    .bind(viewer)
    .fetch_optional(db)
    .await
    .context("find visible recipe")?;
    Ok(row)
}

/// Same as [`find_visible_record`] but takes a row lock for the rest of the
/// transaction.
pub async fn lock_visible_record_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    viewer: Uuid,
) -> anyhow::Result<Option<RecipeRecord>> {
    let row = sqlx::query_as::<_, RecipeRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM recipes \
         WHERE id = $1 AND (is_public OR author_id = $2) FOR UPDATE"
    ))
    .bind(id)
    .bind(viewer)
    .fetch_optional(&mut **tx)
    .await
    .context("lock recipe")?;
    Ok(row)
}

/// Distinct `(food_type, difficulty)` pairs across the user's bookmarks.
pub async fn saved_taste(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<TasteRow>> {
    let rows = sqlx::query_as::<_, TasteRow>(
        r#"
        SELECT DISTINCT r.food_type, r.difficulty
          FROM saved_recipes s
          JOIN recipes r ON r.id = s.recipe_id
         WHERE s.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("load saved taste")?;
    Ok(rows)
}

// ---- Writes ----

/// Ingredient ids from `ids` that do not exist.
pub async fn missing_ingredients_tx(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[Uuid],
) -> anyhow::Result<Vec<Uuid>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM ingredient_items WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&mut **tx)
        .await
        .context("check ingredient ids")?;
    let missing = ids
        .iter()
        .copied()
        .filter(|id| !found.iter().any(|(f,)| f == id))
        .collect();
    Ok(missing)
}

pub async fn insert_recipe_tx(
    tx: &mut Transaction<'_, Postgres>,
    author_id: Uuid,
    fields: &RecipeFields,
) -> anyhow::Result<RecipeRecord> {
    let row = sqlx::query_as::<_, RecipeRecord>(&format!(
        r#"
        INSERT INTO recipes (author_id, title, description, prep_time, cook_time, servings,
                             difficulty, food_type, cuisine, is_public)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(author_id)
    .bind(&fields.title)
    .bind(fields.description.as_deref())
    .bind(fields.prep_time)
    .bind(fields.cook_time)
    .bind(fields.servings)
    .bind(fields.difficulty)
    .bind(fields.food_type)
    .bind(fields.cuisine)
    .bind(fields.is_public)
    .fetch_one(&mut **tx)
    .await
    .context("insert recipe")?;
    Ok(row)
}

pub async fn update_recipe_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    fields: &RecipeFields,
) -> anyhow::Result<RecipeRecord> {
    let row = sqlx::query_as::<_, RecipeRecord>(&format!(
        r#"
        UPDATE recipes
           SET title = $2, description = $3, prep_time = $4, cook_time = $5, servings = $6,
               difficulty = $7, food_type = $8, cuisine = $9, is_public = $10,
               updated_at = now()
         WHERE id = $1
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&fields.title)
    .bind(fields.description.as_deref())
    .bind(fields.prep_time)
    .bind(fields.cook_time)
    .bind(fields.servings)
    .bind(fields.difficulty)
    .bind(fields.food_type)
    .bind(fields.cuisine)
    .bind(fields.is_public)
    .fetch_one(&mut **tx)
    .await
    .context("update recipe")?;
    Ok(row)
}

/// Drops every ingredient line and instruction of the recipe.
pub async fn delete_children_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("delete ingredient lines")?;
    sqlx::query("DELETE FROM instructions WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("delete instructions")?;
    Ok(())
}

/// Inserts the lines with 1-based positions taken from their list order.
pub async fn insert_ingredient_lines_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    lines: &[IngredientLineInput],
) -> anyhow::Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount, unit, position, notes) ",
    );
    qb.push_values(lines.iter().enumerate(), |mut b, (i, line)| {
        b.push_bind(recipe_id)
            .push_bind(line.ingredient_id)
            .push_bind(line.amount.as_deref())
            .push_bind(line.unit.as_deref())
            .push_bind(i as i32 + 1)
            .push_bind(line.notes.as_deref());
    });
    qb.build()
        .execute(&mut **tx)
        .await
        .context("insert ingredient lines")?;
    Ok(())
}

pub async fn insert_instructions_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    steps: &[String],
) -> anyhow::Result<()> {
    if steps.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO instructions (recipe_id, step, position) ");
    qb.push_values(steps.iter().enumerate(), |mut b, (i, step)| {
        b.push_bind(recipe_id)
            .push_bind(step.as_str())
            .push_bind(i as i32 + 1);
    });
    qb.build()
        .execute(&mut **tx)
        .await
        .context("insert instructions")?;
    Ok(())
}

/// Returns whether a row was removed. Children go with it through the
/// cascading foreign keys.
pub async fn delete_recipe(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete recipe")?;
    Ok(res.rows_affected() > 0)
}

pub async fn set_image_key(db: &PgPool, id: Uuid, key: Option<&str>) -> anyhow::Result<()> {
    sqlx::query("UPDATE recipes SET image_key = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(key)
        .execute(db)
        .await
        .context("set recipe image key")?;
    Ok(())
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use std::collections::HashMap;

    use crate::error::AppError;
    use crate::recipes::{
        model::{Difficulty, FoodType},
        recommend, services,
    };
    use crate::state::AppState;

    async fn user(db: &PgPool, name: &str) -> Uuid {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO users (username, password_hash) VALUES ($1, 'x') RETURNING id",
        )
        .bind(name)
        .fetch_one(db)
        .await
        .unwrap();
        id
    }

    async fn ingredient(db: &PgPool, name: &str) -> Uuid {
        let (id,): (Uuid,) =
            sqlx::query_as("INSERT INTO ingredient_items (name) VALUES ($1) RETURNING id")
                .bind(name)
                .fetch_one(db)
                .await
                .unwrap();
        id
    }

    fn fields() -> RecipeFields {
        RecipeFields {
            title: "Stew".into(),
            description: None,
            prep_time: Some(10),
            cook_time: Some(90),
            servings: Some(4),
            difficulty: Difficulty::Medium,
            food_type: FoodType::MainCourse,
            cuisine: None,
            is_public: true,
        }
    }

    fn line(ingredient_id: Uuid) -> IngredientLineInput {
        IngredientLineInput {
            ingredient_id,
            amount: Some("1".into()),
            unit: None,
            notes: None,
        }
    }

    async fn count(db: &PgPool, table: &str, recipe_id: Uuid) -> i64 {
        let (n,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE recipe_id = $1"))
                .bind(recipe_id)
                .fetch_one(db)
                .await
                .unwrap();
        n
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn replace_leaves_only_new_lines(db: PgPool) {
        let author = user(&db, "cook").await;
        let mut ids = Vec::new();
        for name in ["salt", "pepper", "onion", "carrot", "beef"] {
            ids.push(ingredient(&db, name).await);
        }
        let lines: Vec<_> = ids.iter().copied().map(line).collect();

        let mut tx = db.begin().await.unwrap();
        let recipe = insert_recipe_tx(&mut tx, author, &fields()).await.unwrap();
        insert_ingredient_lines_tx(&mut tx, recipe.id, &lines).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(count(&db, "recipe_ingredients", recipe.id).await, 5);

        let mut tx = db.begin().await.unwrap();
        delete_children_tx(&mut tx, recipe.id).await.unwrap();
        insert_ingredient_lines_tx(&mut tx, recipe.id, &lines[3..]).await.unwrap();
        tx.commit().await.unwrap();

        let rows = list_ingredient_lines(&db, recipe.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ingredient_id, ids[3]);
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[1].position, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn delete_cascades_to_engagement(db: PgPool) {
        let author = user(&db, "cook").await;
        let mut tx = db.begin().await.unwrap();
        let recipe = insert_recipe_tx(&mut tx, author, &fields()).await.unwrap();
        tx.commit().await.unwrap();

        for (i, rating) in [3.0_f64, 4.5, 5.0].into_iter().enumerate() {
            let fan = user(&db, &format!("fan{i}")).await;
            sqlx::query("INSERT INTO ratings (recipe_id, user_id, rating) VALUES ($1, $2, $3)")
                .bind(recipe.id)
                .bind(fan)
                .bind(rating)
                .execute(&db)
                .await
                .unwrap();
            if i < 2 {
                sqlx::query("INSERT INTO comments (recipe_id, user_id, text) VALUES ($1, $2, 'yum')")
                    .bind(recipe.id)
                    .bind(fan)
                    .execute(&db)
                    .await
                    .unwrap();
            }
            if i == 0 {
                sqlx::query("INSERT INTO saved_recipes (user_id, recipe_id) VALUES ($1, $2)")
                    .bind(fan)
                    .bind(recipe.id)
                    .execute(&db)
                    .await
                    .unwrap();
            }
        }

        assert!(delete_recipe(&db, recipe.id).await.unwrap());
        for table in ["ratings", "comments", "saved_recipes"] {
            assert_eq!(count(&db, table, recipe.id).await, 0, "{table}");
        }
        assert!(!delete_recipe(&db, recipe.id).await.unwrap());
    }

    async fn recipe(
        db: &PgPool,
        author: Uuid,
        title: &str,
        tweak: impl FnOnce(&mut RecipeFields),
    ) -> Uuid {
        let mut f = fields();
        f.title = title.into();
        tweak(&mut f);
        let mut tx = db.begin().await.unwrap();
        let rec = insert_recipe_tx(&mut tx, author, &f).await.unwrap();
        tx.commit().await.unwrap();
        rec.id
    }

    async fn rate(db: &PgPool, recipe_id: Uuid, user_id: Uuid, rating: f64) {
        sqlx::query("INSERT INTO ratings (recipe_id, user_id, rating) VALUES ($1, $2, $3)")
            .bind(recipe_id)
            .bind(user_id)
            .bind(rating)
            .execute(db)
            .await
            .unwrap();
    }

    async fn bookmark(db: &PgPool, user_id: Uuid, recipe_id: Uuid) {
        sqlx::query("INSERT INTO saved_recipes (user_id, recipe_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(recipe_id)
            .execute(db)
            .await
            .unwrap();
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn public_titles(st: &AppState, query: &[(&str, &str)]) -> Vec<String> {
        let mut query = query.to_vec();
        query.push(("ordering", "title"));
        services::list_public(st, None, &params(&query))
            .await
            .unwrap()
            .results
            .into_iter()
            .map(|r| r.title)
            .collect()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn private_recipes_stay_with_their_author(db: PgPool) {
        let st = AppState::with_db(db.clone());
        let author = user(&db, "cook").await;
        let other = user(&db, "guest").await;
        recipe(&db, author, "Pub", |_| {}).await;
        let secret = recipe(&db, author, "Secret", |f| f.is_public = false).await;

        assert_eq!(public_titles(&st, &[]).await, vec!["Pub"]);

        let anon = services::detail(&st, secret, None).await.unwrap_err();
        assert!(matches!(anon, AppError::NotFound(_)));
        let stranger = services::detail(&st, secret, Some(other)).await.unwrap_err();
        assert!(matches!(stranger, AppError::NotFound(_)));

        let own = services::detail(&st, secret, Some(author)).await.unwrap();
        assert_eq!(own.recipe.title, "Secret");
        let mine = services::list_mine(&st, author, &params(&[])).await.unwrap();
        assert_eq!(mine.count, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn huge_max_cook_time_still_excludes_unknown_cook_time(db: PgPool) {
        let st = AppState::with_db(db.clone());
        let author = user(&db, "cook").await;
        recipe(&db, author, "Pub", |f| f.cook_time = Some(10)).await;
        recipe(&db, author, "NoCook", |f| f.cook_time = None).await;

        assert_eq!(public_titles(&st, &[]).await, vec!["NoCook", "Pub"]);
        assert_eq!(
            public_titles(&st, &[("max_cook_time", "99999999999")]).await,
            vec!["Pub"]
        );
        assert_eq!(public_titles(&st, &[("max_cook_time", "5")]).await, Vec::<String>::new());
        assert_eq!(public_titles(&st, &[("search", "No\0Cook")]).await, vec!["NoCook"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn listing_aggregates_are_live(db: PgPool) {
        let st = AppState::with_db(db.clone());
        let author = user(&db, "cook").await;
        let fan = user(&db, "fan").await;
        let critic = user(&db, "critic").await;
        let rated = recipe(&db, author, "Rated", |_| {}).await;
        recipe(&db, author, "Unrated", |_| {}).await;
        rate(&db, rated, fan, 4.5).await;
        rate(&db, rated, critic, 3.0).await;

        let page = services::list_public(&st, Some(fan), &params(&[("ordering", "title")]))
            .await
            .unwrap();
        assert_eq!(page.count, 2);
        let (first, second) = (&page.results[0], &page.results[1]);
        assert_eq!(first.title, "Rated");
        assert!((first.average_rating - 3.75).abs() < 1e-9);
        assert_eq!(first.total_ratings, 2);
        assert_eq!(first.user_rating, Some(4.5));
        assert_eq!(second.average_rating, 0.0);
        assert_eq!(second.total_ratings, 0);
        assert_eq!(second.user_rating, None);

        let min = public_titles(&st, &[("min_rating", "4")]).await;
        assert!(min.is_empty());

        let details = services::detail(&st, rated, None).await.unwrap();
        assert_eq!(details.ratings.len(), 2);
        assert_eq!(details.recipe.total_ratings, 2);
        assert!((details.recipe.average_rating - 3.75).abs() < 1e-9);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn cold_start_recommends_highly_rated_recipes_of_others(db: PgPool) {
        let st = AppState::with_db(db.clone());
        let me = user(&db, "me").await;
        let cook = user(&db, "cook").await;
        let (fan, critic) = (user(&db, "fan").await, user(&db, "critic").await);

        let great = recipe(&db, cook, "Great", |_| {}).await;
        let good = recipe(&db, cook, "Good", |_| {}).await;
        let meh = recipe(&db, cook, "Meh", |_| {}).await;
        recipe(&db, cook, "Unrated", |_| {}).await;
        let mine = recipe(&db, me, "Mine", |_| {}).await;
        let hidden = recipe(&db, cook, "Hidden", |f| f.is_public = false).await;

        rate(&db, great, fan, 5.0).await;
        rate(&db, great, critic, 4.5).await;
        rate(&db, good, fan, 4.0).await;
        rate(&db, meh, fan, 4.5).await;
        rate(&db, meh, critic, 3.0).await;
        rate(&db, mine, fan, 5.0).await;
        rate(&db, hidden, fan, 5.0).await;

        let titles: Vec<_> = recommend::recommend(&st, me)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Great", "Good"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn similar_recommendations_skip_saved_and_authored(db: PgPool) {
        let st = AppState::with_db(db.clone());
        let me = user(&db, "me").await;
        let cook = user(&db, "cook").await;

        let saved = recipe(&db, cook, "Saved", |f| {
            f.food_type = FoodType::Dessert;
            f.difficulty = Difficulty::Easy;
        })
        .await;
        bookmark(&db, me, saved).await;

        recipe(&db, cook, "SameType", |f| {
            f.food_type = FoodType::Dessert;
            f.difficulty = Difficulty::Hard;
        })
        .await;
        recipe(&db, cook, "SameDifficulty", |f| {
            f.food_type = FoodType::Soup;
            f.difficulty = Difficulty::Easy;
        })
        .await;
        recipe(&db, cook, "Unrelated", |f| {
            f.food_type = FoodType::Soup;
            f.difficulty = Difficulty::Hard;
        })
        .await;
        recipe(&db, me, "MyDessert", |f| {
            f.food_type = FoodType::Dessert;
            f.difficulty = Difficulty::Easy;
        })
        .await;
        recipe(&db, cook, "PrivateDessert", |f| {
            f.food_type = FoodType::Dessert;
            f.is_public = false;
        })
        .await;

        let mut titles: Vec<_> = recommend::recommend(&st, me)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["SameDifficulty", "SameType"]);
    }
}
