use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::engagement::repo_types::{CommentRow, RatingRow, SavedRow, UpsertedRating};
use crate::pagination::PageRequest;

// ---- Ratings ----

/// Creates the `(recipe, user)` rating or overwrites its value in place.
/// The original `created_at` is kept on overwrite.
pub async fn upsert_rating(
    db: &PgPool,
    recipe_id: Uuid,
    user_id: Uuid,
    value: f64,
) -> anyhow::Result<UpsertedRating> {
    let row = sqlx::query_as::<_, UpsertedRating>(
        r#"
        WITH up AS (
            INSERT INTO ratings (recipe_id, user_id, rating)
            VALUES ($1, $2, $3)
            ON CONFLICT (recipe_id, user_id) DO UPDATE SET rating = EXCLUDED.rating
            RETURNING id, user_id, rating, created_at, (xmax = 0) AS inserted
        )
        SELECT up.id, up.rating, up.created_at, up.inserted,
               u.id AS user_id, u.username, u.first_name, u.last_name
          FROM up
          JOIN users u ON u.id = up.user_id
        "#,
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(value)
    .fetch_one(db)
    .await
    .context("upsert rating")?;
    Ok(row)
}

pub async fn delete_rating(db: &PgPool, recipe_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM ratings WHERE recipe_id = $1 AND user_id = $2")
        .bind(recipe_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete rating")?;
    Ok(res.rows_affected() > 0)
}

pub async fn list_ratings(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<Vec<RatingRow>> {
    let rows = sqlx::query_as::<_, RatingRow>(
        r#"
        SELECT rt.id, rt.rating, rt.created_at,
               u.id AS user_id, u.username, u.first_name, u.last_name
          FROM ratings rt
          JOIN users u ON u.id = rt.user_id
         WHERE rt.recipe_id = $1
         ORDER BY rt.created_at DESC, rt.id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list ratings")?;
    Ok(rows)
}

// ---- Bookmarks ----

/// `None` when the bookmark already existed.
pub async fn save_recipe(
    db: &PgPool,
    user_id: Uuid,
    recipe_id: Uuid,
) -> anyhow::Result<Option<SavedRow>> {
    let row = sqlx::query_as::<_, SavedRow>(
        r#"
        INSERT INTO saved_recipes (user_id, recipe_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, recipe_id) DO NOTHING
        RETURNING id, recipe_id, saved_at
        "#,
    )
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(db)
    .await
    .context("save recipe")?;
    Ok(row)
}

pub async fn unsave_recipe(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM saved_recipes WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await
        .context("unsave recipe")?;
    Ok(res.rows_affected() > 0)
}

/// The user's bookmarks on recipes they can still see, oldest first.
pub async fn list_saved(
    db: &PgPool,
    user_id: Uuid,
    page: PageRequest,
) -> anyhow::Result<(Vec<SavedRow>, i64)> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
          FROM saved_recipes s
          JOIN recipes r ON r.id = s.recipe_id
         WHERE s.user_id = $1 AND (r.is_public OR r.author_id = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await
    .context("count saved recipes")?;

    let rows = sqlx::query_as::<_, SavedRow>(
        r#"
        SELECT s.id, s.recipe_id, s.saved_at
          FROM saved_recipes s
          JOIN recipes r ON r.id = s.recipe_id
         WHERE s.user_id = $1 AND (r.is_public OR r.author_id = $1)
         ORDER BY s.saved_at ASC, s.id ASC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(db)
    .await
    .context("list saved recipes")?;
    Ok((rows, count))
}

// ---- Comments ----

const COMMENT_SELECT: &str = "SELECT c.id, c.recipe_id, c.text, c.created_at, c.updated_at, \
     u.id AS user_id, u.username, u.first_name, u.last_name";

pub async fn list_comments(db: &PgPool, recipe_id: Uuid) -> anyhow::Result<Vec<CommentRow>> {
    let rows = sqlx::query_as::<_, CommentRow>(&format!(
        "{COMMENT_SELECT} FROM comments c JOIN users u ON u.id = c.user_id \
         WHERE c.recipe_id = $1 ORDER BY c.created_at DESC, c.id DESC"
    ))
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list comments")?;
    Ok(rows)
}

pub async fn insert_comment(
    db: &PgPool,
    recipe_id: Uuid,
    user_id: Uuid,
    text: &str,
) -> anyhow::Result<CommentRow> {
    let row = sqlx::query_as::<_, CommentRow>(&format!(
        r#"
        WITH c AS (
            INSERT INTO comments (recipe_id, user_id, text)
            VALUES ($1, $2, $3)
            RETURNING id, recipe_id, user_id, text, created_at, updated_at
        )
        {COMMENT_SELECT} FROM c JOIN users u ON u.id = c.user_id
        "#
    ))
    .bind(recipe_id)
    .bind(user_id)
    .bind(text)
    .fetch_one(db)
    .await
    .context("insert comment")?;
    Ok(row)
}

pub async fn comment_author(db: &PgPool, comment_id: Uuid) -> anyhow::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(db)
        .await
        .context("find comment author")?;
    Ok(row.map(|(id,)| id))
}

pub async fn delete_comment(db: &PgPool, comment_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(db)
        .await
        .context("delete comment")?;
    Ok(res.rows_affected() > 0)
}

#[cfg(test)]
mod db_tests {
    use super::*;

    async fn seed(db: &PgPool) -> (Uuid, Uuid, Uuid) {
        let (author,): (Uuid,) = sqlx::query_as(
            "INSERT INTO users (username, password_hash) VALUES ('author', 'x') RETURNING id",
        )
        .fetch_one(db)
        .await
        .unwrap();
        let (fan,): (Uuid,) = sqlx::query_as(
            "INSERT INTO users (username, password_hash) VALUES ('fan', 'x') RETURNING id",
        )
        .fetch_one(db)
        .await
        .unwrap();
        let (recipe,): (Uuid,) = sqlx::query_as(
            "INSERT INTO recipes (author_id, title) VALUES ($1, 'Pie') RETURNING id",
        )
        .bind(author)
        .fetch_one(db)
        .await
        .unwrap();
        (author, fan, recipe)
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn second_rating_overwrites_first(db: PgPool) {
        let (_, fan, recipe) = seed(&db).await;

        let first = upsert_rating(&db, recipe, fan, 2.0).await.unwrap();
        assert!(first.inserted);
        let second = upsert_rating(&db, recipe, fan, 4.5).await.unwrap();
        assert!(!second.inserted);
        assert_eq!(second.rating.id, first.rating.id);
        assert_eq!(second.rating.created_at, first.rating.created_at);

        let ratings = list_ratings(&db, recipe).await.unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].rating, 4.5);

        assert!(delete_rating(&db, recipe, fan).await.unwrap());
        assert!(!delete_rating(&db, recipe, fan).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn saving_twice_is_a_no_op(db: PgPool) {
        let (_, fan, recipe) = seed(&db).await;
        assert!(save_recipe(&db, fan, recipe).await.unwrap().is_some());
        assert!(save_recipe(&db, fan, recipe).await.unwrap().is_none());

        let page = PageRequest { page: 1, page_size: 20 };
        let (rows, count) = list_saved(&db, fan, page).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(rows[0].recipe_id, recipe);

        assert!(unsave_recipe(&db, fan, recipe).await.unwrap());
        assert!(!unsave_recipe(&db, fan, recipe).await.unwrap());
    }
}
