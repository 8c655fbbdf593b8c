use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A rating joined with its author.
#[derive(Debug, Clone, FromRow)]
pub struct RatingRow {
    pub id: Uuid,
    pub rating: f64,
    pub created_at: OffsetDateTime,
    pub user_id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UpsertedRating {
    #[sqlx(flatten)]
    pub rating: RatingRow,
    /// False when an existing rating was overwritten.
    pub inserted: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct SavedRow {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub saved_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
