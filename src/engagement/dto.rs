use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::UserSummary;
use crate::engagement::repo_types::{CommentRow, RatingRow};
use crate::recipes::dto::RecipeSummary;

/// POST /recipes/{id}/rate body. The value stays raw so a non-numeric
/// rating is reported as such rather than as a JSON shape error.
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    #[serde(default)]
    pub rating: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingView {
    pub id: Uuid,
    pub user: UserSummary,
    pub rating: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<RatingRow> for RatingView {
    fn from(r: RatingRow) -> Self {
        Self {
            id: r.id,
            user: UserSummary {
                id: r.user_id,
                username: r.username,
                first_name: r.first_name,
                last_name: r.last_name,
            },
            rating: r.rating,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SavedRecipeView {
    pub id: Uuid,
    pub recipe: RecipeSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub recipe: Uuid,
    pub user: UserSummary,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<CommentRow> for CommentView {
    fn from(c: CommentRow) -> Self {
        Self {
            id: c.id,
            recipe: c.recipe_id,
            user: UserSummary {
                id: c.user_id,
                username: c.username,
                first_name: c.first_name,
                last_name: c.last_name,
            },
            text: c.text,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rate_request_keeps_raw_value() {
        let req: RateRequest = serde_json::from_value(json!({"rating": "abc"})).unwrap();
        assert_eq!(req.rating, json!("abc"));
        let req: RateRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.rating.is_null());
    }

    #[test]
    fn rating_view_nests_user() {
        let row = RatingRow {
            id: Uuid::new_v4(),
            rating: 4.5,
            created_at: OffsetDateTime::UNIX_EPOCH,
            user_id: Uuid::new_v4(),
            username: "critic".into(),
            first_name: Some("Ana".into()),
            last_name: None,
        };
        let json = serde_json::to_value(RatingView::from(row)).unwrap();
        assert_eq!(json["rating"], 4.5);
        assert_eq!(json["user"]["username"], "critic");
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
    }
}
