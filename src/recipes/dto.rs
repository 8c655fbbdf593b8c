use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::UserSummary;
use crate::engagement::dto::RatingView;
use crate::ingredients::dto::IngredientItemView;
use crate::recipes::model::{
    Cuisine, Difficulty, FoodType, IngredientLineInput, InstructionInput, RecipeFields,
};
use crate::recipes::repo_types::{IngredientLineRow, InstructionRow, RecipeCardRow};

fn default_true() -> bool {
    true
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// POST /recipes body.
#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prep_time: Option<i32>,
    #[serde(default)]
    pub cook_time: Option<i32>,
    #[serde(default)]
    pub servings: Option<i32>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub food_type: FoodType,
    #[serde(default)]
    pub cuisine: Option<Cuisine>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    pub ingredients: Vec<IngredientLineInput>,
    pub instructions: Vec<InstructionInput>,
}

impl CreateRecipeRequest {
    pub fn into_parts(self) -> (RecipeFields, Vec<IngredientLineInput>, Vec<InstructionInput>) {
        let fields = RecipeFields {
            title: self.title,
            description: self.description,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            difficulty: self.difficulty,
            food_type: self.food_type,
            cuisine: self.cuisine,
            is_public: self.is_public,
        };
        (fields, self.ingredients, self.instructions)
    }
}

/// PUT/PATCH /recipes/{id} body. Scalars merge over the stored values; the two
/// lists are mandatory and replace the stored ones.
#[derive(Debug, Deserialize)]
pub struct UpdateRecipeRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub prep_time: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cook_time: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub servings: Option<Option<i32>>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub food_type: Option<FoodType>,
    #[serde(default, deserialize_with = "nullable")]
    pub cuisine: Option<Option<Cuisine>>,
    #[serde(default)]
    pub is_public: Option<bool>,
    pub ingredients: Vec<IngredientLineInput>,
    pub instructions: Vec<InstructionInput>,
}

impl UpdateRecipeRequest {
    /// Field-by-field merge of the patch over `current`.
    pub fn merge_into(
        self,
        current: RecipeFields,
    ) -> (RecipeFields, Vec<IngredientLineInput>, Vec<InstructionInput>) {
        let merged = RecipeFields {
            title: self.title.unwrap_or(current.title),
            description: self.description.unwrap_or(current.description),
            prep_time: self.prep_time.unwrap_or(current.prep_time),
            cook_time: self.cook_time.unwrap_or(current.cook_time),
            servings: self.servings.unwrap_or(current.servings),
            difficulty: self.difficulty.unwrap_or(current.difficulty),
            food_type: self.food_type.unwrap_or(current.food_type),
            cuisine: self.cuisine.unwrap_or(current.cuisine),
            is_public: self.is_public.unwrap_or(current.is_public),
        };
        (merged, self.ingredients, self.instructions)
    }
}

/// Recipe as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub author: UserSummary,
    pub image_url: Option<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty: Difficulty,
    pub food_type: FoodType,
    pub cuisine: Option<Cuisine>,
    pub is_public: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub is_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<f64>,
}

impl RecipeSummary {
    pub fn from_row(row: RecipeCardRow, image_url: Option<String>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            author: UserSummary {
                id: row.author_id,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
            },
            image_url,
            prep_time: row.prep_time,
            cook_time: row.cook_time,
            servings: row.servings,
            difficulty: row.difficulty,
            food_type: row.food_type,
            cuisine: row.cuisine,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
            average_rating: row.average_rating,
            total_ratings: row.total_ratings,
            is_saved: row.is_saved,
            user_rating: row.user_rating,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngredientLine {
    pub id: Uuid,
    pub ingredient: IngredientItemView,
    pub amount: Option<String>,
    pub unit: Option<String>,
    pub order: i32,
    pub notes: Option<String>,
}

impl From<IngredientLineRow> for IngredientLine {
    fn from(r: IngredientLineRow) -> Self {
        let ingredient = IngredientItemView::from_parts(
            r.ingredient_id,
            r.ingredient_name,
            r.ingredient_description,
            r.ingredient_is_active,
            r.category_id,
            r.category_name,
            r.category_description,
        );
        Self {
            id: r.id,
            ingredient,
            amount: r.amount,
            unit: r.unit,
            order: r.position,
            notes: r.notes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructionStep {
    pub id: Uuid,
    pub step: String,
    pub order: i32,
}

impl From<InstructionRow> for InstructionStep {
    fn from(r: InstructionRow) -> Self {
        Self {
            id: r.id,
            step: r.step,
            order: r.position,
        }
    }
}

/// Recipe detail view: the listing fields plus the owned sub-entities.
#[derive(Debug, Serialize)]
pub struct RecipeDetails {
    #[serde(flatten)]
    pub recipe: RecipeSummary,
    pub ingredients: Vec<IngredientLine>,
    pub instructions: Vec<InstructionStep>,
    pub ratings: Vec<RatingView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn current() -> RecipeFields {
        RecipeFields {
            title: "Pancakes".into(),
            description: Some("Fluffy".into()),
            prep_time: Some(5),
            cook_time: Some(15),
            servings: Some(4),
            difficulty: Difficulty::Easy,
            food_type: FoodType::Breakfast,
            cuisine: Some(Cuisine::American),
            is_public: true,
        }
    }

    #[test]
    fn create_request_applies_defaults() {
        let req: CreateRecipeRequest = serde_json::from_value(json!({
            "title": "Soup",
            "ingredients": [],
            "instructions": [{"step": "Simmer"}]
        }))
        .unwrap();
        let (fields, lines, steps) = req.into_parts();
        assert_eq!(fields.difficulty, Difficulty::Easy);
        assert_eq!(fields.food_type, FoodType::MainCourse);
        assert!(fields.is_public);
        assert!(lines.is_empty());
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn create_request_requires_lists() {
        let res = serde_json::from_value::<CreateRecipeRequest>(json!({"title": "Soup"}));
        assert!(res.is_err());
    }

    #[test]
    fn absent_fields_keep_current_values() {
        let patch: UpdateRecipeRequest = serde_json::from_value(json!({
            "title": "Better pancakes",
            "ingredients": [],
            "instructions": []
        }))
        .unwrap();
        let (merged, _, _) = patch.merge_into(current());
        assert_eq!(merged.title, "Better pancakes");
        assert_eq!(merged.description.as_deref(), Some("Fluffy"));
        assert_eq!(merged.cuisine, Some(Cuisine::American));
        assert_eq!(merged.servings, Some(4));
    }

    #[test]
    fn explicit_null_clears_nullable_fields() {
        let patch: UpdateRecipeRequest = serde_json::from_value(json!({
            "description": null,
            "cuisine": null,
            "cook_time": 20,
            "difficulty": "hard",
            "is_public": false,
            "ingredients": [],
            "instructions": []
        }))
        .unwrap();
        let (merged, _, _) = patch.merge_into(current());
        assert_eq!(merged.description, None);
        assert_eq!(merged.cuisine, None);
        assert_eq!(merged.cook_time, Some(20));
        assert_eq!(merged.difficulty, Difficulty::Hard);
        assert!(!merged.is_public);
        assert_eq!(merged.title, "Pancakes");
    }

    #[test]
    fn summary_omits_user_rating_when_absent() {
        let now = OffsetDateTime::now_utc();
        let row = RecipeCardRow {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author_username: "chef".into(),
            author_first_name: None,
            author_last_name: None,
            title: "Toast".into(),
            description: None,
            image_key: None,
            prep_time: None,
            cook_time: Some(3),
            servings: None,
            difficulty: Difficulty::Easy,
            food_type: FoodType::Snack,
            cuisine: None,
            is_public: true,
            created_at: now,
            updated_at: now,
            average_rating: 0.0,
            total_ratings: 0,
            is_saved: false,
            user_rating: None,
        };
        let json = serde_json::to_value(RecipeSummary::from_row(row, None)).unwrap();
        assert_eq!(json["average_rating"], 0.0);
        assert_eq!(json["total_ratings"], 0);
        assert_eq!(json["author"]["username"], "chef");
        assert_eq!(json["food_type"], "snack");
        assert!(json.get("user_rating").is_none());
    }
}
