use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::recipes::model::{Cuisine, Difficulty, FoodType, RecipeFields};

/// Recipe joined with its author, live rating aggregates and the viewer's
/// engagement state.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeCardRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_first_name: Option<String>,
    pub author_last_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty: Difficulty,
    pub food_type: FoodType,
    pub cuisine: Option<Cuisine>,
    pub is_public: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub is_saved: bool,
    pub user_rating: Option<f64>,
}

/// Bare `recipes` row, used on the write path.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty: Difficulty,
    pub food_type: FoodType,
    pub cuisine: Option<Cuisine>,
    pub is_public: bool,
}

impl RecipeRecord {
    pub fn fields(&self) -> RecipeFields {
        RecipeFields {
            title: self.title.clone(),
            description: self.description.clone(),
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            difficulty: self.difficulty,
            food_type: self.food_type,
            cuisine: self.cuisine,
            is_public: self.is_public,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct IngredientLineRow {
    pub id: Uuid,
    pub position: i32,
    pub amount: Option<String>,
    pub unit: Option<String>,
    pub notes: Option<String>,
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub ingredient_description: Option<String>,
    pub ingredient_is_active: bool,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub category_description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InstructionRow {
    pub id: Uuid,
    pub step: String,
    pub position: i32,
}

/// `(food_type, difficulty)` of one recipe the user bookmarked.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct TasteRow {
    pub food_type: FoodType,
    pub difficulty: Difficulty,
}
