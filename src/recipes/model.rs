use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Postgres,
};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Closed set of lowercase names stored in a TEXT column guarded by a CHECK
/// constraint.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            #[cfg(test)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: stringify!($name), value: s.to_string() }),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
                <&str as sqlx::Encode<'q, Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                let text = <&str as sqlx::Decode<'r, Postgres>>::decode(value)?;
                Ok(text.parse::<$name>()?)
            }
        }
    };
}

text_enum!(Difficulty {
    Easy => "easy",
    Medium => "medium",
    Hard => "hard",
});

text_enum!(FoodType {
    Appetizer => "appetizer",
    MainCourse => "main_course",
    Dessert => "dessert",
    SideDish => "side_dish",
    Soup => "soup",
    Salad => "salad",
    Beverage => "beverage",
    Snack => "snack",
    Breakfast => "breakfast",
    Lunch => "lunch",
    Dinner => "dinner",
    Other => "other",
});

text_enum!(Cuisine {
    American => "american",
    Italian => "italian",
    Mexican => "mexican",
    Chinese => "chinese",
    Japanese => "japanese",
    Thai => "thai",
    Indian => "indian",
    French => "french",
    Greek => "greek",
    Spanish => "spanish",
    MiddleEastern => "middle_eastern",
    Korean => "korean",
    Vietnamese => "vietnamese",
    Mediterranean => "mediterranean",
    Caribbean => "caribbean",
    African => "african",
    Other => "other",
});

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Easy
    }
}

impl Default for FoodType {
    fn default() -> Self {
        FoodType::MainCourse
    }
}

pub const MAX_TITLE_LEN: usize = 200;

/// Scalar, author-editable part of a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFields {
    pub title: String,
    pub description: Option<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty: Difficulty,
    pub food_type: FoodType,
    pub cuisine: Option<Cuisine>,
    pub is_public: bool,
}

/// One ingredient line as submitted; its order index is its list position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IngredientLineInput {
    pub ingredient_id: Uuid,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstructionInput {
    pub step: String,
}

impl RecipeFields {
    /// Trims text fields and checks the scalar invariants.
    pub fn normalized(mut self) -> Result<Self, AppError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(AppError::validation("Title is required"));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::validation(format!(
                "Title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if self.prep_time.is_some_and(|t| t < 0) {
            return Err(AppError::validation("Prep time must not be negative"));
        }
        if self.cook_time.is_some_and(|t| t < 0) {
            return Err(AppError::validation("Cook time must not be negative"));
        }
        if self.servings.is_some_and(|s| s < 1) {
            return Err(AppError::validation("Servings must be a positive number"));
        }
        Ok(self)
    }
}

/// An ingredient may appear only once per recipe.
pub fn check_ingredient_lines(lines: &[IngredientLineInput]) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if !seen.insert(line.ingredient_id) {
            return Err(AppError::validation(format!(
                "Ingredient {} appears more than once",
                line.ingredient_id
            )));
        }
    }
    Ok(())
}

pub fn normalize_instructions(steps: Vec<InstructionInput>) -> Result<Vec<String>, AppError> {
    steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let step = s.step.trim().to_string();
            if step.is_empty() {
                Err(AppError::validation(format!("Instruction {} is empty", i + 1)))
            } else {
                Ok(step)
            }
        })
        .collect()
}
