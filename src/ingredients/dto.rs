use serde::Serialize;
use uuid::Uuid;

use crate::ingredients::repo_types::{CategoryRow, ItemRow};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<CategoryRow> for CategoryView {
    fn from(c: CategoryRow) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngredientItemView {
    pub id: Uuid,
    pub name: String,
    pub category: Option<CategoryView>,
    pub description: Option<String>,
    pub is_active: bool,
}

impl IngredientItemView {
    /// Builds the view from a row where the category columns come from a
    /// LEFT JOIN and are all null when the item is uncategorised.
    pub fn from_parts(
        id: Uuid,
        name: String,
        description: Option<String>,
        is_active: bool,
        category_id: Option<Uuid>,
        category_name: Option<String>,
        category_description: Option<String>,
    ) -> Self {
        let category = category_id
            .zip(category_name)
            .map(|(id, name)| CategoryView {
                id,
                name,
                description: category_description,
            });
        Self {
            id,
            name,
            category,
            description,
            is_active,
        }
    }
}

impl From<ItemRow> for IngredientItemView {
    fn from(r: ItemRow) -> Self {
        Self::from_parts(
            r.id,
            r.name,
            r.description,
            r.is_active,
            r.category_id,
            r.category_name,
            r.category_description,
        )
    }
}
