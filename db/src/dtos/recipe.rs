use crate::models::recipe::RecipeCategory;

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub cooking_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty_level: Option<i32>,
    pub category: RecipeCategory,
    pub image_url: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub steps: Option<Vec<String>>,
    pub cooking_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty_level: Option<i32>,
    pub category: Option<RecipeCategory>,
    pub image_url: Option<String>,
    pub is_public: Option<bool>,
}

/// Catalog query over public recipes, newest first.
#[derive(Debug, Clone)]
pub struct RecipeFilter {
    pub search: Option<String>,
    pub category: Option<RecipeCategory>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for RecipeFilter {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            limit: 20,
            offset: 0,
        }
    }
}
