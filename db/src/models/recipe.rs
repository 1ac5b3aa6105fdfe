use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeCategory {
    Breakfast,
    Lunch,
    Dinner,
    Dessert,
    Snack,
    Appetizer,
    Soup,
    Salad,
    Beverage,
    #[default]
    Other,
}

impl RecipeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Dessert => "dessert",
            Self::Snack => "snack",
            Self::Appetizer => "appetizer",
            Self::Soup => "soup",
            Self::Salad => "salad",
            Self::Beverage => "beverage",
            Self::Other => "other",
        }
    }
}

impl FromStr for RecipeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "breakfast" => Self::Breakfast,
            "lunch" => Self::Lunch,
            "dinner" => Self::Dinner,
            "dessert" => Self::Dessert,
            "snack" => Self::Snack,
            "appetizer" => Self::Appetizer,
            "soup" => Self::Soup,
            "salad" => Self::Salad,
            "beverage" => Self::Beverage,
            "other" => Self::Other,
            other => return Err(format!("unknown recipe category: {other}")),
        })
    }
}

impl TryFrom<String> for RecipeCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub cooking_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty_level: Option<i32>,
    #[sqlx(try_from = "String")]
    pub category: RecipeCategory,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub recipe: Recipe,
    pub author_username: Option<String>,
    pub author_avatar_url: Option<String>,
}
