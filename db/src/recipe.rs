use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    dtos::recipe::{NewRecipe, RecipeFilter, RecipeUpdate},
    models::recipe::{Recipe, RecipeWithAuthor},
};

const WITH_AUTHOR: &str = r#"
    SELECT r.*, u.username AS author_username, u.avatar_url AS author_avatar_url
    FROM recipes r
    LEFT JOIN users u ON u.id = r.user_id
"#;

pub async fn get_public_recipes<'e, E>(executor: E, filter: RecipeFilter) -> Res<Vec<RecipeWithAuthor>>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(WITH_AUTHOR);
    qb.push(" WHERE r.is_public = TRUE");

    if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (r.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(category) = filter.category {
        qb.push(" AND r.category = ").push_bind(category.as_str());
    }

    qb.push(" ORDER BY r.created_at DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    qb.build_query_as::<RecipeWithAuthor>()
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_recipe_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    recipe_id: Uuid,
) -> Res<Option<RecipeWithAuthor>> {
    sqlx::query_as::<_, RecipeWithAuthor>(&format!("{WITH_AUTHOR} WHERE r.id = $1"))
        .bind(recipe_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_recipes_by_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<RecipeWithAuthor>> {
    sqlx::query_as::<_, RecipeWithAuthor>(&format!(
        "{WITH_AUTHOR} WHERE r.user_id = $1 ORDER BY r.created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_recipe<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    data: NewRecipe,
) -> Res<Recipe> {
    sqlx::query_as::<_, Recipe>(
        r#"
        INSERT INTO recipes (
            user_id, title, description, ingredients, steps, cooking_time,
            servings, difficulty_level, category, image_url, is_public
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&data.title)
    .bind(&data.description)
    .bind(&data.ingredients)
    .bind(&data.steps)
    .bind(data.cooking_time)
    .bind(data.servings)
    .bind(data.difficulty_level)
    .bind(data.category.as_str())
    .bind(&data.image_url)
    .bind(data.is_public)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_recipe<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    recipe_id: Uuid,
    data: RecipeUpdate,
) -> Res<Option<Recipe>> {
    sqlx::query_as::<_, Recipe>(
        r#"
        UPDATE recipes
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            ingredients = COALESCE($4, ingredients),
            steps = COALESCE($5, steps),
            cooking_time = COALESCE($6, cooking_time),
            servings = COALESCE($7, servings),
            difficulty_level = COALESCE($8, difficulty_level),
            category = COALESCE($9, category),
            image_url = COALESCE($10, image_url),
            is_public = COALESCE($11, is_public),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(recipe_id)
    .bind(&data.title)
    .bind(&data.description)
    .bind(&data.ingredients)
    .bind(&data.steps)
    .bind(data.cooking_time)
    .bind(data.servings)
    .bind(data.difficulty_level)
    .bind(data.category.map(|c| c.as_str()))
    .bind(&data.image_url)
    .bind(data.is_public)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn delete_recipe<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    recipe_id: Uuid,
) -> Res<bool> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .execute(executor)
        .await
        .map(|result| result.rows_affected() > 0)
        .map_err(AppError::from)
}
