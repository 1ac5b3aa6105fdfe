use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::recipe::RecipeWithAuthor;

/// Removes the favorite if present, otherwise adds it. Returns whether the
/// recipe is favorited afterwards.
pub async fn toggle_favorite<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Res<bool> {
    // Both branches run in one statement; the insert only fires when nothing was removed.
    sqlx::query_scalar::<_, Uuid>(
        r#"
        WITH removed AS (
            DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2 RETURNING id
        )
        INSERT INTO favorites (user_id, recipe_id)
        SELECT $1, $2 WHERE NOT EXISTS (SELECT 1 FROM removed)
        ON CONFLICT (user_id, recipe_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(executor)
    .await
    .map(|inserted| inserted.is_some())
    .map_err(AppError::from)
}

pub async fn get_favorites<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Res<Vec<RecipeWithAuthor>> {
    sqlx::query_as::<_, RecipeWithAuthor>(
        r#"
        SELECT r.*, u.username AS author_username, u.avatar_url AS author_avatar_url
        FROM favorites f
        JOIN recipes r ON r.id = f.recipe_id
        LEFT JOIN users u ON u.id = r.user_id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
