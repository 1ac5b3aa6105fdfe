use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{dtos::usage::UsageDelta, models::usage::UsageCounter};

pub async fn get_usage<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    month_year: &str,
) -> Res<Option<UsageCounter>> {
    sqlx::query_as::<_, UsageCounter>(
        r#"
        SELECT user_id, month_year, recipes_uploaded, images_uploaded, total_image_size
        FROM user_usage
        WHERE user_id = $1 AND month_year = $2
        "#,
    )
    .bind(user_id)
    .bind(month_year)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Creates the month's row or adds to it in a single statement, so concurrent
/// increments never lose updates.
pub async fn increment_usage<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    month_year: &str,
    delta: UsageDelta,
) -> Res<UsageCounter> {
    sqlx::query_as::<_, UsageCounter>(
        r#"
        INSERT INTO user_usage (user_id, month_year, recipes_uploaded, images_uploaded, total_image_size)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, month_year) DO UPDATE
        SET recipes_uploaded = user_usage.recipes_uploaded + EXCLUDED.recipes_uploaded,
            images_uploaded = user_usage.images_uploaded + EXCLUDED.images_uploaded,
            total_image_size = user_usage.total_image_size + EXCLUDED.total_image_size,
            updated_at = NOW()
        RETURNING user_id, month_year, recipes_uploaded, images_uploaded, total_image_size
        "#,
    )
    .bind(user_id)
    .bind(month_year)
    .bind(delta.recipes)
    .bind(delta.images)
    .bind(delta.image_bytes)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
