use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::subscription::{NewSubscription, SubscriptionUpdate},
    models::subscription::UserSubscription,
};

/// Most recently created active subscription of the user.
pub async fn get_current_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<UserSubscription>> {
    sqlx::query_as::<_, UserSubscription>(
        r#"
        SELECT * FROM user_subscriptions
        WHERE user_id = $1 AND status = 'active'
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_subscription_by_stripe_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    stripe_subscription_id: &str,
) -> Res<Option<UserSubscription>> {
    sqlx::query_as::<_, UserSubscription>(
        "SELECT * FROM user_subscriptions WHERE stripe_subscription_id = $1",
    )
    .bind(stripe_subscription_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Returns `None` when a row with the same provider subscription id exists.
pub async fn insert_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: NewSubscription,
) -> Res<Option<UserSubscription>> {
    sqlx::query_as::<_, UserSubscription>(
        r#"
        INSERT INTO user_subscriptions (
            user_id, plan_id, stripe_subscription_id, stripe_customer_id, status,
            current_period_start, current_period_end, cancel_at_period_end
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (stripe_subscription_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.plan_id)
    .bind(&data.stripe_subscription_id)
    .bind(&data.stripe_customer_id)
    .bind(data.status.as_str())
    .bind(data.current_period_start)
    .bind(data.current_period_end)
    .bind(data.cancel_at_period_end)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Returns the number of rows touched; zero means the subscription is unknown.
pub async fn update_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    stripe_subscription_id: &str,
    update: SubscriptionUpdate,
) -> Res<u64> {
    sqlx::query(
        r#"
        UPDATE user_subscriptions
        SET status = $2,
            current_period_start = COALESCE($3, current_period_start),
            current_period_end = COALESCE($4, current_period_end),
            cancel_at_period_end = COALESCE($5, cancel_at_period_end),
            updated_at = NOW()
        WHERE stripe_subscription_id = $1
        "#,
    )
    .bind(stripe_subscription_id)
    .bind(update.status.as_str())
    .bind(update.current_period_start)
    .bind(update.current_period_end)
    .bind(update.cancel_at_period_end)
    .execute(executor)
    .await
    .map(|result| result.rows_affected())
    .map_err(AppError::from)
}
