use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::plan::SubscriptionPlan;

pub async fn get_plans<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
) -> Res<Vec<SubscriptionPlan>> {
    sqlx::query_as::<_, SubscriptionPlan>("SELECT * FROM subscription_plans ORDER BY price ASC")
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_plan_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    plan_id: Uuid,
) -> Res<Option<SubscriptionPlan>> {
    sqlx::query_as::<_, SubscriptionPlan>("SELECT * FROM subscription_plans WHERE id = $1")
        .bind(plan_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_plan_by_price<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    stripe_price_id: &str,
) -> Res<Option<SubscriptionPlan>> {
    sqlx::query_as::<_, SubscriptionPlan>(
        "SELECT * FROM subscription_plans WHERE stripe_price_id = $1",
    )
    .bind(stripe_price_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}
