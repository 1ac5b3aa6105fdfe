use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{dtos::payment::NewPayment, models::payment::Payment};

/// Returns `None` when this invoice already has a payment with the same status.
pub async fn insert_payment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: NewPayment,
) -> Res<Option<Payment>> {
    sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (
            user_id, subscription_id, stripe_payment_intent_id, stripe_invoice_id,
            amount, currency, status, payment_method
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (stripe_invoice_id, status) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.subscription_id)
    .bind(&data.stripe_payment_intent_id)
    .bind(&data.stripe_invoice_id)
    .bind(data.amount)
    .bind(&data.currency)
    .bind(data.status.as_str())
    .bind(&data.payment_method)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_payments_by_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<Payment>> {
    sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
