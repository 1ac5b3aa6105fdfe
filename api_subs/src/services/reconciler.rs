use std::sync::Arc;

use common::error::{AppError, Res};
use db::{
    dtos::{
        payment::NewPayment,
        subscription::{NewSubscription, SubscriptionUpdate},
    },
    models::{payment::PaymentStatus, subscription::SubscriptionStatus},
    repo::{PaymentRepository, PlanRepository, SubscriptionRepository},
};
use uuid::Uuid;

use crate::{
    models::event::{CheckoutCompleted, InvoiceSettled, SubscriptionChanged, WebhookEvent},
    provider::PaymentProvider,
};

/// What applying an event did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Already recorded by an earlier delivery.
    Duplicate,
    /// Acknowledged without touching the store.
    Ignored(String),
}

/// Mirrors provider lifecycle events into `user_subscriptions` and
/// `payments`. It never decides a status on its own.
#[derive(Clone)]
pub struct Reconciler {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
    provider: Arc<dyn PaymentProvider>,
}

impl Reconciler {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        payments: Arc<dyn PaymentRepository>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            payments,
            provider,
        }
    }

    /// Any error returned here must reach the provider as a 5xx so it
    /// redelivers the event.
    pub async fn apply(&self, event: WebhookEvent) -> Res<Outcome> {
        let kind = event.kind().to_string();
        let outcome = match event {
            WebhookEvent::CheckoutCompleted(session) => self.checkout_completed(session).await?,
            WebhookEvent::SubscriptionUpdated(sub) => self.subscription_updated(sub).await?,
            WebhookEvent::SubscriptionDeleted(sub) => self.subscription_deleted(sub).await?,
            WebhookEvent::InvoicePaymentSucceeded(invoice) => {
                self.record_payment(invoice, PaymentStatus::Succeeded).await?
            }
            WebhookEvent::InvoicePaymentFailed(invoice) => {
                self.record_payment(invoice, PaymentStatus::Failed).await?
            }
            WebhookEvent::Unhandled(kind) => {
                log::info!("Unhandled event type: {}", kind);
                return Ok(Outcome::Ignored(format!("unhandled event type {}", kind)));
            }
        };

        match &outcome {
            Outcome::Applied => log::info!("Applied {}", kind),
            Outcome::Duplicate => log::info!("Skipped duplicate {}", kind),
            Outcome::Ignored(why) => log::info!("Ignored {}: {}", kind, why),
        }
        Ok(outcome)
    }

    async fn checkout_completed(&self, session: CheckoutCompleted) -> Res<Outcome> {
        if !session.is_subscription() {
            return Ok(Outcome::Ignored(format!(
                "checkout session {} is in {} mode",
                session.id, session.mode
            )));
        }

        let subscription_id = session.subscription.as_deref().ok_or_else(|| {
            AppError::BadRequest(format!(
                "Checkout session {} has no subscription",
                session.id
            ))
        })?;
        let user_id = session
            .user_reference()
            .and_then(|r| Uuid::parse_str(r).ok())
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Checkout session {} has no valid user reference",
                    session.id
                ))
            })?;

        if self
            .subscriptions
            .find_by_stripe_id(subscription_id)
            .await?
            .is_some()
        {
            return Ok(Outcome::Duplicate);
        }

        let remote = self.provider.retrieve_subscription(subscription_id).await?;
        let price_id = remote.price_id.as_deref().ok_or_else(|| {
            AppError::Internal(format!("Subscription {} has no price", remote.id))
        })?;
        // Unknown price means plan data is missing; fail so the event is redelivered.
        let plan = self
            .plans
            .find_plan_by_price(price_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("No plan for price {}", price_id)))?;

        let inserted = self
            .subscriptions
            .insert_subscription(NewSubscription {
                user_id,
                plan_id: plan.id,
                stripe_subscription_id: remote.id,
                stripe_customer_id: session.customer.or(Some(remote.customer_id)),
                status: SubscriptionStatus::Active,
                current_period_start: remote.current_period_start,
                current_period_end: remote.current_period_end,
                cancel_at_period_end: remote.cancel_at_period_end,
            })
            .await?;

        Ok(match inserted {
            Some(_) => Outcome::Applied,
            None => Outcome::Duplicate,
        })
    }

    async fn subscription_updated(&self, sub: SubscriptionChanged) -> Res<Outcome> {
        let status = match sub.status.parse::<SubscriptionStatus>() {
            Ok(status) => status,
            Err(e) => return Ok(Outcome::Ignored(e)),
        };
        let update = SubscriptionUpdate {
            status,
            current_period_start: sub.period_start(),
            current_period_end: sub.period_end(),
            cancel_at_period_end: sub.cancel_at_period_end,
        };
        self.update(&sub.id, update).await
    }

    async fn subscription_deleted(&self, sub: SubscriptionChanged) -> Res<Outcome> {
        self.update(&sub.id, SubscriptionUpdate::status(SubscriptionStatus::Canceled))
            .await
    }

    async fn update(&self, stripe_subscription_id: &str, update: SubscriptionUpdate) -> Res<Outcome> {
        let touched = self
            .subscriptions
            .update_subscription(stripe_subscription_id, update)
            .await?;
        Ok(if touched == 0 {
            Outcome::Ignored(format!("unknown subscription {}", stripe_subscription_id))
        } else {
            Outcome::Applied
        })
    }

    async fn record_payment(&self, invoice: InvoiceSettled, status: PaymentStatus) -> Res<Outcome> {
        let Some(subscription_id) = invoice.subscription.as_deref() else {
            return Ok(Outcome::Ignored(format!(
                "invoice {} has no subscription",
                invoice.id
            )));
        };
        let Some(subscription) = self.subscriptions.find_by_stripe_id(subscription_id).await?
        else {
            return Ok(Outcome::Ignored(format!(
                "unknown subscription {}",
                subscription_id
            )));
        };

        let amount = match status {
            PaymentStatus::Succeeded => invoice.amount_paid,
            _ => invoice.amount_due,
        };
        let inserted = self
            .payments
            .insert_payment(NewPayment {
                user_id: subscription.user_id,
                subscription_id: Some(subscription.id),
                stripe_payment_intent_id: invoice.payment_intent,
                stripe_invoice_id: Some(invoice.id),
                amount,
                currency: invoice.currency,
                status,
                payment_method: invoice.payment_method,
            })
            .await?;

        Ok(match inserted {
            Some(_) => Outcome::Applied,
            None => Outcome::Duplicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;
    use chrono::Utc;
    use db::{
        memory::{MemoryStore, plan},
        models::subscription::UserSubscription,
    };
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryStore>,
        provider: Arc<FakeProvider>,
        reconciler: Reconciler,
        user: Uuid,
    }

    fn harness() -> Harness {
        let store = MemoryStore::new();
        store.add_plan(plan("Premium", "price_premium", -1, 1 << 30));
        let provider = Arc::new(FakeProvider::default());
        let repos = store.repos();
        let reconciler = Reconciler::new(
            repos.plans,
            repos.subscriptions,
            repos.payments,
            provider.clone(),
        );
        Harness {
            store,
            provider,
            reconciler,
            user: Uuid::new_v4(),
        }
    }

    fn event(event_type: &str, object: serde_json::Value) -> WebhookEvent {
        let body = json!({ "id": "evt_1", "type": event_type, "data": { "object": object } });
        WebhookEvent::from_slice(&serde_json::to_vec(&body).unwrap()).unwrap()
    }

    fn checkout(user: Uuid, mode: &str) -> WebhookEvent {
        event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": mode,
                "client_reference_id": user.to_string(),
                "subscription": "sub_123",
                "customer": "cus_1"
            }),
        )
    }

    fn seed_subscription(store: &MemoryStore, user: Uuid, stripe_id: &str) -> UserSubscription {
        let now = Utc::now();
        let sub = UserSubscription {
            id: Uuid::new_v4(),
            user_id: user,
            plan_id: Uuid::new_v4(),
            stripe_subscription_id: Some(stripe_id.to_string()),
            stripe_customer_id: Some("cus_1".into()),
            status: SubscriptionStatus::Active,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        };
        store.add_subscription(sub.clone());
        sub
    }

    #[tokio::test]
    async fn checkout_creates_active_subscription_once() {
        let h = harness();
        h.provider.set_subscription("sub_123", "cus_1", "price_premium", "active");

        assert_eq!(h.reconciler.apply(checkout(h.user, "subscription")).await.unwrap(), Outcome::Applied);
        assert_eq!(h.reconciler.apply(checkout(h.user, "subscription")).await.unwrap(), Outcome::Duplicate);

        assert_eq!(h.store.subscription_count(), 1);
        let row = h.store.subscription_by_stripe_id("sub_123").unwrap();
        assert_eq!(row.user_id, h.user);
        assert_eq!(row.status, SubscriptionStatus::Active);
        assert_eq!(row.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn payment_mode_checkout_is_ignored() {
        let h = harness();
        let outcome = h.reconciler.apply(checkout(h.user, "payment")).await.unwrap();
        assert!(matches!(outcome, Outcome::Ignored(_)));
        assert_eq!(h.store.subscription_count(), 0);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn checkout_for_unknown_price_fails_for_redelivery() {
        let h = harness();
        h.provider.set_subscription("sub_123", "cus_1", "price_missing", "active");
        let err = h.reconciler.apply(checkout(h.user, "subscription")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(h.store.subscription_count(), 0);
    }

    #[tokio::test]
    async fn subscription_update_touches_only_matching_row() {
        let h = harness();
        seed_subscription(&h.store, h.user, "sub_123");
        let other = seed_subscription(&h.store, Uuid::new_v4(), "sub_456");

        let outcome = h
            .reconciler
            .apply(event(
                "customer.subscription.updated",
                json!({ "id": "sub_123", "status": "past_due", "current_period_end": 1_800_000_000 }),
            ))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);

        let updated = h.store.subscription_by_stripe_id("sub_123").unwrap();
        assert_eq!(updated.status, SubscriptionStatus::PastDue);
        assert_eq!(updated.current_period_end.unwrap().timestamp(), 1_800_000_000);
        assert_eq!(h.store.subscription_by_stripe_id("sub_456").unwrap(), other);
    }

    #[tokio::test]
    async fn subscription_deleted_marks_canceled() {
        let h = harness();
        seed_subscription(&h.store, h.user, "sub_123");
        h.reconciler
            .apply(event(
                "customer.subscription.deleted",
                json!({ "id": "sub_123", "status": "canceled" }),
            ))
            .await
            .unwrap();
        assert_eq!(
            h.store.subscription_by_stripe_id("sub_123").unwrap().status,
            SubscriptionStatus::Canceled
        );
    }

    #[tokio::test]
    async fn update_for_unknown_subscription_is_ignored() {
        let h = harness();
        let outcome = h
            .reconciler
            .apply(event(
                "customer.subscription.updated",
                json!({ "id": "sub_nope", "status": "active" }),
            ))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Ignored(_)));
    }

    #[tokio::test]
    async fn failed_invoice_appends_failed_payment_once() {
        let h = harness();
        let sub = seed_subscription(&h.store, h.user, "sub_123");
        let failed = event(
            "invoice.payment_failed",
            json!({
                "id": "in_1",
                "subscription": "sub_123",
                "amount_due": 1999,
                "amount_paid": 0,
                "currency": "usd"
            }),
        );

        assert_eq!(h.reconciler.apply(failed.clone()).await.unwrap(), Outcome::Applied);
        assert_eq!(h.reconciler.apply(failed).await.unwrap(), Outcome::Duplicate);

        let payments = h.store.repos().payments.list_payments(h.user).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Failed);
        assert_eq!(payments[0].amount, 1999);
        assert_eq!(payments[0].subscription_id, Some(sub.id));
    }

    #[tokio::test]
    async fn paid_invoice_records_amount_paid() {
        let h = harness();
        seed_subscription(&h.store, h.user, "sub_123");
        h.reconciler
            .apply(event(
                "invoice.payment_succeeded",
                json!({
                    "id": "in_2",
                    "subscription": "sub_123",
                    "payment_intent": "pi_1",
                    "amount_due": 1999,
                    "amount_paid": 1500,
                    "currency": "usd"
                }),
            ))
            .await
            .unwrap();
        let payments = h.store.repos().payments.list_payments(h.user).await.unwrap();
        assert_eq!(payments[0].amount, 1500);
        assert_eq!(payments[0].stripe_payment_intent_id.as_deref(), Some("pi_1"));
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let h = harness();
        seed_subscription(&h.store, h.user, "sub_123");
        h.store.set_fail_writes(true);
        let err = h
            .reconciler
            .apply(event(
                "customer.subscription.deleted",
                json!({ "id": "sub_123", "status": "canceled" }),
            ))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
