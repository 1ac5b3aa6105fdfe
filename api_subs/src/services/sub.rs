use std::sync::Arc;

use common::error::{AppError, Res};
use db::{
    models::{payment::Payment, plan::SubscriptionPlan, subscription::UserSubscription},
    repo::{PaymentRepository, PlanRepository, SubscriptionRepository},
};
use uuid::Uuid;

use crate::provider::PaymentProvider;

/// Read side of the entitlement store plus the self-service actions that go
/// through the provider. Stored rows only change when the provider's
/// webhook reports back.
#[derive(Clone)]
pub struct SubscriptionService {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
    provider: Arc<dyn PaymentProvider>,
    site_url: String,
}

impl SubscriptionService {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        payments: Arc<dyn PaymentRepository>,
        provider: Arc<dyn PaymentProvider>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            payments,
            provider,
            site_url: site_url.into(),
        }
    }

    pub async fn list_plans(&self) -> Res<Vec<SubscriptionPlan>> {
        self.plans.list_plans().await
    }

    pub async fn current(&self, user_id: Uuid) -> Res<Option<(UserSubscription, Option<SubscriptionPlan>)>> {
        let Some(sub) = self.subscriptions.find_current(user_id).await? else {
            return Ok(None);
        };
        let plan = self.plans.find_plan(sub.plan_id).await?;
        Ok(Some((sub, plan)))
    }

    async fn require_current(&self, user_id: Uuid) -> Res<UserSubscription> {
        self.subscriptions
            .find_current(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))
    }

    pub async fn portal_url(&self, user_id: Uuid) -> Res<String> {
        let sub = self.require_current(user_id).await?;
        let customer_id = sub.stripe_customer_id.ok_or_else(|| {
            AppError::NotFound("Subscription has no billing customer yet".to_string())
        })?;
        let return_url = format!("{}/dashboard", self.site_url);
        self.provider
            .create_portal_session(&customer_id, &return_url)
            .await
    }

    /// Asks the provider to stop (or resume) renewal at period end.
    pub async fn set_auto_renew(&self, user_id: Uuid, auto_renew: bool) -> Res<UserSubscription> {
        let sub = self.require_current(user_id).await?;
        let stripe_id = sub.stripe_subscription_id.as_deref().ok_or_else(|| {
            AppError::NotFound("Subscription is not confirmed by the provider yet".to_string())
        })?;
        self.provider
            .set_cancel_at_period_end(stripe_id, !auto_renew)
            .await?;
        Ok(sub)
    }

    pub async fn payments(&self, user_id: Uuid) -> Res<Vec<Payment>> {
        self.payments.list_payments(user_id).await
    }
}
