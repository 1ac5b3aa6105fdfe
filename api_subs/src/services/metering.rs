use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::error::Res;
use db::{
    dtos::usage::UsageDelta,
    models::{plan::SubscriptionPlan, usage::UsageCounter},
    repo::{PlanRepository, SubscriptionRepository, UsageRepository},
};
use serde::Serialize;
use uuid::Uuid;

/// Free tier: fewer than 10 recipes and under 5 MiB of images per month.
pub const FREE_MAX_RECIPES: i32 = 10;
pub const FREE_MAX_IMAGE_BYTES: i64 = 5 * 1024 * 1024;

/// Usage bucket for the given instant: the UTC calendar month as `YYYY-MM`.
pub fn period_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

pub fn current_period_key() -> String {
    period_key(Utc::now())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCheck {
    pub can_upload: bool,
    pub can_upload_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Compares a month's usage against the plan, or the free tier when there is
/// no plan. `reason` names the first failing check, recipes before images.
pub fn check_usage_limits(plan: Option<&SubscriptionPlan>, usage: &UsageCounter) -> UsageCheck {
    let (can_upload, can_upload_image) = match plan {
        None => (
            usage.recipes_uploaded < FREE_MAX_RECIPES,
            usage.total_image_size < FREE_MAX_IMAGE_BYTES,
        ),
        Some(plan) => (
            plan.has_unlimited_recipes() || usage.recipes_uploaded < plan.max_recipes,
            usage.total_image_size < plan.max_image_size,
        ),
    };

    let reason = if !can_upload {
        Some(match plan {
            None => format!(
                "Free plan upload limit reached ({} recipes per month)",
                FREE_MAX_RECIPES
            ),
            Some(plan) => format!(
                "{} plan upload limit reached ({} recipes per month)",
                plan.name, plan.max_recipes
            ),
        })
    } else if !can_upload_image {
        Some("Image storage limit reached for this month".to_string())
    } else {
        None
    };

    UsageCheck {
        can_upload,
        can_upload_image,
        reason,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub period_key: String,
    pub plan: Option<SubscriptionPlan>,
    pub usage: UsageCounter,
    pub limits: UsageCheck,
}

/// Reads and bumps per-month usage counters. The only writer of `user_usage`.
#[derive(Clone)]
pub struct UsageMeter {
    usage: Arc<dyn UsageRepository>,
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl UsageMeter {
    pub fn new(
        usage: Arc<dyn UsageRepository>,
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            usage,
            plans,
            subscriptions,
        }
    }

    /// Zero-valued counter when the bucket has no row yet. Never writes.
    pub async fn get_usage(&self, user_id: Uuid, period_key: &str) -> Res<UsageCounter> {
        Ok(self
            .usage
            .find_usage(user_id, period_key)
            .await?
            .unwrap_or_else(|| UsageCounter::zero(user_id, period_key)))
    }

    pub async fn increment_recipe_usage(&self, user_id: Uuid, period_key: &str) -> Res<UsageCounter> {
        self.usage
            .increment_usage(user_id, period_key, UsageDelta::recipe())
            .await
    }

    pub async fn increment_image_usage(
        &self,
        user_id: Uuid,
        period_key: &str,
        size_bytes: i64,
    ) -> Res<UsageCounter> {
        self.usage
            .increment_usage(user_id, period_key, UsageDelta::image(size_bytes))
            .await
    }

    /// Plan of the user's current subscription; `None` means free tier.
    pub async fn current_plan(&self, user_id: Uuid) -> Res<Option<SubscriptionPlan>> {
        match self.subscriptions.find_current(user_id).await? {
            Some(sub) => self.plans.find_plan(sub.plan_id).await,
            None => Ok(None),
        }
    }

    pub async fn entitlement(&self, user_id: Uuid, period_key: &str) -> Res<Entitlement> {
        let plan = self.current_plan(user_id).await?;
        let usage = self.get_usage(user_id, period_key).await?;
        let limits = check_usage_limits(plan.as_ref(), &usage);
        Ok(Entitlement {
            period_key: period_key.to_string(),
            plan,
            usage,
            limits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::{
        memory::{MemoryStore, plan},
        models::subscription::{SubscriptionStatus, UserSubscription},
    };

    fn usage(recipes: i32, image_bytes: i64) -> UsageCounter {
        UsageCounter {
            recipes_uploaded: recipes,
            total_image_size: image_bytes,
            ..UsageCounter::zero(Uuid::nil(), "2025-01")
        }
    }

    fn meter(store: &Arc<MemoryStore>) -> UsageMeter {
        let repos = store.repos();
        UsageMeter::new(repos.usage, repos.plans, repos.subscriptions)
    }

    #[test]
    fn free_tier_blocks_tenth_recipe() {
        let check = check_usage_limits(None, &usage(10, 0));
        assert!(!check.can_upload);
        assert!(check.can_upload_image);
        assert!(check.reason.unwrap().contains("upload limit"));
    }

    #[test]
    fn free_tier_allows_below_limits() {
        let check = check_usage_limits(None, &usage(9, FREE_MAX_IMAGE_BYTES - 1));
        assert!(check.can_upload && check.can_upload_image);
        assert!(check.reason.is_none());
    }

    #[test]
    fn unlimited_plan_still_caps_images() {
        let plan = plan("Premium", "price_p", SubscriptionPlan::UNLIMITED, 1000);
        let check = check_usage_limits(Some(&plan), &usage(1_000_000, 1001));
        assert!(check.can_upload);
        assert!(!check.can_upload_image);
        assert!(check.reason.unwrap().contains("Image"));
    }

    #[test]
    fn recipe_reason_wins_when_both_fail() {
        let plan = plan("Basic", "price_b", 5, 100);
        let check = check_usage_limits(Some(&plan), &usage(5, 100));
        assert!(!check.can_upload && !check.can_upload_image);
        assert!(check.reason.unwrap().contains("Basic plan upload limit"));
    }

    #[test]
    fn period_key_is_calendar_month() {
        let at = Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(period_key(at), "2025-03");
    }

    #[tokio::test]
    async fn reading_absent_bucket_returns_zero_without_writing() {
        let store = MemoryStore::new();
        let meter = meter(&store);
        let user = Uuid::new_v4();

        let counter = meter.get_usage(user, "2025-04").await.unwrap();
        assert_eq!(counter, UsageCounter::zero(user, "2025-04"));
        assert!(store.repos().usage.find_usage(user, "2025-04").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_recipe_increments_count_exactly() {
        let store = MemoryStore::new();
        let meter = meter(&store);
        let user = Uuid::new_v4();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let meter = meter.clone();
                tokio::spawn(async move { meter.increment_recipe_usage(user, "2025-04").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(meter.get_usage(user, "2025-04").await.unwrap().recipes_uploaded, 64);
    }

    #[tokio::test]
    async fn image_increment_tracks_count_and_bytes() {
        let store = MemoryStore::new();
        let meter = meter(&store);
        let user = Uuid::new_v4();

        meter.increment_image_usage(user, "2025-04", 2048).await.unwrap();
        let counter = meter.increment_image_usage(user, "2025-04", 1024).await.unwrap();
        assert_eq!(counter.images_uploaded, 2);
        assert_eq!(counter.total_image_size, 3072);
        assert_eq!(counter.recipes_uploaded, 0);
    }

    #[tokio::test]
    async fn increment_failure_propagates() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let meter = meter(&store);
        assert!(meter.increment_recipe_usage(Uuid::new_v4(), "2025-04").await.is_err());
    }

    #[tokio::test]
    async fn entitlement_uses_current_subscription_plan() {
        let store = MemoryStore::new();
        let premium = store.add_plan(plan("Premium", "price_p", SubscriptionPlan::UNLIMITED, 1 << 30));
        let user = Uuid::new_v4();
        let now = Utc::now();
        store.add_subscription(UserSubscription {
            id: Uuid::new_v4(),
            user_id: user,
            plan_id: premium.id,
            stripe_subscription_id: Some("sub_p".into()),
            stripe_customer_id: Some("cus_p".into()),
            status: SubscriptionStatus::Active,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        });
        let meter = meter(&store);
        for _ in 0..12 {
            meter.increment_recipe_usage(user, "2025-04").await.unwrap();
        }

        let entitlement = meter.entitlement(user, "2025-04").await.unwrap();
        assert_eq!(entitlement.plan.unwrap().id, premium.id);
        assert!(entitlement.limits.can_upload);
    }
}
