//! Storage seams used by the service crates. `PgStore` backs them in
//! production; the `memory` feature adds an in-process store for tests.

use std::sync::Arc;

use async_trait::async_trait;
use common::error::Res;
use uuid::Uuid;

use crate::{
    dtos::{
        payment::NewPayment,
        recipe::{NewRecipe, RecipeFilter, RecipeUpdate},
        subscription::{NewSubscription, SubscriptionUpdate},
        usage::UsageDelta,
        user::ProfileUpsert,
    },
    models::{
        payment::Payment,
        plan::SubscriptionPlan,
        recipe::{Recipe, RecipeWithAuthor},
        subscription::UserSubscription,
        usage::UsageCounter,
        user::User,
    },
};

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn list_plans(&self) -> Res<Vec<SubscriptionPlan>>;
    async fn find_plan(&self, plan_id: Uuid) -> Res<Option<SubscriptionPlan>>;
    async fn find_plan_by_price(&self, stripe_price_id: &str) -> Res<Option<SubscriptionPlan>>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_current(&self, user_id: Uuid) -> Res<Option<UserSubscription>>;
    async fn find_by_stripe_id(&self, stripe_subscription_id: &str)
    -> Res<Option<UserSubscription>>;
    /// `None` when the provider subscription id is already recorded.
    async fn insert_subscription(&self, data: NewSubscription) -> Res<Option<UserSubscription>>;
    async fn update_subscription(
        &self,
        stripe_subscription_id: &str,
        update: SubscriptionUpdate,
    ) -> Res<u64>;
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn find_usage(&self, user_id: Uuid, month_year: &str) -> Res<Option<UsageCounter>>;
    async fn increment_usage(
        &self,
        user_id: Uuid,
        month_year: &str,
        delta: UsageDelta,
    ) -> Res<UsageCounter>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// `None` when the same invoice outcome is already recorded.
    async fn insert_payment(&self, data: NewPayment) -> Res<Option<Payment>>;
    async fn list_payments(&self, user_id: Uuid) -> Res<Vec<Payment>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Res<Option<User>>;
    async fn upsert_user(&self, user_id: Uuid, data: ProfileUpsert) -> Res<User>;
}

#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn list_public(&self, filter: RecipeFilter) -> Res<Vec<RecipeWithAuthor>>;
    async fn find_recipe(&self, recipe_id: Uuid) -> Res<Option<RecipeWithAuthor>>;
    async fn list_by_user(&self, user_id: Uuid) -> Res<Vec<RecipeWithAuthor>>;
    async fn insert_recipe(&self, user_id: Uuid, data: NewRecipe) -> Res<Recipe>;
    async fn update_recipe(&self, recipe_id: Uuid, data: RecipeUpdate) -> Res<Option<Recipe>>;
    async fn delete_recipe(&self, recipe_id: Uuid) -> Res<bool>;
}

#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    async fn toggle_favorite(&self, user_id: Uuid, recipe_id: Uuid) -> Res<bool>;
    async fn list_favorites(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Res<Vec<RecipeWithAuthor>>;
}

/// Every repository the application uses, shared behind trait objects.
#[derive(Clone)]
pub struct Repos {
    pub plans: Arc<dyn PlanRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub users: Arc<dyn UserRepository>,
    pub recipes: Arc<dyn RecipeRepository>,
    pub favorites: Arc<dyn FavoriteRepository>,
}

impl Repos {
    /// Uses one store for every repository.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: PlanRepository
            + SubscriptionRepository
            + UsageRepository
            + PaymentRepository
            + UserRepository
            + RecipeRepository
            + FavoriteRepository
            + 'static,
    {
        Self {
            plans: store.clone(),
            subscriptions: store.clone(),
            usage: store.clone(),
            payments: store.clone(),
            users: store.clone(),
            recipes: store.clone(),
            favorites: store,
        }
    }
}
