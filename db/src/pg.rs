use std::sync::Arc;

use async_trait::async_trait;
use common::error::Res;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    dtos::{
        payment::NewPayment,
        recipe::{NewRecipe, RecipeFilter, RecipeUpdate},
        subscription::{NewSubscription, SubscriptionUpdate},
        usage::UsageDelta,
        user::ProfileUpsert,
    },
    favorite,
    models::{
        payment::Payment,
        plan::SubscriptionPlan,
        recipe::{Recipe, RecipeWithAuthor},
        subscription::UserSubscription,
        usage::UsageCounter,
        user::User,
    },
    payment, plan, recipe,
    repo::{
        FavoriteRepository, PaymentRepository, PlanRepository, RecipeRepository, Repos,
        SubscriptionRepository, UsageRepository, UserRepository,
    },
    subscription, usage, user,
};

/// Postgres-backed implementation of every repository.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn into_repos(self) -> Repos {
        Repos::from_store(Arc::new(self))
    }
}

#[async_trait]
impl PlanRepository for PgStore {
    async fn list_plans(&self) -> Res<Vec<SubscriptionPlan>> {
        plan::get_plans(&*self.pool).await
    }

    async fn find_plan(&self, plan_id: Uuid) -> Res<Option<SubscriptionPlan>> {
        plan::get_plan_by_id(&*self.pool, plan_id).await
    }

    async fn find_plan_by_price(&self, stripe_price_id: &str) -> Res<Option<SubscriptionPlan>> {
        plan::get_plan_by_price(&*self.pool, stripe_price_id).await
    }
}

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn find_current(&self, user_id: Uuid) -> Res<Option<UserSubscription>> {
        subscription::get_current_subscription(&*self.pool, user_id).await
    }

    async fn find_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Res<Option<UserSubscription>> {
        subscription::get_subscription_by_stripe_id(&*self.pool, stripe_subscription_id).await
    }

    async fn insert_subscription(&self, data: NewSubscription) -> Res<Option<UserSubscription>> {
        subscription::insert_subscription(&*self.pool, data).await
    }

    async fn update_subscription(
        &self,
        stripe_subscription_id: &str,
        update: SubscriptionUpdate,
    ) -> Res<u64> {
        subscription::update_subscription(&*self.pool, stripe_subscription_id, update).await
    }
}

#[async_trait]
impl UsageRepository for PgStore {
    async fn find_usage(&self, user_id: Uuid, month_year: &str) -> Res<Option<UsageCounter>> {
        usage::get_usage(&*self.pool, user_id, month_year).await
    }

    async fn increment_usage(
        &self,
        user_id: Uuid,
        month_year: &str,
        delta: UsageDelta,
    ) -> Res<UsageCounter> {
        usage::increment_usage(&*self.pool, user_id, month_year, delta).await
    }
}

#[async_trait]
impl PaymentRepository for PgStore {
    async fn insert_payment(&self, data: NewPayment) -> Res<Option<Payment>> {
        payment::insert_payment(&*self.pool, data).await
    }

    async fn list_payments(&self, user_id: Uuid) -> Res<Vec<Payment>> {
        payment::get_payments_by_user(&*self.pool, user_id).await
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, user_id: Uuid) -> Res<Option<User>> {
        user::get_user_by_id(&*self.pool, user_id).await
    }

    async fn upsert_user(&self, user_id: Uuid, data: ProfileUpsert) -> Res<User> {
        user::upsert_user(&*self.pool, user_id, data).await
    }
}

#[async_trait]
impl RecipeRepository for PgStore {
    async fn list_public(&self, filter: RecipeFilter) -> Res<Vec<RecipeWithAuthor>> {
        recipe::get_public_recipes(&*self.pool, filter).await
    }

    async fn find_recipe(&self, recipe_id: Uuid) -> Res<Option<RecipeWithAuthor>> {
        recipe::get_recipe_by_id(&*self.pool, recipe_id).await
    }

    async fn list_by_user(&self, user_id: Uuid) -> Res<Vec<RecipeWithAuthor>> {
        recipe::get_recipes_by_user(&*self.pool, user_id).await
    }

    async fn insert_recipe(&self, user_id: Uuid, data: NewRecipe) -> Res<Recipe> {
        recipe::insert_recipe(&*self.pool, user_id, data).await
    }

    async fn update_recipe(&self, recipe_id: Uuid, data: RecipeUpdate) -> Res<Option<Recipe>> {
        recipe::update_recipe(&*self.pool, recipe_id, data).await
    }

    async fn delete_recipe(&self, recipe_id: Uuid) -> Res<bool> {
        recipe::delete_recipe(&*self.pool, recipe_id).await
    }
}

#[async_trait]
impl FavoriteRepository for PgStore {
    async fn toggle_favorite(&self, user_id: Uuid, recipe_id: Uuid) -> Res<bool> {
        favorite::toggle_favorite(&*self.pool, user_id, recipe_id).await
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Res<Vec<RecipeWithAuthor>> {
        favorite::get_favorites(&*self.pool, user_id, limit, offset).await
    }
}
