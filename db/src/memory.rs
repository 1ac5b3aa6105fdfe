//! In-process store implementing every repository with `DashMap`s. Counter
//! and dedup updates go through the entry API so they stay atomic under
//! concurrent callers, matching the guarantees of the Postgres queries.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use dashmap::{DashMap, mapref::entry::Entry};
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
        payment::{Payment, PaymentStatus},
        plan::SubscriptionPlan,
        recipe::{Recipe, RecipeWithAuthor},
        subscription::{SubscriptionStatus, UserSubscription},
        usage::UsageCounter,
        user::User,
    },
    repo::{
        FavoriteRepository, PaymentRepository, PlanRepository, RecipeRepository, Repos,
        SubscriptionRepository, UsageRepository, UserRepository,
    },
};

#[derive(Default)]
pub struct MemoryStore {
    plans: DashMap<Uuid, SubscriptionPlan>,
    subscriptions: DashMap<Uuid, (u64, UserSubscription)>,
    subscriptions_by_stripe_id: DashMap<String, Uuid>,
    usage: DashMap<(Uuid, String), UsageCounter>,
    payments: DashMap<Uuid, (u64, Payment)>,
    payments_by_invoice: DashMap<(String, PaymentStatus), Uuid>,
    users: DashMap<Uuid, User>,
    recipes: DashMap<Uuid, (u64, Recipe)>,
    favorites: DashMap<(Uuid, Uuid), u64>,
    sequence: AtomicU64,
    fail_writes: AtomicBool,
}

/// Plan with the given limits, priced at zero.
pub fn plan(name: &str, stripe_price_id: &str, max_recipes: i32, max_image_size: i64) -> SubscriptionPlan {
    SubscriptionPlan {
        id: Uuid::new_v4(),
        name: name.to_string(),
        stripe_price_id: stripe_price_id.to_string(),
        price: 0,
        currency: "usd".to_string(),
        interval: "month".to_string(),
        features: Vec::new(),
        max_recipes,
        max_image_size,
        has_ads: false,
        created_at: Utc::now(),
    }
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn repos(self: &Arc<Self>) -> Repos {
        Repos::from_store(self.clone())
    }

    pub fn add_plan(&self, plan: SubscriptionPlan) -> SubscriptionPlan {
        self.plans.insert(plan.id, plan.clone());
        plan
    }

    /// Inserts a subscription row as-is, bypassing the dedup checks.
    pub fn add_subscription(&self, sub: UserSubscription) {
        if let Some(stripe_id) = &sub.stripe_subscription_id {
            self.subscriptions_by_stripe_id.insert(stripe_id.clone(), sub.id);
        }
        let seq = self.next_seq();
        self.subscriptions.insert(sub.id, (seq, sub));
    }

    /// While set, every write fails with a retryable database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }

    pub fn subscription_by_stripe_id(&self, stripe_subscription_id: &str) -> Option<UserSubscription> {
        let id = *self.subscriptions_by_stripe_id.get(stripe_subscription_id)?;
        self.subscriptions.get(&id).map(|entry| entry.1.clone())
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn check_writable(&self) -> Res<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn with_author(&self, recipe: Recipe) -> RecipeWithAuthor {
        let author = self.users.get(&recipe.user_id);
        RecipeWithAuthor {
            author_username: author.as_ref().map(|u| u.username.clone()),
            author_avatar_url: author.as_ref().and_then(|u| u.avatar_url.clone()),
            recipe,
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn page<T>(mut rows: Vec<(u64, T)>, limit: i64, offset: i64) -> Vec<T> {
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .map(|(_, row)| row)
        .collect()
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn list_plans(&self) -> Res<Vec<SubscriptionPlan>> {
        let mut plans: Vec<_> = self.plans.iter().map(|p| p.clone()).collect();
        plans.sort_by_key(|p| p.price);
        Ok(plans)
    }

    async fn find_plan(&self, plan_id: Uuid) -> Res<Option<SubscriptionPlan>> {
        Ok(self.plans.get(&plan_id).map(|p| p.clone()))
    }

    async fn find_plan_by_price(&self, stripe_price_id: &str) -> Res<Option<SubscriptionPlan>> {
        Ok(self
            .plans
            .iter()
            .find(|p| p.stripe_price_id == stripe_price_id)
            .map(|p| p.clone()))
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn find_current(&self, user_id: Uuid) -> Res<Option<UserSubscription>> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|e| e.1.user_id == user_id && e.1.status == SubscriptionStatus::Active)
            .max_by_key(|e| (e.1.created_at, e.0))
            .map(|e| e.1.clone()))
    }

    async fn find_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Res<Option<UserSubscription>> {
        Ok(self.subscription_by_stripe_id(stripe_subscription_id))
    }

    async fn insert_subscription(&self, data: NewSubscription) -> Res<Option<UserSubscription>> {
        self.check_writable()?;
        let id = Uuid::new_v4();
        match self.subscriptions_by_stripe_id.entry(data.stripe_subscription_id.clone()) {
            Entry::Occupied(_) => return Ok(None),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
        let now = Utc::now();
        let row = UserSubscription {
            id,
            user_id: data.user_id,
            plan_id: data.plan_id,
            stripe_subscription_id: Some(data.stripe_subscription_id),
            stripe_customer_id: data.stripe_customer_id,
            status: data.status,
            current_period_start: data.current_period_start,
            current_period_end: data.current_period_end,
            cancel_at_period_end: data.cancel_at_period_end,
            created_at: now,
            updated_at: now,
        };
        let seq = self.next_seq();
        self.subscriptions.insert(id, (seq, row.clone()));
        Ok(Some(row))
    }

    async fn update_subscription(
        &self,
        stripe_subscription_id: &str,
        update: SubscriptionUpdate,
    ) -> Res<u64> {
        self.check_writable()?;
        let Some(id) = self.subscriptions_by_stripe_id.get(stripe_subscription_id).map(|id| *id)
        else {
            return Ok(0);
        };
        let Some(mut entry) = self.subscriptions.get_mut(&id) else {
            return Ok(0);
        };
        let row = &mut entry.1;
        row.status = update.status;
        if let Some(start) = update.current_period_start {
            row.current_period_start = Some(start);
        }
        if let Some(end) = update.current_period_end {
            row.current_period_end = Some(end);
        }
        if let Some(cancel) = update.cancel_at_period_end {
            row.cancel_at_period_end = cancel;
        }
        row.updated_at = Utc::now();
        Ok(1)
    }
}

#[async_trait]
impl UsageRepository for MemoryStore {
    async fn find_usage(&self, user_id: Uuid, month_year: &str) -> Res<Option<UsageCounter>> {
        Ok(self
            .usage
            .get(&(user_id, month_year.to_string()))
            .map(|c| c.clone()))
    }

    async fn increment_usage(
        &self,
        user_id: Uuid,
        month_year: &str,
        delta: UsageDelta,
    ) -> Res<UsageCounter> {
        self.check_writable()?;
        let mut counter = self
            .usage
            .entry((user_id, month_year.to_string()))
            .or_insert_with(|| UsageCounter::zero(user_id, month_year));
        counter.recipes_uploaded += delta.recipes;
        counter.images_uploaded += delta.images;
        counter.total_image_size += delta.image_bytes;
        Ok(counter.clone())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert_payment(&self, data: NewPayment) -> Res<Option<Payment>> {
        self.check_writable()?;
        let id = Uuid::new_v4();
        if let Some(invoice_id) = &data.stripe_invoice_id {
            match self.payments_by_invoice.entry((invoice_id.clone(), data.status)) {
                Entry::Occupied(_) => return Ok(None),
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }
        let row = Payment {
            id,
            user_id: data.user_id,
            subscription_id: data.subscription_id,
            stripe_payment_intent_id: data.stripe_payment_intent_id,
            stripe_invoice_id: data.stripe_invoice_id,
            amount: data.amount,
            currency: data.currency,
            status: data.status,
            payment_method: data.payment_method,
            created_at: Utc::now(),
        };
        let seq = self.next_seq();
        self.payments.insert(id, (seq, row.clone()));
        Ok(Some(row))
    }

    async fn list_payments(&self, user_id: Uuid) -> Res<Vec<Payment>> {
        let rows = self
            .payments
            .iter()
            .filter(|e| e.1.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(page(rows, i64::MAX, 0))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Res<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user_id: Uuid, data: ProfileUpsert) -> Res<User> {
        self.check_writable()?;
        let now: DateTime<Utc> = Utc::now();
        let mut user = self.users.entry(user_id).or_insert_with(|| User {
            id: user_id,
            username: data.username.clone(),
            avatar_url: None,
            bio: None,
            created_at: now,
            updated_at: now,
        });
        user.username = data.username;
        user.avatar_url = data.avatar_url;
        user.bio = data.bio;
        user.updated_at = now;
        Ok(user.clone())
    }
}

#[async_trait]
impl RecipeRepository for MemoryStore {
    async fn list_public(&self, filter: RecipeFilter) -> Res<Vec<RecipeWithAuthor>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let rows = self
            .recipes
            .iter()
            .filter(|e| e.1.is_public)
            .filter(|e| filter.category.is_none_or(|c| e.1.category == c))
            .filter(|e| {
                search.is_none_or(|s| {
                    contains_ci(&e.1.title, s)
                        || e.1.description.as_deref().is_some_and(|d| contains_ci(d, s))
                })
            })
            .map(|e| (e.0, e.1.clone()))
            .collect();
        Ok(page(rows, filter.limit, filter.offset)
            .into_iter()
            .map(|r| self.with_author(r))
            .collect())
    }

    async fn find_recipe(&self, recipe_id: Uuid) -> Res<Option<RecipeWithAuthor>> {
        let recipe = self.recipes.get(&recipe_id).map(|e| e.1.clone());
        Ok(recipe.map(|r| self.with_author(r)))
    }

    async fn list_by_user(&self, user_id: Uuid) -> Res<Vec<RecipeWithAuthor>> {
        let rows = self
            .recipes
            .iter()
            .filter(|e| e.1.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(page(rows, i64::MAX, 0)
            .into_iter()
            .map(|r| self.with_author(r))
            .collect())
    }

    async fn insert_recipe(&self, user_id: Uuid, data: NewRecipe) -> Res<Recipe> {
        self.check_writable()?;
        let now = Utc::now();
        let recipe = Recipe {
            id: Uuid::new_v4(),
            user_id,
            title: data.title,
            description: data.description,
            ingredients: data.ingredients,
            steps: data.steps,
            cooking_time: data.cooking_time,
            servings: data.servings,
            difficulty_level: data.difficulty_level,
            category: data.category,
            image_url: data.image_url,
            is_public: data.is_public,
            created_at: now,
            updated_at: now,
        };
        let seq = self.next_seq();
        self.recipes.insert(recipe.id, (seq, recipe.clone()));
        Ok(recipe)
    }

    async fn update_recipe(&self, recipe_id: Uuid, data: RecipeUpdate) -> Res<Option<Recipe>> {
        self.check_writable()?;
        let Some(mut entry) = self.recipes.get_mut(&recipe_id) else {
            return Ok(None);
        };
        let recipe = &mut entry.1;
        if let Some(title) = data.title {
            recipe.title = title;
        }
        if let Some(description) = data.description {
            recipe.description = Some(description);
        }
        if let Some(ingredients) = data.ingredients {
            recipe.ingredients = ingredients;
        }
        if let Some(steps) = data.steps {
            recipe.steps = steps;
        }
        if let Some(cooking_time) = data.cooking_time {
            recipe.cooking_time = Some(cooking_time);
        }
        if let Some(servings) = data.servings {
            recipe.servings = Some(servings);
        }
        if let Some(level) = data.difficulty_level {
            recipe.difficulty_level = Some(level);
        }
        if let Some(category) = data.category {
            recipe.category = category;
        }
        if let Some(image_url) = data.image_url {
            recipe.image_url = Some(image_url);
        }
        if let Some(is_public) = data.is_public {
            recipe.is_public = is_public;
        }
        recipe.updated_at = Utc::now();
        Ok(Some(recipe.clone()))
    }

    async fn delete_recipe(&self, recipe_id: Uuid) -> Res<bool> {
        self.check_writable()?;
        let removed = self.recipes.remove(&recipe_id).is_some();
        if removed {
            self.favorites.retain(|(_, recipe), _| *recipe != recipe_id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl FavoriteRepository for MemoryStore {
    async fn toggle_favorite(&self, user_id: Uuid, recipe_id: Uuid) -> Res<bool> {
        self.check_writable()?;
        match self.favorites.entry((user_id, recipe_id)) {
            Entry::Occupied(slot) => {
                slot.remove();
                Ok(false)
            }
            Entry::Vacant(slot) => {
                slot.insert(self.next_seq());
                Ok(true)
            }
        }
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Res<Vec<RecipeWithAuthor>> {
        let rows: Vec<(u64, Recipe)> = self
            .favorites
            .iter()
            .filter(|e| e.key().0 == user_id)
            .filter_map(|e| {
                let seq = *e.value();
                self.recipes.get(&e.key().1).map(|r| (seq, r.1.clone()))
            })
            .collect();
        Ok(page(rows, limit, offset)
            .into_iter()
            .map(|r| self.with_author(r))
            .collect())
    }
}
