use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable tier. `max_recipes` of `-1` means unlimited.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub stripe_price_id: String,
    pub price: i64,
    pub currency: String,
    #[sqlx(rename = "billing_interval")]
    pub interval: String,
    pub features: Vec<String>,
    pub max_recipes: i32,
    pub max_image_size: i64,
    pub has_ads: bool,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    pub const UNLIMITED: i32 = -1;

    pub fn has_unlimited_recipes(&self) -> bool {
        self.max_recipes == Self::UNLIMITED
    }
}
