use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user, per-month consumption. `month_year` is `YYYY-MM`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageCounter {
    pub user_id: Uuid,
    pub month_year: String,
    pub recipes_uploaded: i32,
    pub images_uploaded: i32,
    pub total_image_size: i64,
}

impl UsageCounter {
    pub fn zero(user_id: Uuid, month_year: &str) -> Self {
        Self {
            user_id,
            month_year: month_year.to_string(),
            recipes_uploaded: 0,
            images_uploaded: 0,
            total_image_size: 0,
        }
    }
}
