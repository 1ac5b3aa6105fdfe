use db::models::user::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: Option<String>,
    /// `None` until the user saves a profile for the first time.
    pub profile: Option<User>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}
