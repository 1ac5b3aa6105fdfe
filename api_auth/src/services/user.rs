use common::{
    error::{AppError, Res},
    identity::Identity,
};
use db::{Repos, dtos::user::ProfileUpsert};

use crate::dtos::user::{MeResponse, ProfileRequest};

pub const MAX_USERNAME_LEN: usize = 50;

pub async fn get_me(repos: &Repos, identity: &Identity) -> Res<MeResponse> {
    let profile = repos.users.find_user(identity.user_id).await?;
    Ok(MeResponse {
        id: identity.user_id,
        email: identity.email.clone(),
        profile,
    })
}

/// Creates the caller's profile on first save, overwrites it afterwards.
pub async fn save_profile(
    repos: &Repos,
    identity: &Identity,
    req: ProfileRequest,
) -> Res<MeResponse> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }

    let profile = repos
        .users
        .upsert_user(
            identity.user_id,
            ProfileUpsert {
                username: username.to_string(),
                avatar_url: req.avatar_url.filter(|url| !url.trim().is_empty()),
                bio: req.bio,
            },
        )
        .await?;

    Ok(MeResponse {
        id: identity.user_id,
        email: identity.email.clone(),
        profile: Some(profile),
    })
}
