use actix_web::{Responder, get, put, web};
use common::{error::Res, http::Success, identity::Identity};
use db::Repos;

use crate::{dtos::user::ProfileRequest, services};

/// Endpoint to retrieve the current authenticated user's information.
///
/// The identity comes from the auth middleware; the profile is whatever the
/// user saved through `PUT /me`, or `null` before the first save.
///
/// # Output
/// - Success: `{ id, email, profile: { id, username, avatarUrl, bio, createdAt, updatedAt } | null }`
/// - Error: 401 Unauthorized if no valid token is provided
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/secured/me', {
///   headers: {
///     'Authorization': `Bearer ${session.access_token}`
///   }
/// });
///
/// if (response.ok) {
///   const me = await response.json();
///   if (!me.profile) showProfileSetup();
/// }
/// ```
#[get("")]
pub async fn get_me(identity: web::ReqData<Identity>, repos: web::Data<Repos>) -> Res<impl Responder> {
    let me = services::user::get_me(&repos, &identity).await?;
    Success::ok(me)
}

/// Saves the caller's profile.
///
/// # Input
/// - `{ username, avatarUrl?, bio? }`, username must not be blank
///
/// # Output
/// - Success: same shape as `GET /me`
/// - Error: 400 Bad Request on a blank or overlong username
#[put("")]
pub async fn put_me(
    identity: web::ReqData<Identity>,
    req: web::Json<ProfileRequest>,
    repos: web::Data<Repos>,
) -> Res<impl Responder> {
    let me = services::user::save_profile(&repos, &identity, req.into_inner()).await?;
    Success::ok(me)
}
