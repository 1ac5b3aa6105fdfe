use common::{error::Res, identity::Identity};
use db::{Repos, models::recipe::RecipeWithAuthor};
use log::info;
use uuid::Uuid;

use crate::{dtos::recipe::ListQuery, services::recipe::get_visible};

/// Flips the favorite flag and reports the new state.
pub async fn toggle(repos: &Repos, identity: &Identity, recipe_id: Uuid) -> Res<bool> {
    get_visible(repos, recipe_id, Some(identity.user_id)).await?;

    let favorited = repos
        .favorites
        .toggle_favorite(identity.user_id, recipe_id)
        .await?;
    info!(
        "User {} {} recipe {}",
        identity.user_id,
        if favorited { "favorited" } else { "unfavorited" },
        recipe_id
    );
    Ok(favorited)
}

pub async fn list(
    repos: &Repos,
    identity: &Identity,
    query: &ListQuery,
) -> Res<Vec<RecipeWithAuthor>> {
    repos
        .favorites
        .list_favorites(identity.user_id, query.limit(), query.offset())
        .await
}
