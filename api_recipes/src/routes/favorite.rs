use actix_web::{Responder, get, post, web};
use common::{error::Res, http::Success, identity::Identity};
use db::Repos;
use uuid::Uuid;

use crate::{
    dtos::recipe::{FavoriteResponse, ListQuery, RecipeListResponse},
    services,
};

/// Adds the recipe to the caller's favorites, or removes it when already there.
///
/// # Output
/// - Success: `{ favorited: true | false }`, the state after the call
/// - Error: 404 if the recipe does not exist or is someone else's private recipe
#[post("/{id}/favorite")]
pub async fn post_toggle_favorite(
    identity: web::ReqData<Identity>,
    path: web::Path<Uuid>,
    repos: web::Data<Repos>,
) -> Res<impl Responder> {
    let favorited = services::favorite::toggle(&repos, &identity, path.into_inner()).await?;
    Success::ok(FavoriteResponse { favorited })
}

#[get("")]
pub async fn get_favorites(
    identity: web::ReqData<Identity>,
    query: web::Query<ListQuery>,
    repos: web::Data<Repos>,
) -> Res<impl Responder> {
    let recipes = services::favorite::list(&repos, &identity, &query).await?;
    Success::ok(RecipeListResponse { recipes })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test, web};
    use api_subs::testing::{self, FakeProvider};
    use db::memory::MemoryStore;
    use serde_json::{Value, json};

    use crate::{mount_favorites, mount_secure_recipes};

    #[actix_web::test]
    async fn toggle_twice_restores_state() {
        let store = MemoryStore::new();
        let repos = store.repos();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(testing::billing(
                    &repos,
                    Arc::new(FakeProvider::default()),
                )))
                .app_data(web::Data::new(repos))
                .service(
                    web::scope("/secured")
                        .wrap(testing::with_identity(testing::identity()))
                        .service(mount_secure_recipes())
                        .service(mount_favorites()),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/secured/recipes")
            .set_json(json!({
                "title": "Banana bread",
                "ingredients": ["bananas", "flour"],
                "steps": ["Mash", "Bake"]
            }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();

        let toggle = || {
            test::TestRequest::post()
                .uri(&format!("/secured/recipes/{id}/favorite"))
                .to_request()
        };

        let body: Value = test::call_and_read_body_json(&app, toggle()).await;
        assert_eq!(body["favorited"], true);

        let req = test::TestRequest::get().uri("/secured/favorites").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["recipes"][0]["title"], "Banana bread");

        let body: Value = test::call_and_read_body_json(&app, toggle()).await;
        assert_eq!(body["favorited"], false);

        let req = test::TestRequest::get().uri("/secured/favorites").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["recipes"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn unknown_recipe_cannot_be_favorited() {
        let store = MemoryStore::new();
        let repos = store.repos();
        let app = test::init_service(
            App::new().app_data(web::Data::new(repos)).service(
                web::scope("/secured")
                    .wrap(testing::with_identity(testing::identity()))
                    .service(mount_secure_recipes()),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/secured/recipes/{}/favorite", uuid::Uuid::new_v4()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
