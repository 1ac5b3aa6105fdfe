use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use api_subs::Billing;
use common::{error::Res, http::Success, identity::Identity};
use db::Repos;
use uuid::Uuid;

use crate::{
    dtos::recipe::{ListQuery, RecipeListResponse, RecipePatch, RecipeRequest},
    services,
};

/// Public recipe catalog, newest first.
///
/// # Input
/// - Query: `q` (matches title or description, case-insensitive), `category`,
///   `limit` (default 20, max 100), `offset`
///
/// # Output
/// - Success: `{ recipes: [{ id, title, ..., authorUsername, authorAvatarUrl }] }`
///
/// # Frontend Example
/// ```javascript
/// const params = new URLSearchParams({ q: 'curry', category: 'dinner', limit: 12 });
/// const { recipes } = await fetch(`/api/recipes?${params}`).then(r => r.json());
/// ```
#[get("")]
pub async fn get_recipes(
    query: web::Query<ListQuery>,
    repos: web::Data<Repos>,
) -> Res<impl Responder> {
    let recipes = services::recipe::list_public(&repos, &query).await?;
    Success::ok(RecipeListResponse { recipes })
}

/// A single public recipe. Private recipes answer 404 here.
#[get("/{id}")]
pub async fn get_recipe(path: web::Path<Uuid>, repos: web::Data<Repos>) -> Res<impl Responder> {
    let recipe = services::recipe::get_visible(&repos, path.into_inner(), None).await?;
    Success::ok(recipe)
}

/// Creates a recipe for the caller.
///
/// # Input
/// - `{ title, description?, ingredients: [..], steps: [..], cookingTime?, servings?,
///   difficultyLevel? (1-5), category?, imageUrl?, isPublic? }`
///
/// # Output
/// - Success: 201 with the stored recipe
/// - Error: 400 on invalid fields, 403 when this month's upload allowance is used up
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/secured/recipes', {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${session.access_token}`
///   },
///   body: JSON.stringify({ title, ingredients, steps, category: 'dessert' })
/// });
/// if (response.status === 403) router.push('/pricing');
/// ```
#[post("")]
pub async fn post_recipe(
    identity: web::ReqData<Identity>,
    req: web::Json<RecipeRequest>,
    repos: web::Data<Repos>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let recipe =
        services::recipe::create(&repos, &billing.meter, &identity, req.into_inner()).await?;
    Success::created(recipe)
}

/// The caller's own recipes, private ones included.
#[get("/mine")]
pub async fn get_my_recipes(
    identity: web::ReqData<Identity>,
    repos: web::Data<Repos>,
) -> Res<impl Responder> {
    let recipes = services::recipe::list_mine(&repos, &identity).await?;
    Success::ok(RecipeListResponse { recipes })
}

/// Edits a recipe. Only the owner may; absent fields are left untouched.
#[put("/{id}")]
pub async fn put_recipe(
    identity: web::ReqData<Identity>,
    path: web::Path<Uuid>,
    req: web::Json<RecipePatch>,
    repos: web::Data<Repos>,
) -> Res<impl Responder> {
    let recipe =
        services::recipe::update(&repos, &identity, path.into_inner(), req.into_inner()).await?;
    Success::ok(recipe)
}

#[delete("/{id}")]
pub async fn delete_recipe(
    identity: web::ReqData<Identity>,
    path: web::Path<Uuid>,
    repos: web::Data<Repos>,
) -> Res<HttpResponse> {
    services::recipe::delete(&repos, &identity, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test, web};
    use api_subs::{
        services::metering::FREE_MAX_RECIPES,
        testing::{self, FakeProvider},
    };
    use common::identity::Identity;
    use db::memory::MemoryStore;
    use serde_json::{Value, json};

    use crate::{mount_catalog, mount_secure_recipes};

    fn recipe_body(title: &str, public: bool) -> Value {
        json!({
            "title": title,
            "description": "Weeknight favourite",
            "ingredients": ["rice", "beans"],
            "steps": ["Cook rice", "Warm beans"],
            "difficultyLevel": 2,
            "category": "dinner",
            "isPublic": public
        })
    }

    macro_rules! app {
        ($store:expr, $identity:expr) => {{
            let repos = $store.repos();
            test::init_service(
                App::new()
                    .app_data(web::Data::new(testing::billing(
                        &repos,
                        Arc::new(FakeProvider::default()),
                    )))
                    .app_data(web::Data::new(repos))
                    .service(mount_catalog())
                    .service(
                        web::scope("/secured")
                            .wrap(testing::with_identity($identity))
                            .service(mount_secure_recipes())
                            .service(api_subs::mount_usage()),
                    ),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn created_recipe_is_counted_and_listed() {
        let store = MemoryStore::new();
        let identity = testing::identity();
        let app = app!(store, identity.clone());

        let req = test::TestRequest::post()
            .uri("/secured/recipes")
            .set_json(recipe_body("Rice and beans", true))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/recipes?q=BEANS&category=dinner")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["recipes"].as_array().unwrap().len(), 1);

        let usage = store.repos().usage;
        let period = api_subs::services::metering::current_period_key();
        let counter = usage.find_usage(identity.user_id, &period).await.unwrap().unwrap();
        assert_eq!(counter.recipes_uploaded, 1);
    }

    #[actix_web::test]
    async fn free_tier_stops_at_allowance() {
        let store = MemoryStore::new();
        let identity = testing::identity();
        let app = app!(store, identity.clone());

        for i in 0..FREE_MAX_RECIPES {
            let req = test::TestRequest::post()
                .uri("/secured/recipes")
                .set_json(recipe_body(&format!("Recipe {i}"), true))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get().uri("/secured/usage").to_request();
        let usage: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(usage["usage"]["recipes_uploaded"], json!(FREE_MAX_RECIPES));
        assert_eq!(usage["limits"]["canUpload"], false);

        let req = test::TestRequest::post()
            .uri("/secured/recipes")
            .set_json(recipe_body("One too many", true))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        // the rejected upload is neither stored nor counted
        let req = test::TestRequest::get().uri("/secured/usage").to_request();
        let usage: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(usage["usage"]["recipes_uploaded"], json!(FREE_MAX_RECIPES));
        let mine = store.repos().recipes.list_by_user(identity.user_id).await.unwrap();
        assert_eq!(mine.len(), FREE_MAX_RECIPES as usize);
    }

    #[actix_web::test]
    async fn failed_count_answers_5xx_and_stores_nothing() {
        let store = MemoryStore::new();
        let identity = testing::identity();
        let app = app!(store, identity.clone());

        store.set_fail_writes(true);
        let req = test::TestRequest::post()
            .uri("/secured/recipes")
            .set_json(recipe_body("Lost in transit", true))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_server_error());

        store.set_fail_writes(false);
        let mine = store.repos().recipes.list_by_user(identity.user_id).await.unwrap();
        assert!(mine.is_empty());
    }

    #[actix_web::test]
    async fn private_recipe_hidden_from_catalog_but_listed_for_owner() {
        let store = MemoryStore::new();
        let app = app!(store, testing::identity());

        let req = test::TestRequest::post()
            .uri("/secured/recipes")
            .set_json(recipe_body("Family secret", false))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri(&format!("/recipes/{id}")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/secured/recipes/mine").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["recipes"][0]["title"], "Family secret");
    }

    #[actix_web::test]
    async fn only_owner_may_edit_or_delete() {
        let store = MemoryStore::new();
        let owner = testing::identity();
        let intruder = Identity {
            user_id: uuid::Uuid::new_v4(),
            email: None,
        };

        let owner_app = app!(store, owner);
        let req = test::TestRequest::post()
            .uri("/secured/recipes")
            .set_json(recipe_body("Lasagne", true))
            .to_request();
        let created: Value = test::call_and_read_body_json(&owner_app, req).await;
        let id = created["id"].as_str().unwrap().to_string();

        let intruder_app = app!(store, intruder);
        let req = test::TestRequest::put()
            .uri(&format!("/secured/recipes/{id}"))
            .set_json(json!({"title": "Mine now"}))
            .to_request();
        assert_eq!(test::call_service(&intruder_app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete()
            .uri(&format!("/secured/recipes/{id}"))
            .to_request();
        assert_eq!(test::call_service(&intruder_app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::put()
            .uri(&format!("/secured/recipes/{id}"))
            .set_json(json!({"title": "Lasagne al forno"}))
            .to_request();
        let updated: Value = test::call_and_read_body_json(&owner_app, req).await;
        assert_eq!(updated["title"], "Lasagne al forno");
        assert_eq!(updated["steps"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::delete()
            .uri(&format!("/secured/recipes/{id}"))
            .to_request();
        assert_eq!(test::call_service(&owner_app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::delete()
            .uri(&format!("/secured/recipes/{id}"))
            .to_request();
        assert_eq!(test::call_service(&owner_app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn invalid_recipe_is_rejected_without_counting() {
        let store = MemoryStore::new();
        let identity = testing::identity();
        let app = app!(store, identity.clone());

        let req = test::TestRequest::post()
            .uri("/secured/recipes")
            .set_json(json!({"title": "No steps", "ingredients": ["salt"], "steps": []}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let period = api_subs::services::metering::current_period_key();
        let counter = store.repos().usage.find_usage(identity.user_id, &period).await.unwrap();
        assert!(counter.is_none());
    }
}
