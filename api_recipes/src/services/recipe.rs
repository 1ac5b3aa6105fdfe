use api_subs::services::metering::{UsageMeter, current_period_key};
use common::{
    error::{AppError, Res},
    identity::Identity,
};
use db::{
    Repos,
    dtos::recipe::{NewRecipe, RecipeFilter, RecipeUpdate},
    models::recipe::{Recipe, RecipeWithAuthor},
};
use log::{error, info};
use uuid::Uuid;

use crate::dtos::recipe::{ListQuery, RecipePatch, RecipeRequest};

pub const MAX_TITLE_LEN: usize = 200;

pub async fn list_public(repos: &Repos, query: &ListQuery) -> Res<Vec<RecipeWithAuthor>> {
    let search = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    repos
        .recipes
        .list_public(RecipeFilter {
            search,
            category: query.category,
            limit: query.limit(),
            offset: query.offset(),
        })
        .await
}

/// Private recipes are reported as missing to everyone but their owner.
pub async fn get_visible(repos: &Repos, recipe_id: Uuid, viewer: Option<Uuid>) -> Res<RecipeWithAuthor> {
    match repos.recipes.find_recipe(recipe_id).await? {
        Some(found) if found.recipe.is_public || viewer == Some(found.recipe.user_id) => Ok(found),
        _ => Err(AppError::NotFound("Recipe not found".to_string())),
    }
}

pub async fn list_mine(repos: &Repos, identity: &Identity) -> Res<Vec<RecipeWithAuthor>> {
    repos.recipes.list_by_user(identity.user_id).await
}

/// Checks the month's allowance, counts the upload, then stores the recipe.
///
/// The allowance check and the count are separate statements, so concurrent
/// creates by the same user can overshoot the plan's recipe limit by the
/// number of requests in flight. A failed count aborts before anything is
/// stored; a failed insert after a successful count leaves the month one
/// upload higher.
pub async fn create(
    repos: &Repos,
    meter: &UsageMeter,
    identity: &Identity,
    req: RecipeRequest,
) -> Res<Recipe> {
    let data = new_recipe(req)?;

    let period = current_period_key();
    let entitlement = meter.entitlement(identity.user_id, &period).await?;
    if !entitlement.limits.can_upload {
        return Err(AppError::Forbidden(
            entitlement
                .limits
                .reason
                .unwrap_or_else(|| "Recipe upload limit reached".to_string()),
        ));
    }

    meter
        .increment_recipe_usage(identity.user_id, &period)
        .await
        .inspect_err(|e| error!("Failed to count recipe for user {}: {}", identity.user_id, e))?;

    let recipe = repos.recipes.insert_recipe(identity.user_id, data).await?;
    info!("Recipe {} created by user {}", recipe.id, identity.user_id);
    Ok(recipe)
}

pub async fn update(
    repos: &Repos,
    identity: &Identity,
    recipe_id: Uuid,
    patch: RecipePatch,
) -> Res<Recipe> {
    ensure_owner(repos, identity, recipe_id).await?;
    let update = recipe_update(patch)?;

    repos
        .recipes
        .update_recipe(recipe_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))
}

pub async fn delete(repos: &Repos, identity: &Identity, recipe_id: Uuid) -> Res<()> {
    ensure_owner(repos, identity, recipe_id).await?;
    if !repos.recipes.delete_recipe(recipe_id).await? {
        return Err(AppError::NotFound("Recipe not found".to_string()));
    }
    info!("Recipe {} deleted by user {}", recipe_id, identity.user_id);
    Ok(())
}

async fn ensure_owner(repos: &Repos, identity: &Identity, recipe_id: Uuid) -> Res<()> {
    let found = repos
        .recipes
        .find_recipe(recipe_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;
    if found.recipe.user_id != identity.user_id {
        return Err(AppError::Forbidden(
            "You can only modify your own recipes".to_string(),
        ));
    }
    Ok(())
}

fn validate_title(title: &str) -> Res<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Recipe title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::BadRequest(format!(
            "Recipe title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

/// Drops blank entries; at least one must remain.
fn non_blank_lines(lines: Vec<String>, what: &str) -> Res<Vec<String>> {
    let lines: Vec<String> = lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(AppError::BadRequest(format!("At least one {} is required", what)));
    }
    Ok(lines)
}

fn validate_numbers(
    cooking_time: Option<i32>,
    servings: Option<i32>,
    difficulty_level: Option<i32>,
) -> Res<()> {
    if cooking_time.is_some_and(|t| t <= 0) {
        return Err(AppError::BadRequest("cookingTime must be positive".to_string()));
    }
    if servings.is_some_and(|s| s <= 0) {
        return Err(AppError::BadRequest("servings must be positive".to_string()));
    }
    if difficulty_level.is_some_and(|d| !(1..=5).contains(&d)) {
        return Err(AppError::BadRequest(
            "difficultyLevel must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn new_recipe(req: RecipeRequest) -> Res<NewRecipe> {
    validate_numbers(req.cooking_time, req.servings, req.difficulty_level)?;
    Ok(NewRecipe {
        title: validate_title(&req.title)?,
        description: blank_to_none(req.description),
        ingredients: non_blank_lines(req.ingredients, "ingredient")?,
        steps: non_blank_lines(req.steps, "step")?,
        cooking_time: req.cooking_time,
        servings: req.servings,
        difficulty_level: req.difficulty_level,
        category: req.category,
        image_url: blank_to_none(req.image_url),
        is_public: req.is_public,
    })
}

fn recipe_update(patch: RecipePatch) -> Res<RecipeUpdate> {
    validate_numbers(patch.cooking_time, patch.servings, patch.difficulty_level)?;
    Ok(RecipeUpdate {
        title: patch.title.as_deref().map(validate_title).transpose()?,
        description: patch.description.map(|d| d.trim().to_string()),
        ingredients: patch
            .ingredients
            .map(|lines| non_blank_lines(lines, "ingredient"))
            .transpose()?,
        steps: patch
            .steps
            .map(|lines| non_blank_lines(lines, "step"))
            .transpose()?,
        cooking_time: patch.cooking_time,
        servings: patch.servings,
        difficulty_level: patch.difficulty_level,
        category: patch.category,
        image_url: patch.image_url.map(|url| url.trim().to_string()),
        is_public: patch.is_public,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use db::{
        dtos::usage::UsageDelta, memory::MemoryStore, models::recipe::RecipeCategory,
        models::usage::UsageCounter, repo::UsageRepository,
    };
    use std::sync::Arc;

    /// Reads succeed with no row; every increment fails like a dropped connection.
    struct UnwritableUsage;

    #[async_trait]
    impl UsageRepository for UnwritableUsage {
        async fn find_usage(&self, _: Uuid, _: &str) -> Res<Option<UsageCounter>> {
            Ok(None)
        }
        async fn increment_usage(&self, _: Uuid, _: &str, _: UsageDelta) -> Res<UsageCounter> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn request() -> RecipeRequest {
        RecipeRequest {
            title: "  Shakshuka ".to_string(),
            description: Some("   ".to_string()),
            ingredients: vec!["eggs".to_string(), " ".to_string(), "tomatoes".to_string()],
            steps: vec!["Simmer sauce".to_string(), "Poach eggs".to_string()],
            cooking_time: Some(25),
            servings: Some(2),
            difficulty_level: Some(2),
            category: RecipeCategory::Breakfast,
            image_url: None,
            is_public: true,
        }
    }

    #[test]
    fn new_recipe_is_trimmed() {
        let recipe = new_recipe(request()).unwrap();
        assert_eq!(recipe.title, "Shakshuka");
        assert_eq!(recipe.description, None);
        assert_eq!(recipe.ingredients, vec!["eggs", "tomatoes"]);
    }

    #[test]
    fn new_recipe_rejects_missing_parts() {
        let mut req = request();
        req.title = " ".to_string();
        assert!(matches!(new_recipe(req), Err(AppError::BadRequest(_))));

        let mut req = request();
        req.steps = vec!["  ".to_string()];
        assert!(matches!(new_recipe(req), Err(AppError::BadRequest(_))));

        let mut req = request();
        req.difficulty_level = Some(6);
        assert!(matches!(new_recipe(req), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn failed_count_stores_nothing() {
        let store = MemoryStore::new();
        let repos = store.repos();
        let meter = UsageMeter::new(
            Arc::new(UnwritableUsage),
            repos.plans.clone(),
            repos.subscriptions.clone(),
        );
        let identity = Identity {
            user_id: Uuid::new_v4(),
            email: None,
        };

        let res = create(&repos, &meter, &identity, request()).await;
        assert!(matches!(res, Err(AppError::Database(_))));
        assert!(repos.recipes.list_by_user(identity.user_id).await.unwrap().is_empty());
    }

    #[test]
    fn patch_keeps_absent_fields_absent() {
        let update = recipe_update(RecipePatch {
            is_public: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(update.is_public, Some(false));
        assert!(update.title.is_none());
        assert!(update.ingredients.is_none());
    }
}
