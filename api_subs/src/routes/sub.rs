use actix_web::{Responder, get, post, web};
use common::{
    error::{AppError, Res},
    http::Success,
    identity::Identity,
};

use crate::{
    billing::Billing,
    dtos::sub::{
        CurrentSubscriptionResponse, PaymentsResponse, PortalResponse, SubscriptionPlansResponse,
        UpdateAutoRenewRequest,
    },
};

/// Lists the purchasable plans, cheapest first.
///
/// # Output
/// - Success: `{ "plans": [ { id, name, stripe_price_id, price, currency, interval, features, max_recipes, max_image_size, has_ads } ] }`
/// - Error: 500 if the plans cannot be read
#[get("/plans")]
pub async fn get_plans(billing: web::Data<Billing>) -> Res<impl Responder> {
    let plans = billing.subscriptions.list_plans().await?;
    Success::ok(SubscriptionPlansResponse { plans })
}

/// Returns the caller's current subscription together with its plan.
/// 404 when the caller is on the free tier.
#[get("/current")]
pub async fn get_current(
    identity: web::ReqData<Identity>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let (subscription, plan) = billing
        .subscriptions
        .current(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription".to_string()))?;

    Success::ok(CurrentSubscriptionResponse { subscription, plan })
}

/// Opens a Stripe billing portal session for the current subscription.
#[post("/portal")]
pub async fn post_portal(
    identity: web::ReqData<Identity>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let url = billing.subscriptions.portal_url(identity.user_id).await?;
    Success::ok(PortalResponse { url })
}

/// Turns renewal of the current subscription on or off.
///
/// # Input
/// - `req`: `{ "autoRenew": false }` cancels at the end of the billing period
///
/// # Output
/// - Success: the subscription as currently stored. The stored
///   `cancel_at_period_end` follows once Stripe confirms through the webhook.
/// - Error: 404 without an active subscription, 500 when Stripe fails
#[post("/auto-renew")]
pub async fn post_auto_renew(
    identity: web::ReqData<Identity>,
    req: web::Json<UpdateAutoRenewRequest>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let subscription = billing
        .subscriptions
        .set_auto_renew(identity.user_id, req.auto_renew)
        .await?;
    Success::ok(subscription)
}

#[get("/payments")]
pub async fn get_payments(
    identity: web::ReqData<Identity>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let payments = billing.subscriptions.payments(identity.user_id).await?;
    Success::ok(PaymentsResponse { payments })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test, web};
    use db::memory::{MemoryStore, plan};
    use serde_json::Value;

    use crate::{
        mount_plans, mount_secure_subs,
        testing::{self, FakeProvider},
    };

    #[actix_web::test]
    async fn plans_are_listed_by_price() {
        let store = MemoryStore::new();
        let mut premium = plan("Premium", "price_p", -1, 1 << 30);
        premium.price = 999;
        store.add_plan(premium);
        store.add_plan(plan("Free", "price_f", 10, 5 << 20));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(testing::billing(
                    &store.repos(),
                    Arc::new(FakeProvider::default()),
                )))
                .service(mount_plans()),
        )
        .await;

        let req = test::TestRequest::get().uri("/sub/plans").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        let names: Vec<_> = resp["plans"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Free", "Premium"]);
    }

    #[actix_web::test]
    async fn current_without_subscription_is_404() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(testing::billing(
                    &store.repos(),
                    Arc::new(FakeProvider::default()),
                )))
                .wrap(testing::with_identity(testing::identity()))
                .service(mount_secure_subs()),
        )
        .await;

        let req = test::TestRequest::get().uri("/sub/current").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
