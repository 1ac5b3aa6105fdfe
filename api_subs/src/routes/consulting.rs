use actix_web::{Responder, post, web};
use common::{error::Res, http::Success, identity::Identity};

use crate::{
    billing::Billing,
    dtos::checkout::{ConsultingPaymentRequest, PaymentLinkResponse},
};

/// Creates a one-off Stripe payment link for a consulting session.
///
/// # Input
/// - `identity`: Authenticated caller
/// - `req`: `{ optionId, userId, amount, description }`, amount in cents;
///   `userId` must be the caller's own id
///
/// # Output
/// - Success: `{ "paymentUrl": "https://buy.stripe.com/..." }`
/// - Error: 400 when a field is missing or the amount is not positive,
///   403 when `userId` names another user, 500 when Stripe fails
#[post("/create-payment")]
pub async fn post_create_payment(
    identity: web::ReqData<Identity>,
    req: web::Json<ConsultingPaymentRequest>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let payment_url = billing
        .checkout
        .create_consulting_payment(&identity, &req)
        .await?;

    Success::ok(PaymentLinkResponse { payment_url })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test, web};
    use db::memory::MemoryStore;
    use serde_json::{Value, json};

    use crate::{
        mount_consulting,
        testing::{self, FakeProvider},
    };

    #[actix_web::test]
    async fn returns_payment_url() {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let identity = testing::identity();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(testing::billing(&store.repos(), provider.clone())))
                .wrap(testing::with_identity(identity.clone()))
                .service(mount_consulting()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/consulting/create-payment")
            .set_json(json!({
                "optionId": "group-2h",
                "userId": identity.user_id,
                "amount": 12000,
                "description": "Group session for up to 6"
            }))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert!(resp["paymentUrl"].as_str().unwrap().starts_with("https://"));
        let link = provider.last_payment_link().unwrap();
        assert_eq!(link.product_name, "Group Recipe Consulting");
        assert_eq!(link.metadata["userId"], identity.user_id.to_string());
    }

    #[actix_web::test]
    async fn foreign_user_id_is_403() {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(testing::billing(&store.repos(), provider.clone())))
                .wrap(testing::with_identity(testing::identity()))
                .service(mount_consulting()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/consulting/create-payment")
            .set_json(json!({
                "optionId": "group-2h",
                "userId": testing::identity().user_id,
                "amount": 12000,
                "description": "Group session for up to 6"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(provider.calls(), 0);
    }

    #[actix_web::test]
    async fn missing_fields_are_400() {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(testing::billing(&store.repos(), provider.clone())))
                .wrap(testing::with_identity(testing::identity()))
                .service(mount_consulting()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/consulting/create-payment")
            .set_json(json!({ "optionId": "group-2h", "amount": 12000 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.calls(), 0);
    }
}
