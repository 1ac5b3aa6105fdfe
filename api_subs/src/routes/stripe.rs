use actix_web::{HttpRequest, Responder, post, web};
use common::{error::Res, http::Success, identity::Identity};
use serde_json::json;

use crate::{
    billing::Billing,
    dtos::checkout::{CheckoutSessionRequest, CheckoutSessionResponse},
};

/// Handles Stripe webhook events for subscription bookkeeping.
///
/// # Input
/// - `payload`: Raw request body, verified byte for byte
/// - `req`: HTTP request carrying the `stripe-signature` header
/// - `billing`: Webhook ingress and reconciler
///
/// # Output
/// - Success: `{ "received": true }`, also for event types that are not handled
/// - Error: 400 for a missing or invalid signature or a malformed payload,
///   500 when the event could not be applied (Stripe then redelivers it)
///
/// # Note
/// This endpoint is called by Stripe's servers, not by the frontend. Configure
/// `https://yourapp.com/api/stripe/webhook` in the Stripe Dashboard and set the
/// signing secret as STRIPE_WEBHOOK_SECRET.
///
/// # Event Types Handled
/// - checkout.session.completed: records the new subscription (subscription mode only)
/// - customer.subscription.updated: mirrors status and billing period
/// - customer.subscription.deleted: marks the subscription canceled
/// - invoice.payment_succeeded: appends a succeeded payment
/// - invoice.payment_failed: appends a failed payment
#[post("/webhook")]
pub async fn post_webhook(
    payload: web::Bytes,
    req: HttpRequest,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    let event = billing.ingress.construct_event(&payload, signature)?;
    billing
        .reconciler
        .apply(event)
        .await
        .inspect_err(|e| {
            if e.is_retryable() {
                log::error!("Webhook processing failed, Stripe will redeliver: {}", e);
            } else {
                log::warn!("Webhook rejected: {}", e);
            }
        })?;

    Success::ok(json!({ "received": true }))
}

/// Creates a Stripe checkout session for a subscription plan.
///
/// # Input
/// - `identity`: Authenticated caller, recorded as the session's client reference
/// - `req`: `{ "priceId": "price_..." }`
///
/// # Output
/// - Success: `{ "sessionId": "cs_...", "url": "https://checkout.stripe.com/..." }`
/// - Error: 400 when `priceId` is missing, 500 when Stripe fails
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/secured/stripe/create-checkout-session', {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${session.access_token}`
///   },
///   body: JSON.stringify({ priceId: plan.stripe_price_id })
/// });
/// const { url } = await response.json();
/// window.location.href = url;
/// ```
#[post("/create-checkout-session")]
pub async fn post_create_checkout_session(
    identity: web::ReqData<Identity>,
    req: web::Json<CheckoutSessionRequest>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let link = billing
        .checkout
        .create_subscription_checkout(&identity, &req.price_id)
        .await?;

    Success::ok(CheckoutSessionResponse {
        session_id: link.session_id,
        url: link.url,
    })
}
