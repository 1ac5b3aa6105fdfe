use std::{collections::HashMap, sync::Arc};

use common::{
    error::{AppError, Res},
    identity::Identity,
};

use crate::{
    dtos::checkout::ConsultingPaymentRequest,
    provider::{CheckoutLink, CheckoutRequest, PaymentLinkRequest, PaymentProvider},
};

pub fn consulting_product_name(description: &str) -> &'static str {
    if description.contains("Individual") {
        "Individual Recipe Consulting"
    } else {
        "Group Recipe Consulting"
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Res<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", field)))
}

/// Turns purchase intents into provider redirect URLs. Validation happens
/// before the provider is contacted.
#[derive(Clone)]
pub struct CheckoutService {
    provider: Arc<dyn PaymentProvider>,
    site_url: String,
}

impl CheckoutService {
    pub fn new(provider: Arc<dyn PaymentProvider>, site_url: impl Into<String>) -> Self {
        Self {
            provider,
            site_url: site_url.into(),
        }
    }

    pub async fn create_subscription_checkout(
        &self,
        identity: &Identity,
        price_id: &Option<String>,
    ) -> Res<CheckoutLink> {
        let price_id = required(price_id, "priceId")?;

        let link = self
            .provider
            .create_checkout_session(CheckoutRequest {
                user_id: identity.user_id,
                price_id: price_id.to_string(),
                success_url: format!("{}/dashboard?success=true", self.site_url),
                cancel_url: format!("{}/pricing?canceled=true", self.site_url),
            })
            .await?;

        log::info!(
            "Checkout session {} created for user {}",
            link.session_id,
            identity.user_id
        );
        Ok(link)
    }

    /// The link is bound to the caller: a `userId` naming anyone else is
    /// refused before the provider is contacted.
    pub async fn create_consulting_payment(
        &self,
        identity: &Identity,
        req: &ConsultingPaymentRequest,
    ) -> Res<String> {
        let option_id = required(&req.option_id, "optionId")?;
        let user_id = required(&req.user_id, "userId")?;
        let description = required(&req.description, "description")?;
        let amount = req
            .amount
            .filter(|amount| *amount > 0)
            .ok_or_else(|| AppError::BadRequest("amount is required".to_string()))?;
        if user_id != identity.user_id.to_string() {
            return Err(AppError::Forbidden(
                "userId does not match the authenticated user".to_string(),
            ));
        }

        let metadata = HashMap::from([
            ("userId".to_string(), identity.user_id.to_string()),
            ("optionId".to_string(), option_id.to_string()),
            ("type".to_string(), "consulting".to_string()),
        ]);

        let url = self
            .provider
            .create_payment_link(PaymentLinkRequest {
                product_name: consulting_product_name(description).to_string(),
                description: description.to_string(),
                amount,
                metadata,
            })
            .await?;

        log::info!(
            "Consulting payment link for option {} created by {}",
            option_id,
            identity.user_id
        );
        Ok(url)
    }
}
