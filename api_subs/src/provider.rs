//! Payment provider seam. Services talk to [`PaymentProvider`]; production
//! wires [`StripeGateway`], tests a fake.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::{
    error::{AppError, Res},
    upstream::bounded,
};
use stripe::{
    BillingPortalSession, CheckoutSession, CheckoutSessionMode, Client, CreateBillingPortalSession,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionPaymentMethodTypes,
    CreatePaymentLink, CreatePaymentLinkLineItems, CreatePrice, CreateProduct, Currency, CustomerId,
    IdOrCreate, PaymentLink, Price, Product, Subscription, SubscriptionId, UpdateSubscription,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLink {
    pub session_id: String,
    pub url: Option<String>,
}

/// One-off purchase: a fresh product and price, sold through a payment link.
#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub product_name: String,
    pub description: String,
    pub amount: i64,
    pub metadata: HashMap<String, String>,
}

/// The parts of a provider subscription the reconciler records.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_id: String,
    pub price_id: Option<String>,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, req: CheckoutRequest) -> Res<CheckoutLink>;
    /// Returns the payment link URL.
    async fn create_payment_link(&self, req: PaymentLinkRequest) -> Res<String>;
    /// Returns the billing portal URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Res<String>;
    async fn retrieve_subscription(&self, subscription_id: &str) -> Res<ProviderSubscription>;
    async fn set_cancel_at_period_end(&self, subscription_id: &str, cancel: bool) -> Res<()>;
}

pub struct StripeGateway {
    client: Client,
    timeout: Duration,
}

impl StripeGateway {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

fn parse_subscription_id(id: &str) -> Res<SubscriptionId> {
    id.parse::<SubscriptionId>()
        .map_err(|e| AppError::BadRequest(format!("Invalid subscription ID: {}", e)))
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[async_trait]
impl PaymentProvider for StripeGateway {
    async fn create_checkout_session(&self, req: CheckoutRequest) -> Res<CheckoutLink> {
        let user_id = req.user_id.to_string();
        let metadata = HashMap::from([
            ("userId".to_string(), user_id.clone()),
            ("priceId".to_string(), req.price_id.clone()),
        ]);
        let params = CreateCheckoutSession {
            payment_method_types: Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]),
            line_items: Some(vec![CreateCheckoutSessionLineItems {
                price: Some(req.price_id.clone()),
                quantity: Some(1),
                ..Default::default()
            }]),
            mode: Some(CheckoutSessionMode::Subscription),
            success_url: Some(req.success_url.as_str()),
            cancel_url: Some(req.cancel_url.as_str()),
            client_reference_id: Some(user_id.as_str()),
            metadata: Some(metadata),
            ..Default::default()
        };
        let session = bounded(
            self.timeout,
            "stripe checkout session",
            CheckoutSession::create(&self.client, params),
        )
        .await?;

        Ok(CheckoutLink {
            session_id: session.id.to_string(),
            url: session.url,
        })
    }

    async fn create_payment_link(&self, req: PaymentLinkRequest) -> Res<String> {
        let mut product_params = CreateProduct::new(&req.product_name);
        product_params.description = Some(&req.description);
        let product = bounded(
            self.timeout,
            "stripe product",
            Product::create(&self.client, product_params),
        )
        .await?;

        let mut price_params = CreatePrice::new(Currency::USD);
        price_params.product = Some(IdOrCreate::Id(product.id.as_str()));
        price_params.unit_amount = Some(req.amount);
        let price = bounded(
            self.timeout,
            "stripe price",
            Price::create(&self.client, price_params),
        )
        .await?;

        let mut link_params = CreatePaymentLink::new(vec![CreatePaymentLinkLineItems {
            adjustable_quantity: None,
            price: price.id.to_string(),
            quantity: 1,
        }]);
        link_params.metadata = Some(req.metadata);
        let link = bounded(
            self.timeout,
            "stripe payment link",
            PaymentLink::create(&self.client, link_params),
        )
        .await?;

        Ok(link.url)
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Res<String> {
        let customer_id = customer_id
            .parse::<CustomerId>()
            .map_err(|e| AppError::Internal(format!("Invalid customer ID: {}", e)))?;
        let mut params = CreateBillingPortalSession::new(customer_id);
        params.return_url = Some(return_url);
        let session = bounded(
            self.timeout,
            "stripe billing portal",
            BillingPortalSession::create(&self.client, params),
        )
        .await?;

        Ok(session.url)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Res<ProviderSubscription> {
        let sub_id = parse_subscription_id(subscription_id)?;
        let sub = bounded(
            self.timeout,
            "stripe subscription",
            Subscription::retrieve(&self.client, &sub_id, &[]),
        )
        .await?;

        Ok(ProviderSubscription {
            id: sub.id.to_string(),
            customer_id: sub.customer.id().to_string(),
            price_id: sub
                .items
                .data
                .first()
                .and_then(|item| item.price.as_ref())
                .map(|price| price.id.to_string()),
            status: sub.status.to_string(),
            current_period_start: timestamp(sub.current_period_start),
            current_period_end: timestamp(sub.current_period_end),
            cancel_at_period_end: sub.cancel_at_period_end,
        })
    }

    async fn set_cancel_at_period_end(&self, subscription_id: &str, cancel: bool) -> Res<()> {
        let sub_id = parse_subscription_id(subscription_id)?;
        let params = UpdateSubscription {
            cancel_at_period_end: Some(cancel),
            ..Default::default()
        };
        bounded(
            self.timeout,
            "stripe subscription update",
            Subscription::update(&self.client, &sub_id, params),
        )
        .await?;
        Ok(())
    }
}
