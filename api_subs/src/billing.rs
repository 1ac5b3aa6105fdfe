use std::sync::Arc;

use common::env_config::Config;
use db::Repos;

use crate::{
    provider::PaymentProvider,
    services::{
        checkout::CheckoutService, metering::UsageMeter, reconciler::Reconciler,
        sub::SubscriptionService, webhook::WebhookIngress,
    },
};

pub struct BillingSettings {
    pub site_url: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: i64,
}

impl From<&Config> for BillingSettings {
    fn from(config: &Config) -> Self {
        Self {
            site_url: config.site_url.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            webhook_tolerance_secs: config.webhook_tolerance_secs,
        }
    }
}

/// Every billing component, built once at startup from the shared store and
/// provider and handed to handlers as `web::Data<Billing>`.
#[derive(Clone)]
pub struct Billing {
    pub ingress: WebhookIngress,
    pub reconciler: Reconciler,
    pub meter: UsageMeter,
    pub checkout: CheckoutService,
    pub subscriptions: SubscriptionService,
}

impl Billing {
    pub fn new(repos: &Repos, provider: Arc<dyn PaymentProvider>, settings: BillingSettings) -> Self {
        Self {
            ingress: WebhookIngress::new(settings.webhook_secret, settings.webhook_tolerance_secs),
            reconciler: Reconciler::new(
                repos.plans.clone(),
                repos.subscriptions.clone(),
                repos.payments.clone(),
                provider.clone(),
            ),
            meter: UsageMeter::new(
                repos.usage.clone(),
                repos.plans.clone(),
                repos.subscriptions.clone(),
            ),
            checkout: CheckoutService::new(provider.clone(), settings.site_url.clone()),
            subscriptions: SubscriptionService::new(
                repos.plans.clone(),
                repos.subscriptions.clone(),
                repos.payments.clone(),
                provider,
                settings.site_url,
            ),
        }
    }
}
