//! Fakes and helpers for exercising billing code without Stripe.

use std::{
    collections::HashMap,
    future::{Ready, ready},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{
    error::{AppError, Res},
    identity::Identity,
};
use db::Repos;
use uuid::Uuid;

use crate::{
    billing::{Billing, BillingSettings},
    provider::{
        CheckoutLink, CheckoutRequest, PaymentLinkRequest, PaymentProvider, ProviderSubscription,
    },
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// Billing wired to the given repositories and provider, signing secret
/// [`TEST_WEBHOOK_SECRET`].
pub fn billing(repos: &Repos, provider: Arc<dyn PaymentProvider>) -> Billing {
    Billing::new(
        repos,
        provider,
        BillingSettings {
            site_url: "https://recipes.test".to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            webhook_tolerance_secs: 300,
        },
    )
}

pub fn identity() -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        email: Some("cook@example.com".to_string()),
    }
}

/// Middleware that authenticates every request as `identity`.
pub fn with_identity(identity: Identity) -> WithIdentity {
    WithIdentity(identity)
}

pub struct WithIdentity(Identity);

impl<S, B> Transform<S, ServiceRequest> for WithIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = WithIdentityService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WithIdentityService {
            service,
            identity: self.0.clone(),
        }))
    }
}

pub struct WithIdentityService<S> {
    service: S,
    identity: Identity,
}

impl<S, B> Service<ServiceRequest> for WithIdentityService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = S::Future;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        req.extensions_mut().insert(self.identity.clone());
        self.service.call(req)
    }
}

#[derive(Default)]
pub struct FakeProvider {
    calls: AtomicUsize,
    failing: AtomicBool,
    subscriptions: Mutex<HashMap<String, ProviderSubscription>>,
    checkouts: Mutex<Vec<CheckoutRequest>>,
    payment_links: Mutex<Vec<PaymentLinkRequest>>,
    portal_customers: Mutex<Vec<String>>,
    cancel_updates: Mutex<Vec<(String, bool)>>,
}

impl FakeProvider {
    /// Total number of provider calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// While set, every call fails like an unreachable provider.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_subscription(&self, id: &str, customer_id: &str, price_id: &str, status: &str) {
        let now = Utc::now();
        let Ok(mut subscriptions) = self.subscriptions.lock() else {
            return;
        };
        subscriptions.insert(
            id.to_string(),
            ProviderSubscription {
                id: id.to_string(),
                customer_id: customer_id.to_string(),
                price_id: Some(price_id.to_string()),
                status: status.to_string(),
                current_period_start: Some(now),
                current_period_end: Some(now + Duration::days(30)),
                cancel_at_period_end: false,
            },
        );
    }

    pub fn last_checkout(&self) -> Option<CheckoutRequest> {
        self.checkouts.lock().ok()?.last().cloned()
    }

    pub fn last_payment_link(&self) -> Option<PaymentLinkRequest> {
        self.payment_links.lock().ok()?.last().cloned()
    }

    pub fn portal_customers(&self) -> Vec<String> {
        self.portal_customers.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn cancel_updates(&self) -> Vec<(String, bool)> {
        self.cancel_updates.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn call(&self) -> Res<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("payment provider unavailable".to_string()));
        }
        Ok(())
    }
}

fn record<T>(log: &Mutex<Vec<T>>, item: T) {
    if let Ok(mut log) = log.lock() {
        log.push(item);
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_checkout_session(&self, req: CheckoutRequest) -> Res<CheckoutLink> {
        self.call()?;
        let n = self.calls();
        record(&self.checkouts, req);
        Ok(CheckoutLink {
            session_id: format!("cs_test_{}", n),
            url: Some(format!("https://checkout.stripe.test/c/cs_test_{}", n)),
        })
    }

    async fn create_payment_link(&self, req: PaymentLinkRequest) -> Res<String> {
        self.call()?;
        record(&self.payment_links, req);
        Ok(format!("https://buy.stripe.test/plink_{}", self.calls()))
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Res<String> {
        self.call()?;
        record(&self.portal_customers, customer_id.to_string());
        Ok(format!("https://billing.stripe.test/p/{}?return={}", customer_id, return_url))
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Res<ProviderSubscription> {
        self.call()?;
        self.subscriptions
            .lock()
            .ok()
            .and_then(|subs| subs.get(subscription_id).cloned())
            .ok_or_else(|| AppError::Internal(format!("No such subscription: {}", subscription_id)))
    }

    async fn set_cancel_at_period_end(&self, subscription_id: &str, cancel: bool) -> Res<()> {
        self.call()?;
        record(&self.cancel_updates, (subscription_id.to_string(), cancel));
        Ok(())
    }
}
