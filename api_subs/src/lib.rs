use actix_web::web::{self};

pub mod billing;
pub mod provider;

pub mod routes {
    pub mod consulting;
    pub mod stripe;
    pub mod sub;
    pub mod usage;
}

pub mod services {
    pub mod checkout;
    pub mod metering;
    pub mod reconciler;
    pub mod sub;
    pub mod webhook;
}

pub mod dtos {
    pub mod checkout;
    pub mod sub;
    pub mod usage;
}

pub mod models {
    pub mod event;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use billing::{Billing, BillingSettings};

/// Public: Stripe calls this, authenticated by signature.
pub fn mount_webhook() -> actix_web::Scope {
    web::scope("/stripe").service(routes::stripe::post_webhook)
}
pub fn mount_plans() -> actix_web::Scope {
    web::scope("/sub").service(routes::sub::get_plans)
}
pub fn mount_checkout() -> actix_web::Scope {
    web::scope("/stripe").service(routes::stripe::post_create_checkout_session)
}
pub fn mount_consulting() -> actix_web::Scope {
    web::scope("/consulting").service(routes::consulting::post_create_payment)
}
pub fn mount_secure_subs() -> actix_web::Scope {
    web::scope("/sub")
        .service(routes::sub::get_current)
        .service(routes::sub::post_portal)
        .service(routes::sub::post_auto_renew)
        .service(routes::sub::get_payments)
}
pub fn mount_usage() -> actix_web::Scope {
    web::scope("/usage")
        .service(routes::usage::get_usage)
        .service(routes::usage::post_image_usage)
}
