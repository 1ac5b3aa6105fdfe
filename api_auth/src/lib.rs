use std::sync::Arc;

use actix_web::web;
use middleware::auth::AuthMiddleware;
use services::auth_client::IdentityVerifier;

pub mod middleware {
    pub mod auth;
}

pub mod routes {
    pub mod user;
}

pub mod services {
    pub mod auth_client;
    pub mod user;
}

pub mod dtos {
    pub mod user;
}

#[cfg(test)]
mod testing;

pub use services::auth_client::SupabaseAuthClient;

// Auth middleware
pub fn auth_middleware(verifier: Arc<dyn IdentityVerifier>) -> AuthMiddleware {
    AuthMiddleware::new(verifier)
}

pub fn mount_user() -> actix_web::Scope {
    web::scope("/me")
        .service(routes::user::get_me)
        .service(routes::user::put_me)
}
