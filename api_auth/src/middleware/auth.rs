use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpMessage, HttpResponse, ResponseError,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::error::AppError;
use futures::future::{Ready, ok};

use crate::services::auth_client::IdentityVerifier;

/// Requires a bearer token on every request of the wrapped scope and puts the
/// verified [`common::identity::Identity`] into the request extensions.
pub struct AuthMiddleware {
    verifier: Arc<dyn IdentityVerifier>,
}

impl AuthMiddleware {
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        AuthMiddleware { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    verifier: Arc<dyn IdentityVerifier>,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = bearer_token(&req);
        let verifier = self.verifier.clone();
        let srv = Rc::clone(&self.service);

        Box::pin(async move {
            let Some(token) = token else {
                // no token passed - 401
                let response = HttpResponse::Unauthorized()
                    .json(serde_json::json!({"error": "No authorization token provided"}));
                return Ok(req.into_response(response));
            };

            match verifier.verify(&token).await {
                Ok(identity) => {
                    req.extensions_mut().insert(identity);
                    srv.call(req).await.map(|res| res.map_into_boxed_body())
                }
                Err(AppError::Unauthorized(_)) => {
                    let response = HttpResponse::Unauthorized()
                        .json(serde_json::json!({"error": "Invalid token"}));
                    Ok(req.into_response(response))
                }
                // provider unreachable: not the caller's fault
                Err(e) => Ok(req.into_response(e.error_response())),
            }
        })
    }
}
