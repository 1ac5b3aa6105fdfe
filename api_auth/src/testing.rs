use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{
    error::{AppError, Res},
    identity::Identity,
};
use uuid::Uuid;

use crate::services::auth_client::IdentityVerifier;

/// Accepts exactly one token and counts how often it was asked.
pub struct StaticVerifier {
    token: String,
    identity: Identity,
    calls: AtomicUsize,
    unreachable: AtomicBool,
}

impl StaticVerifier {
    pub fn new(token: &str) -> Self {
        StaticVerifier {
            token: token.to_string(),
            identity: Identity {
                user_id: Uuid::new_v4(),
                email: Some("cook@recipes.test".to_string()),
            },
            calls: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Res<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::Timeout("identity provider".to_string()));
        }
        if token == self.token {
            Ok(self.identity.clone())
        } else {
            Err(AppError::Unauthorized("Invalid token".to_string()))
        }
    }
}
