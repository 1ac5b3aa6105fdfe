use std::time::Duration;

use async_trait::async_trait;
use common::{
    error::{AppError, Res},
    identity::Identity,
    upstream::bounded,
};
use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

/// Resolves a bearer token to the identity it was issued for.
///
/// Returns `AppError::Unauthorized` when the provider rejects the token; any
/// other error means the provider could not be asked.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Res<Identity>;
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: Uuid,
    email: Option<String>,
}

/// Validates tokens against Supabase Auth (`GET /auth/v1/user`).
pub struct SupabaseAuthClient {
    client: Client,
    auth_url: String,
    anon_key: String,
    timeout: Duration,
}

impl SupabaseAuthClient {
    pub fn new(supabase_url: &str, anon_key: String, timeout: Duration) -> Self {
        SupabaseAuthClient {
            client: Client::new(),
            auth_url: format!("{}/auth/v1/user", supabase_url.trim_end_matches('/')),
            anon_key,
            timeout,
        }
    }
}

#[async_trait]
impl IdentityVerifier for SupabaseAuthClient {
    async fn verify(&self, token: &str) -> Res<Identity> {
        let request = self
            .client
            .get(&self.auth_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send();
        let response = bounded(self.timeout, "identity provider", request).await?;

        match response.status() {
            StatusCode::OK => {
                let user = response.json::<SupabaseUser>().await?;
                info!("Token validated for user_id: {}", user.id);
                Ok(Identity {
                    user_id: user.id,
                    email: user.email,
                })
            }
            status if status.is_client_error() => {
                warn!("Token rejected by identity provider: {}", status);
                Err(AppError::Unauthorized("Invalid token".to_string()))
            }
            status => Err(AppError::Internal(format!(
                "Identity provider answered {}",
                status
            ))),
        }
    }
}
