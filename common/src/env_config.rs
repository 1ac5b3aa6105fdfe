use std::{env, sync::Arc};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// Holds the database connection details, server binding, CORS and logging
/// preferences, and the opaque secrets of the external collaborators
/// (payment provider, identity provider).
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// Upper bound on pooled database connections.
    pub db_max_connections: u32,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Public base URL of the web app, used to build redirect targets.
    pub site_url: String,
    // identity provider (Supabase Auth)
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook secret, webhooks are rejected while it is empty
    pub stripe_webhook_secret: String,
    /// Accepted age of a webhook signature timestamp, in seconds.
    pub webhook_tolerance_secs: i64,
    /// Bound on every store/provider round-trip, in seconds.
    pub upstream_timeout_secs: u64,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `DATABASE_URL`: Connection string for the database
    /// - `SUPABASE_URL`, `SUPABASE_ANON_KEY`: identity provider endpoint and key
    ///
    /// Optional (with defaults):
    /// - `ENVIRONMENT`: (default: "development")
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `SITE_URL`: (default: "http://localhost:3000")
    /// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`: (default: empty)
    /// - `WEBHOOK_TOLERANCE_SECS` (default: 300), `UPSTREAM_TIMEOUT_SECS` (default: 10)
    /// - `DB_MAX_CONNECTIONS` (default: 10)
    ///
    /// Returns the name of the first missing required variable as the error.
    pub fn from_env() -> Result<Arc<Self>, String> {
        dotenvy::dotenv().ok();

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();

        Ok(Arc::new(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_or("PORT", 8080),
            num_workers: parse_or("WORKERS", 4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            stripe_secret_key,
            stripe_webhook_secret,
            webhook_tolerance_secs: parse_or("WEBHOOK_TOLERANCE_SECS", 300),
            upstream_timeout_secs: parse_or("UPSTREAM_TIMEOUT_SECS", 10),
        }))
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn required(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("{} must be set", name))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
