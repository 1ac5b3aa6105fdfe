mod cors;

use std::{io, sync::Arc, time::Duration};

use actix_web::{
    App, HttpServer,
    web::{self},
};
use api_auth::SupabaseAuthClient;
use api_subs::{Billing, BillingSettings, provider::StripeGateway};
use common::env_config::Config;
use db::{PgStore, PoolSettings};
use log::{info, warn};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // get env vars
    let config = Config::from_env().map_err(io::Error::other)?;
    let origin = config.cors_allowed_origin.clone();

    // init logger
    logger::setup().map_err(io::Error::other)?;

    // init db connection
    let pool = db::setup(
        &config.database_url,
        PoolSettings {
            max_connections: config.db_max_connections,
            require_ssl: config.is_production(),
        },
    )
    .await
    .map_err(|e| io::Error::other(e.to_string()))?;
    let repos = PgStore::new(pool).into_repos();

    // payment and identity providers
    let upstream_timeout = Duration::from_secs(config.upstream_timeout_secs);
    if config.stripe_webhook_secret.is_empty() {
        warn!("STRIPE_WEBHOOK_SECRET is not set, webhook deliveries will be rejected");
    }
    let gateway = StripeGateway::new(
        common::stripe::create_client(&config.stripe_secret_key),
        upstream_timeout,
    );
    let billing = Billing::new(
        &repos,
        Arc::new(gateway),
        BillingSettings::from(config.as_ref()),
    );
    let verifier = Arc::new(SupabaseAuthClient::new(
        &config.supabase_url,
        config.supabase_anon_key.clone(),
        upstream_timeout,
    ));

    info!(
        "Starting server on {}:{} ({})",
        config.server_host, config.server_port, config.environment
    );

    let config_data = config.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config_data.clone()))
            .app_data(web::Data::new(repos.clone()))
            .app_data(web::Data::new(billing.clone()))
            .wrap(logger::middleware(config_data.console_logging_enabled)) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    .service(api_subs::mount_webhook())
                    .service(api_subs::mount_plans())
                    .service(api_recipes::mount_catalog())
                    .service(
                        web::scope("/secured")
                            .wrap(api_auth::auth_middleware(verifier.clone()))
                            .service(api_auth::mount_user())
                            .service(api_subs::mount_checkout())
                            .service(api_subs::mount_consulting())
                            .service(api_subs::mount_secure_subs())
                            .service(api_subs::mount_usage())
                            .service(api_recipes::mount_secure_recipes())
                            .service(api_recipes::mount_favorites()),
                    ),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
