use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};
use std::{str::FromStr, sync::Arc, time::Duration};

pub mod favorite;
pub mod payment;
pub mod pg;
pub mod plan;
pub mod recipe;
pub mod repo;
pub mod subscription;
pub mod usage;
pub mod user;

#[cfg(feature = "memory")]
pub mod memory;

pub mod models {
    pub mod payment;
    pub mod plan;
    pub mod recipe;
    pub mod subscription;
    pub mod usage;
    pub mod user;
}

pub mod dtos {
    pub mod payment;
    pub mod recipe;
    pub mod subscription;
    pub mod usage;
    pub mod user;
}

pub use pg::PgStore;
pub use repo::Repos;

pub struct PoolSettings {
    pub max_connections: u32,
    pub require_ssl: bool,
}

/// Creates the database if it does not exist yet, connects, and applies
/// pending migrations.
pub async fn setup(
    database_url: &str,
    settings: PoolSettings,
) -> Result<Arc<PgPool>, Box<dyn std::error::Error>> {
    let url = url::Url::parse(database_url)?;
    let db_name = url.path().trim_start_matches('/');
    let username = url.username();
    let password = url.password().unwrap_or("");
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(5432);

    let admin_url = format!(
        "postgresql://{}:{}@{}:{}/postgres",
        username, password, host, port
    );

    let mut admin_options = PgConnectOptions::from_str(&admin_url)?;
    if settings.require_ssl {
        admin_options = admin_options.ssl_mode(PgSslMode::Require);
    }

    let admin_pool = PgPool::connect_with(admin_options).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&admin_pool)
            .await?;

    if !exists {
        log::info!("Creating database {}", db_name);
        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name))
            .execute(&admin_pool)
            .await?;
    }

    admin_pool.close().await;

    let mut options = PgConnectOptions::from_str(database_url)?;
    if settings.require_ssl {
        options = options.ssl_mode(PgSslMode::Require);
    }
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(Arc::new(pool))
}
