//! Account Service
//!
//! HTTP service for user accounts:
//! - Registration with validation and unique emails
//! - Self-service profile and password updates behind a Bearer JWT
//! - In-memory or PostgreSQL user store

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use api::state::{AccountServiceTrait, AppState};
use config::StorageBackend;
use domain::DomainError;
use infrastructure::{
    auth::{JwtConfig, JwtService},
    user::{AccountService, Argon2Hasher, InMemoryUserRepository, PostgresUserRepository},
};

/// Create the application state with all services initialized
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let hasher = Arc::new(Argon2Hasher::new());

    let account_service: Arc<dyn AccountServiceTrait> = match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory user store");
            Arc::new(AccountService::new(
                Arc::new(InMemoryUserRepository::new()),
                hasher,
            ))
        }
        StorageBackend::Postgres => {
            let url = config.storage.database_url.as_deref().ok_or_else(|| {
                DomainError::configuration("storage.database_url is required for postgres")
            })?;

            let pool = PgPoolOptions::new()
                .max_connections(config.storage.max_connections)
                .connect(url)
                .await?;

            info!(
                max_connections = config.storage.max_connections,
                "Connected to PostgreSQL user store"
            );

            Arc::new(AccountService::new(
                Arc::new(PostgresUserRepository::new(pool)),
                hasher,
            ))
        }
    };

    if config.auth.uses_default_secret() {
        warn!("auth.jwt_secret is the built-in default; set APP__AUTH__JWT_SECRET");
    }

    let jwt_service = Arc::new(JwtService::new(JwtConfig::new(
        config.auth.jwt_secret.clone(),
        config.auth.token_expiration_hours,
    ))?);

    Ok(AppState::new(account_service, jwt_service))
}
