//! Credential storage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ SessionManager / │  (auth::session, accounts)
//! │ Accounts         │
//! └────────┬─────────┘
//!          │  Arc<dyn CredentialStore>
//!          ↓
//! ┌──────────────────┐
//! │  TimeoutStore    │  (per-call deadline)
//! └────────┬─────────┘
//!          │
//!     ┌────┴─────┐
//!     ↓          ↓
//! MemoryStore  PgStore
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: the [`handlers::CredentialStore`] trait and its implementations
//! - [`models`]: user records as stored
//! - [`errors`]: store-specific error types
//!
//! # Migrations
//!
//! The PostgreSQL schema lives in `migrations/` and is applied by [`connect`] through
//! [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use crate::config::PoolSettings;

/// Open a pool against `url` and bring the schema up to date.
pub async fn connect(url: &str, settings: &PoolSettings) -> anyhow::Result<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));

    // 0 disables the limit
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }

    let pool = options.connect(url).await?;
    crate::migrator().run(&pool).await?;
    info!(max_connections = settings.max_connections, "Connected to credential database");

    Ok(pool)
}
