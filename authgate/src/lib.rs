//! # authgate: session-token authentication and permission gating
//!
//! `authgate` is a small HTTP service that other services call to answer one question: may the
//! holder of this token perform this action on this resource? It also owns the user accounts
//! those tokens are issued for.
//!
//! ## Overview
//!
//! A user registers with a username and password, logs in, and receives a signed session token
//! (HS256 JWT). Each user has exactly one live session: the token from the most recent login is
//! stored next to the user record, and any token that is not that one is rejected even if its
//! signature and expiry are fine. Logging in again therefore revokes the previous token.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer. User
//! records live behind the [`db::handlers::CredentialStore`] trait, backed either by an in-process
//! map or by PostgreSQL, and every store call is bounded by a deadline.
//!
//! ### Core Components
//!
//! The **token codec** ([`auth::token`]) signs and verifies session tokens and reports expiry.
//!
//! The **session manager** ([`auth::session`]) handles login, logout, refresh and validation of a
//! presented token against the stored one.
//!
//! The **authorization gate** ([`auth::gate`]) combines session validation with a pluggable
//! [`auth::gate::PermissionPolicy`].
//!
//! The **accounts** service ([`accounts`]) registers, looks up, updates and deletes users.
//!
//! The **API layer** ([`api`]) exposes all of the above under `/v1`, with an OpenAPI reference at
//! `/docs`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use authgate::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = authgate::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     authgate::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    http::{self, HeaderValue},
    routing::{get, post, put},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
pub use types::UserId;

use crate::{
    accounts::{Accounts, UserPatch},
    auth::{
        gate::{AuthorizationGate, policy_from_config},
        session::SessionManager,
        token::TokenCodec,
    },
    config::{CorsOrigin, DatabaseConfig},
    db::handlers::{CredentialStore, MemoryStore, PgStore, TimeoutStore},
    openapi::ApiDoc,
};

/// Shared state handed to every handler.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .sessions(sessions)
///     .gate(gate)
///     .accounts(accounts)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionManager>,
    pub gate: Arc<AuthorizationGate>,
    pub accounts: Arc<Accounts>,
}

impl AppState {
    /// Wire the services over `store`. Fails if the signing key is missing.
    pub fn from_store(config: Config, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let codec = TokenCodec::from_config(&config)?;
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            codec,
            config.auth.session.ttl,
            config.auth.password.argon2,
        ));
        let gate = Arc::new(AuthorizationGate::new(sessions.clone(), policy_from_config(&config.auth.policy)));
        let accounts = Arc::new(Accounts::new(
            store,
            config.auth.password.clone(),
            config.auth.default_roles.clone(),
        ));

        Ok(Self::builder()
            .config(config)
            .sessions(sessions)
            .gate(gate)
            .accounts(accounts)
            .build())
    }
}

/// Get the authgate database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user, or reset its password if it already exists.
///
/// An existing account of that name without the `admin` role is an error.
/// Does nothing unless both `admin_username` and `admin_password` are configured.
#[instrument(skip_all)]
pub async fn seed_admin(config: &Config, accounts: &Accounts) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (config.admin_username.as_deref(), config.admin_password.as_deref()) else {
        return Ok(());
    };

    match accounts.create_with_roles(username, password, vec!["admin".to_string()]).await {
        Ok(user) => {
            info!(user_id = %types::abbrev_uuid(&user.id), "Created initial admin user");
            Ok(())
        }
        Err(errors::Error::Conflict { .. }) => {
            // Never hand the admin password to an account that is not already an admin
            let existing = accounts.get_by_username(username).await?;
            if !existing.roles.iter().any(|role| role == "admin") {
                anyhow::bail!("Initial admin user {username} already exists without the admin role");
            }

            accounts
                .update(
                    username,
                    UserPatch {
                        password: Some(password.to_string()),
                    },
                )
                .await?;
            debug!("Initial admin user exists, password reset");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Failed to create initial admin user: {e}")),
    }
}

/// Build the credential store for `config.database`, wrapped in its per-call deadline.
///
/// For PostgreSQL this connects and migrates; the caller should treat an error as fatal.
async fn setup_store(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    let timeout = config.database.timeout();

    let store: Arc<dyn CredentialStore> = match &config.database {
        DatabaseConfig::Memory { .. } => {
            info!("Using in-memory credential store; users are lost on restart");
            Arc::new(TimeoutStore::new(MemoryStore::new(), timeout))
        }
        DatabaseConfig::External { url, pool, .. } => {
            info!("Using external database");
            let pool = db::connect(url, pool).await?;
            Arc::new(TimeoutStore::new(PgStore::new(pool), timeout))
        }
    };

    store
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Credential store is unreachable: {e}"))?;

    Ok(store)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;

    // `AllowOrigin::list` rejects `*`
    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PUT, http::Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/v1/auth/*` and `/v1/users/*`: the session and user API
/// - `/healthz`: store liveness
/// - `/docs`: OpenAPI reference
///
/// Every request is traced and bounded by `request_timeout`.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/logout", post(api::handlers::auth::logout))
        .route("/auth/authorize", post(api::handlers::auth::authorize))
        .route("/auth/refresh", post(api::handlers::auth::refresh))
        .route("/users/create", post(api::handlers::users::create_user))
        .route("/users/registry", post(api::handlers::users::create_user))
        .route("/users/{id}", get(api::handlers::users::get_user))
        .route(
            "/users",
            put(api::handlers::users::update_user).delete(api::handlers::users::delete_user),
        )
        .with_state(state.clone());

    let cors_layer = create_cors_layer(&state.config)?;
    let request_timeout = state.config.request_timeout;

    let router = Router::new()
        .route("/healthz", get(api::handlers::health::healthz))
        .with_state(state)
        .nest("/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors_layer)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// The assembled service.
///
/// 1. **Create**: [`Application::new`] connects the store, migrates, and seeds the admin user
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until shutdown
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(host = %config.host, port = config.port, "Starting authgate");

        let store = setup_store(&config).await?;
        Self::with_store(config, store).await
    }

    /// Assemble the application over an existing store.
    pub async fn with_store(config: Config, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let state = AppState::from_store(config.clone(), store)?;
        seed_admin(&config, &state.accounts).await?;

        let router = build_router(state)?;
        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("authgate listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
