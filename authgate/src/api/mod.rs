//! API layer for HTTP request handling and data models.
//!
//! - **[`extract`]**: JSON body extractor mapping rejections to [`crate::errors::Error`]
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/v1/auth/*`): login, logout, authorize, refresh
//! - **Users** (`/v1/users/*`): registration, lookup, self-update, self-delete
//! - **Health** (`/healthz`)
//!
//! All `/v1` endpoints are documented with `utoipa`; the rendered reference is served at `/docs`.

pub mod extract;
pub mod handlers;
pub mod models;
