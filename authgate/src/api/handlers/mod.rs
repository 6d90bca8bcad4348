//! HTTP request handlers.
//!
//! - [`auth`]: login, logout, authorize and refresh under `/v1/auth`
//! - [`users`]: registration, lookup, self-update and self-delete under `/v1/users`
//! - [`health`]: liveness endpoint

pub mod auth;
pub mod health;
pub mod users;
