//! API request and response data models.
//!
//! These are the public wire types, kept apart from the store records in [`crate::db::models`]
//! so that password hashes and session tokens can never be serialized by accident.
//!
//! - [`auth`]: login, logout, authorize and refresh
//! - [`users`]: registration, lookup and update

pub mod auth;
pub mod users;
