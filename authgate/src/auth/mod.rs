//! Authentication and authorization.
//!
//! Clients log in with a username and password and receive a signed session token, which they
//! present as `Authorization: Bearer <token>`. The service keeps exactly one live token per
//! user in the credential store, so a later login, a logout or an account deletion revokes a
//! token before it expires.
//!
//! # Modules
//!
//! - [`token`]: HS256 JWT encoding, signature verification and expiry checks
//! - [`password`]: Argon2id password hashing
//! - [`session`]: login, logout, validation and refresh against the stored token
//! - [`gate`]: permission decisions through a pluggable [`gate::PermissionPolicy`]
//! - [`current_user`]: axum extractors for bearer tokens and authenticated sessions
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use authgate::auth::current_user::CurrentSession;
//!
//! async fn protected_handler(CurrentSession(session): CurrentSession) -> String {
//!     format!("Hello, {}!", session.username)
//! }
//! ```

pub mod current_user;
pub mod gate;
pub mod password;
pub mod session;
pub mod token;
