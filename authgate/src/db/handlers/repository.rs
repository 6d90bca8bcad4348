//! The credential store trait.
//!
//! Every session-token write goes through this trait and is atomic per user record: a login
//! overwrites the single stored token, while logout, refresh and account deletion only succeed
//! against the token the caller presents (compare-and-set).

use crate::db::errors::Result;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest};
use crate::types::UserId;

#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create a new user. Fails with `UniqueViolation` if the username is taken.
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Get a user by ID
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Get a user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    /// Apply the non-`None` fields of `request`. Fails with `NotFound` for unknown users.
    async fn update(&self, username: &str, request: &UserUpdateDBRequest) -> Result<UserDBResponse>;

    /// Unconditionally replace the stored session token. Returns `false` if the user is gone.
    async fn set_session_token(&self, username: &str, token: &str) -> Result<bool>;

    /// Swap `current` for `new` only while `current` is still the stored token.
    async fn replace_session_token(&self, username: &str, current: &str, new: &str) -> Result<bool>;

    /// Clear the stored token only if it equals `expected`.
    async fn clear_session_token(&self, username: &str, expected: &str) -> Result<bool>;

    /// Delete the user only if `expected` is its stored token.
    ///
    /// `Err(NotFound)` when no such user exists, `Ok(false)` when the token does not match.
    async fn delete_with_token(&self, username: &str, expected: &str) -> Result<bool>;

    /// Cheap liveness check used at startup and by `/healthz`.
    async fn ping(&self) -> Result<()>;
}
