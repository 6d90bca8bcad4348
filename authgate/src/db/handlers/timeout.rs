//! Deadline decorator for credential stores.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::CredentialStore,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::UserId;
use std::future::Future;
use std::time::Duration;

/// Wraps a store so that every call gives up after `timeout` with [`DbError::Timeout`].
#[derive(Debug)]
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.timeout, "credential store call timed out");
                Err(DbError::Timeout {
                    operation: operation.to_string(),
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: CredentialStore> CredentialStore for TimeoutStore<S> {
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        self.bounded("create", self.inner.create(request)).await
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        self.bounded("get_by_id", self.inner.get_by_id(id)).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        self.bounded("get_by_username", self.inner.get_by_username(username)).await
    }

    async fn update(&self, username: &str, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        self.bounded("update", self.inner.update(username, request)).await
    }

    async fn set_session_token(&self, username: &str, token: &str) -> Result<bool> {
        self.bounded("set_session_token", self.inner.set_session_token(username, token))
            .await
    }

    async fn replace_session_token(&self, username: &str, current: &str, new: &str) -> Result<bool> {
        self.bounded(
            "replace_session_token",
            self.inner.replace_session_token(username, current, new),
        )
        .await
    }

    async fn clear_session_token(&self, username: &str, expected: &str) -> Result<bool> {
        self.bounded("clear_session_token", self.inner.clear_session_token(username, expected))
            .await
    }

    async fn delete_with_token(&self, username: &str, expected: &str) -> Result<bool> {
        self.bounded("delete_with_token", self.inner.delete_with_token(username, expected))
            .await
    }

    async fn ping(&self) -> Result<()> {
        self.bounded("ping", self.inner.ping()).await
    }
}
