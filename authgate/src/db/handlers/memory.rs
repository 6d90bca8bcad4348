//! In-process credential store.
//!
//! Records live in a [`DashMap`] keyed by username. Every token write happens while holding the
//! shard lock for that username, so the compare-and-set operations are atomic per user.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::CredentialStore,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::UserId;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, UserDBResponse>,
    ids: DashMap<UserId, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the stored record under its lock. `None` if the user does not exist.
    fn with_user<T>(&self, username: &str, f: impl FnOnce(&mut UserDBResponse) -> T) -> Option<T> {
        self.users.get_mut(username).map(|mut user| f(&mut user))
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryStore {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        match self.users.entry(request.username.clone()) {
            Entry::Occupied(_) => Err(DbError::UniqueViolation {
                constraint: Some("users_username_key".to_string()),
                table: Some("users".to_string()),
                message: format!("username {} already exists", request.username),
            }),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = UserDBResponse {
                    id: Uuid::new_v4(),
                    username: request.username.clone(),
                    password_hash: request.password_hash.clone(),
                    session_token: None,
                    roles: request.roles.clone(),
                    created_at: now,
                    updated_at: now,
                };
                self.ids.insert(user.id, user.username.clone());
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let Some(username) = self.ids.get(&id).map(|name| name.clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&username).map(|user| user.clone()))
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get(username).map(|user| user.clone()))
    }

    #[instrument(skip(self, request), err)]
    async fn update(&self, username: &str, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        self.with_user(username, |user| {
            if let Some(hash) = &request.password_hash {
                user.password_hash = hash.clone();
            }
            user.updated_at = Utc::now();
            user.clone()
        })
        .ok_or(DbError::NotFound)
    }

    async fn set_session_token(&self, username: &str, token: &str) -> Result<bool> {
        Ok(self
            .with_user(username, |user| {
                user.session_token = Some(token.to_string());
                user.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn replace_session_token(&self, username: &str, current: &str, new: &str) -> Result<bool> {
        Ok(self
            .with_user(username, |user| {
                if user.session_token.as_deref() != Some(current) {
                    return false;
                }
                user.session_token = Some(new.to_string());
                user.updated_at = Utc::now();
                true
            })
            .unwrap_or(false))
    }

    async fn clear_session_token(&self, username: &str, expected: &str) -> Result<bool> {
        Ok(self
            .with_user(username, |user| {
                if user.session_token.as_deref() != Some(expected) {
                    return false;
                }
                user.session_token = None;
                user.updated_at = Utc::now();
                true
            })
            .unwrap_or(false))
    }

    #[instrument(skip(self, expected), err)]
    async fn delete_with_token(&self, username: &str, expected: &str) -> Result<bool> {
        match self
            .users
            .remove_if(username, |_, user| user.session_token.as_deref() == Some(expected))
        {
            Some((_, user)) => {
                self.ids.remove(&user.id);
                Ok(true)
            }
            None if self.users.contains_key(username) => Ok(false),
            None => Err(DbError::NotFound),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            roles: vec!["user".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = MemoryStore::new();
        let user = store.create(&request("alice")).await.unwrap();

        assert_eq!(user.username, "alice");
        assert!(user.session_token.is_none());
        assert_eq!(store.get_by_id(user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(store.get_by_username("alice").await.unwrap(), Some(user));
        assert!(store.get_by_username("bob").await.unwrap().is_none());
        assert!(store.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryStore::new();
        store.create(&request("alice")).await.unwrap();
        let err = store.create(&request("alice")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let store = MemoryStore::new();
        let err = store
            .update(
                "ghost",
                &UserUpdateDBRequest {
                    password_hash: Some("x".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[tokio::test]
    async fn test_update_leaves_unset_fields() {
        let store = MemoryStore::new();
        store.create(&request("alice")).await.unwrap();
        store.set_session_token("alice", "t1").await.unwrap();

        let updated = store
            .update(
                "alice",
                &UserUpdateDBRequest {
                    password_hash: Some("new-hash".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.password_hash, "new-hash");
        assert_eq!(updated.session_token.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_session_token_overwrite_and_compare_and_clear() {
        let store = MemoryStore::new();
        store.create(&request("alice")).await.unwrap();

        assert!(store.set_session_token("alice", "t1").await.unwrap());
        assert!(store.set_session_token("alice", "t2").await.unwrap());
        assert!(!store.set_session_token("bob", "t1").await.unwrap());

        // Stale token cannot clear the live one
        assert!(!store.clear_session_token("alice", "t1").await.unwrap());
        assert!(store.clear_session_token("alice", "t2").await.unwrap());
        let user = store.get_by_username("alice").await.unwrap().unwrap();
        assert!(user.session_token.is_none());
    }

    #[tokio::test]
    async fn test_replace_session_token() {
        let store = MemoryStore::new();
        store.create(&request("alice")).await.unwrap();
        store.set_session_token("alice", "t1").await.unwrap();

        assert!(!store.replace_session_token("alice", "other", "t2").await.unwrap());
        assert!(store.replace_session_token("alice", "t1", "t2").await.unwrap());
        let user = store.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.session_token.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_delete_with_token() {
        let store = MemoryStore::new();
        let user = store.create(&request("alice")).await.unwrap();
        store.set_session_token("alice", "t1").await.unwrap();

        assert!(!store.delete_with_token("alice", "wrong").await.unwrap());
        assert!(store.get_by_username("alice").await.unwrap().is_some());

        assert!(store.delete_with_token("alice", "t1").await.unwrap());
        assert!(store.get_by_username("alice").await.unwrap().is_none());
        assert!(store.get_by_id(user.id).await.unwrap().is_none());

        let err = store.delete_with_token("alice", "t1").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_requires_a_session() {
        let store = MemoryStore::new();
        store.create(&request("alice")).await.unwrap();
        assert!(!store.delete_with_token("alice", "").await.unwrap());
    }
}
