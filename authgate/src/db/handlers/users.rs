//! PostgreSQL credential store.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::CredentialStore,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub session_token: Option<String>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            password_hash: user.password_hash,
            session_token: user.session_token,
            roles: user.roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, session_token, roles, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgStore {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        // Always generate a new ID for users
        let user_id = Uuid::new_v4();

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, password_hash, roles) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(&request.roles)
        .fetch_one(&self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self), err)]
    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self, request), err)]
    async fn update(&self, username: &str, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        // COALESCE keeps the column when the patch leaves it out
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                password_hash = COALESCE($2, password_hash),
                updated_at = NOW()
            WHERE username = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(&request.password_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user.into())
    }

    #[instrument(skip(self, token), err)]
    async fn set_session_token(&self, username: &str, token: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET session_token = $2, updated_at = NOW() WHERE username = $1")
            .bind(username)
            .bind(token)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, current, new), err)]
    async fn replace_session_token(&self, username: &str, current: &str, new: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET session_token = $3, updated_at = NOW() WHERE username = $1 AND session_token = $2",
        )
        .bind(username)
        .bind(current)
        .bind(new)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, expected), err)]
    async fn clear_session_token(&self, username: &str, expected: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET session_token = NULL, updated_at = NOW() WHERE username = $1 AND session_token = $2",
        )
        .bind(username)
        .bind(expected)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, expected), err)]
    async fn delete_with_token(&self, username: &str, expected: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1 AND session_token = $2")
            .bind(username)
            .bind(expected)
            .execute(&self.db)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Nothing deleted: tell a stale token apart from a missing user
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        match exists {
            Some(_) => Ok(false),
            None => Err(DbError::NotFound),
        }
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
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
            roles: vec!["user".to_string(), "admin".to_string()],
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_lookup(pool: PgPool) {
        let store = PgStore::new(pool);
        let user = store.create(&request("alice")).await.unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.roles, vec!["user".to_string(), "admin".to_string()]);
        assert!(user.session_token.is_none());
        assert_eq!(store.get_by_id(user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(store.get_by_username("alice").await.unwrap(), Some(user));
        assert!(store.get_by_username("bob").await.unwrap().is_none());
        assert!(store.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_username_rejected(pool: PgPool) {
        let store = PgStore::new(pool);
        store.create(&request("alice")).await.unwrap();

        let err = store.create(&request("alice")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_leaves_unset_fields(pool: PgPool) {
        let store = PgStore::new(pool);
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

        // An empty patch keeps the stored hash
        let unchanged = store.update("alice", &UserUpdateDBRequest::default()).await.unwrap();
        assert_eq!(unchanged.password_hash, "new-hash");

        let err = store.update("ghost", &UserUpdateDBRequest::default()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_session_token_overwrite_and_compare_and_clear(pool: PgPool) {
        let store = PgStore::new(pool);
        store.create(&request("alice")).await.unwrap();

        assert!(store.set_session_token("alice", "t1").await.unwrap());
        assert!(store.set_session_token("alice", "t2").await.unwrap());
        assert!(!store.set_session_token("bob", "t1").await.unwrap());

        // Stale token cannot clear the live one
        assert!(!store.clear_session_token("alice", "t1").await.unwrap());
        let user = store.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.session_token.as_deref(), Some("t2"));

        assert!(store.clear_session_token("alice", "t2").await.unwrap());
        let user = store.get_by_username("alice").await.unwrap().unwrap();
        assert!(user.session_token.is_none());

        // Nothing left to clear
        assert!(!store.clear_session_token("alice", "t2").await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replace_session_token(pool: PgPool) {
        let store = PgStore::new(pool);
        store.create(&request("alice")).await.unwrap();
        store.set_session_token("alice", "t1").await.unwrap();

        assert!(!store.replace_session_token("alice", "other", "t2").await.unwrap());
        assert!(!store.replace_session_token("ghost", "t1", "t2").await.unwrap());
        assert!(store.replace_session_token("alice", "t1", "t2").await.unwrap());

        let user = store.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.session_token.as_deref(), Some("t2"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_with_token(pool: PgPool) {
        let store = PgStore::new(pool);
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

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_requires_a_session(pool: PgPool) {
        let store = PgStore::new(pool);
        store.create(&request("alice")).await.unwrap();

        // NULL never equals the presented token
        assert!(!store.delete_with_token("alice", "").await.unwrap());
        assert!(store.get_by_username("alice").await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_ping(pool: PgPool) {
        PgStore::new(pool).ping().await.unwrap();
    }
}
