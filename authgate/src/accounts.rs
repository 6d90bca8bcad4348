//! User lifecycle: registration, lookup, partial update and deletion.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    auth::password,
    config::PasswordConfig,
    db::{
        errors::DbError,
        handlers::CredentialStore,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{UserId, abbrev_uuid},
};

const MAX_USERNAME_LEN: usize = 64;

/// Fields a user may change about themselves. `None` or empty leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub password: Option<String>,
}

impl UserPatch {
    fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

pub struct Accounts {
    store: Arc<dyn CredentialStore>,
    password: PasswordConfig,
    default_roles: Vec<String>,
}

impl std::fmt::Debug for Accounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accounts")
            .field("default_roles", &self.default_roles)
            .finish_non_exhaustive()
    }
}

impl Accounts {
    pub fn new(store: Arc<dyn CredentialStore>, password: PasswordConfig, default_roles: Vec<String>) -> Self {
        Self {
            store,
            password,
            default_roles,
        }
    }

    fn check_password(&self, password: &str) -> Result<()> {
        let len = password.chars().count();
        if len < self.password.min_length {
            return Err(Error::bad_request(format!(
                "Password must be at least {} characters",
                self.password.min_length
            )));
        }
        if len > self.password.max_length {
            return Err(Error::bad_request(format!(
                "Password must be no more than {} characters",
                self.password.max_length
            )));
        }
        Ok(())
    }

    /// Register a new user with the configured default roles.
    #[instrument(skip(self, password), err)]
    pub async fn create(&self, username: &str, password: &str) -> Result<UserDBResponse> {
        self.create_with_roles(username, password, self.default_roles.clone()).await
    }

    /// Register a user with explicit roles. Used for the bootstrap admin.
    pub async fn create_with_roles(&self, username: &str, password: &str, roles: Vec<String>) -> Result<UserDBResponse> {
        if username.trim().is_empty() || username.trim() != username {
            return Err(Error::bad_request("Username must be non-empty without surrounding whitespace"));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(Error::bad_request(format!(
                "Username must be no more than {MAX_USERNAME_LEN} characters"
            )));
        }
        self.check_password(password)?;

        let password_hash = password::hash_password_blocking(password.to_string(), self.password.argon2).await?;

        let user = self
            .store
            .create(&UserCreateDBRequest {
                username: username.to_string(),
                password_hash,
                roles,
            })
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => Error::Conflict {
                    message: "This username is already taken".to_string(),
                },
                other => other.into(),
            })?;

        info!(user_id = %abbrev_uuid(&user.id), "User created");
        Ok(user)
    }

    /// Look a user up by id.
    pub async fn get(&self, id: UserId) -> Result<UserDBResponse> {
        self.store.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        })
    }

    pub async fn get_by_username(&self, username: &str) -> Result<UserDBResponse> {
        self.store.get_by_username(username).await?.ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: username.to_string(),
        })
    }

    /// Parse a path id, then [`Self::get`].
    pub async fn get_by_raw_id(&self, raw: &str) -> Result<UserDBResponse> {
        let id: UserId = raw.parse().map_err(|_| Error::bad_request("invalid user id"))?;
        self.get(id).await
    }

    /// Apply the non-empty fields of `patch`. An empty patch is rejected.
    #[instrument(skip(self, patch), err)]
    pub async fn update(&self, username: &str, patch: UserPatch) -> Result<UserDBResponse> {
        let Some(new_password) = patch.password() else {
            return Err(Error::bad_request("no updatable fields provided"));
        };
        self.check_password(new_password)?;

        let password_hash = password::hash_password_blocking(new_password.to_string(), self.password.argon2).await?;

        self.store
            .update(
                username,
                &UserUpdateDBRequest {
                    password_hash: Some(password_hash),
                },
            )
            .await
            .map_err(|e| match e {
                DbError::NotFound => Error::NotFound {
                    resource: "User".to_string(),
                    id: username.to_string(),
                },
                other => other.into(),
            })
    }

    /// Delete `username`, but only while `token` is its live session token.
    #[instrument(skip(self, token), err)]
    pub async fn delete(&self, username: &str, token: &str) -> Result<()> {
        match self.store.delete_with_token(username, token).await {
            Ok(true) => {
                info!("User deleted");
                Ok(())
            }
            Ok(false) => Err(Error::bad_request(INVALID_JWT)),
            Err(DbError::NotFound) => Err(Error::NotFound {
                resource: "User".to_string(),
                id: username.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Client-facing message for delete attempts with a token that is not the live session.
pub const INVALID_JWT: &str = "invalid jwt";
