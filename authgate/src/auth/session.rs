//! Session lifecycle: login, logout, validation and refresh.
//!
//! Each user has at most one live session token, held in the credential store. Login overwrites
//! it; every other token write is a compare-and-set against the token the caller presents, so a
//! superseded token can never clear or replace the live one.

use std::{sync::Arc, time::Duration};

use once_cell::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::{
    auth::{
        password::{self, Argon2Params},
        token::{IssuedToken, SessionClaims, TokenCodec, constant_time_eq},
    },
    db::{handlers::CredentialStore, models::users::UserDBResponse},
    errors::{Error, Result},
    types::UserId,
};

/// Client-facing message for every logout failure.
pub const LOGOUT_FAILED: &str = "logout failed";

/// Verified against when the username is unknown, so both login failure paths cost one hash.
const DUMMY_PASSWORD: &str = "authgate-dummy-password";

/// A request's authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    /// Roles from the stored record, not the token.
    pub roles: Vec<String>,
    pub token: String,
    pub claims: SessionClaims,
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    ttl: Duration,
    argon2: Argon2Params,
    dummy_hash: OnceCell<String>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec, ttl: Duration, argon2: Argon2Params) -> Self {
        Self {
            store,
            codec,
            ttl,
            argon2,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    async fn dummy_hash(&self) -> Result<String> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.clone());
        }
        let hash = password::hash_password_blocking(DUMMY_PASSWORD.to_string(), self.argon2).await?;
        Ok(self.dummy_hash.get_or_init(|| hash).clone())
    }

    /// Exchange credentials for a new session token, replacing any previous one.
    #[instrument(skip(self, password), err)]
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedToken> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let user = self.store.get_by_username(username).await?;

        let (hash, user) = match user {
            Some(user) => (user.password_hash.clone(), Some(user)),
            None => (self.dummy_hash().await?, None),
        };
        let is_valid = password::verify_password_blocking(password.to_string(), hash).await?;

        let user = match user {
            Some(user) if is_valid => user,
            _ => {
                debug!("Login rejected");
                return Err(Error::InvalidCredentials);
            }
        };

        let issued = self.codec.issue(&user.username, &user.roles, self.ttl)?;

        // Deleted between lookup and write
        if !self.store.set_session_token(&user.username, &issued.token).await? {
            return Err(Error::InvalidCredentials);
        }

        info!(username = %user.username, "Session issued");
        Ok(issued)
    }

    /// Revoke `token` if it is still the subject's live session. Expiry is not checked.
    #[instrument(skip_all, err)]
    pub async fn logout(&self, token: &str) -> Result<()> {
        let logout_failed = || Error::bad_request(LOGOUT_FAILED);

        let claims = self.codec.verify(token).map_err(|e| {
            debug!("Logout with unverifiable token: {e}");
            logout_failed()
        })?;

        if !self.store.clear_session_token(&claims.sub, token).await? {
            return Err(logout_failed());
        }

        info!(username = %claims.sub, "Session revoked");
        Ok(())
    }

    /// Confirm that `token` is the unexpired live session of `username`.
    ///
    /// Stages, each failing with the same opaque error: non-empty, not expired, equal to the
    /// stored token.
    pub async fn validate(&self, username: &str, token: &str) -> Result<UserDBResponse> {
        if username.is_empty() || token.is_empty() {
            return Err(Error::unauthenticated("missing username or token"));
        }

        if self.codec.is_expired(token) {
            return Err(Error::unauthenticated("token expired"));
        }

        let user = self
            .store
            .get_by_username(username)
            .await?
            .ok_or_else(|| Error::unauthenticated("token subject does not exist"))?;

        let matches = user
            .session_token
            .as_deref()
            .is_some_and(|stored| constant_time_eq(stored.as_bytes(), token.as_bytes()));
        if !matches {
            return Err(Error::unauthenticated("token does not match stored session"));
        }

        Ok(user)
    }

    /// Resolve a bearer token into a [`Session`]: signature, then [`Self::validate`].
    pub async fn authenticate(&self, token: &str) -> Result<Session> {
        let claims = self
            .codec
            .verify(token)
            .map_err(|e| Error::unauthenticated(e.to_string()))?;

        let user = self.validate(&claims.sub, token).await?;

        Ok(Session {
            user_id: user.id,
            username: user.username,
            roles: user.roles,
            token: token.to_string(),
            claims,
        })
    }

    /// Rotate a validated session to a fresh token. The old token stops working.
    #[instrument(skip_all, fields(username = %session.username), err)]
    pub async fn refresh(&self, session: &Session) -> Result<IssuedToken> {
        let issued = self.codec.issue(&session.username, &session.roles, self.ttl)?;

        if !self
            .store
            .replace_session_token(&session.username, &session.token, &issued.token)
            .await?
        {
            return Err(Error::unauthenticated("session superseded before refresh"));
        }

        info!("Session refreshed");
        Ok(issued)
    }
}
