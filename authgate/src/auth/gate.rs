//! Authorization gate.
//!
//! A decision is made per request: the presented token is re-validated against the stored
//! session, then a [`PermissionPolicy`] maps the stored roles plus `(resource, action)` to
//! allow or deny.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::{
    auth::session::SessionManager,
    config::PolicyConfig,
    errors::{Error, Result},
    types::Permission,
};

/// Maps a subject's roles and a requested `(resource, action)` to a decision.
pub trait PermissionPolicy: Send + Sync + Debug {
    fn allows(&self, roles: &[String], resource: &str, action: &str) -> bool;
}

/// Grants everything to any authenticated subject.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionPolicy for AllowAll {
    fn allows(&self, _roles: &[String], _resource: &str, _action: &str) -> bool {
        true
    }
}

/// Explicit role to permission table. A subject is allowed if any of its roles carries a
/// covering grant; unknown roles grant nothing.
#[derive(Debug, Clone, Default)]
pub struct RoleGrants {
    grants: HashMap<String, Vec<Permission>>,
}

impl RoleGrants {
    pub fn new(grants: HashMap<String, Vec<Permission>>) -> Self {
        Self { grants }
    }
}

impl PermissionPolicy for RoleGrants {
    fn allows(&self, roles: &[String], resource: &str, action: &str) -> bool {
        roles
            .iter()
            .filter_map(|role| self.grants.get(role))
            .flatten()
            .any(|grant| grant.covers(resource, action))
    }
}

pub fn policy_from_config(config: &PolicyConfig) -> Arc<dyn PermissionPolicy> {
    match config {
        PolicyConfig::AllowAll => Arc::new(AllowAll),
        PolicyConfig::RoleGrants { grants } => Arc::new(RoleGrants::new(grants.clone())),
    }
}

/// Outcome of a permission check on a valid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub expires_at: DateTime<Utc>,
    /// Seconds until the presented token expires.
    pub expires_in: i64,
}

#[derive(Debug)]
pub struct AuthorizationGate {
    sessions: Arc<SessionManager>,
    policy: Arc<dyn PermissionPolicy>,
}

impl AuthorizationGate {
    pub fn new(sessions: Arc<SessionManager>, policy: Arc<dyn PermissionPolicy>) -> Self {
        Self { sessions, policy }
    }

    /// Decide whether `subject`, holding `token`, may perform `action` on `resource`.
    #[instrument(skip(self, token), err)]
    pub async fn check_permission(&self, subject: &str, token: &str, resource: &str, action: &str) -> Result<Decision> {
        if subject.is_empty() || token.is_empty() || resource.is_empty() || action.is_empty() {
            return Err(Error::bad_request("subject, token, resource and action are required"));
        }

        let claims = self
            .sessions
            .codec()
            .verify(token)
            .map_err(|e| Error::unauthenticated(e.to_string()))?;
        if claims.sub != subject {
            return Err(Error::unauthenticated("token subject mismatch"));
        }

        let user = self.sessions.validate(subject, token).await?;

        let allowed = self.policy.allows(&user.roles, resource, action);
        debug!(allowed, roles = ?user.roles, "Permission evaluated");

        Ok(Decision {
            allowed,
            expires_at: claims.expires_at(),
            expires_in: claims.expires_in(Utc::now()),
        })
    }

    /// [`Self::check_permission`] with the subject read from the token itself.
    pub async fn authorize(&self, token: &str, resource: &str, action: &str) -> Result<Decision> {
        if resource.is_empty() || action.is_empty() {
            return Err(Error::bad_request("resource and action are required"));
        }

        let claims = self
            .sessions
            .codec()
            .verify(token)
            .map_err(|e| Error::unauthenticated(e.to_string()))?;

        self.check_permission(&claims.sub, token, resource, action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::token::TokenCodec,
        db::handlers::{CredentialStore, MemoryStore},
        test_utils::{cheap_argon2, seed_user},
        types::ANY,
    };
    use std::time::Duration;

    async fn gate_with(policy: Arc<dyn PermissionPolicy>) -> (AuthorizationGate, Arc<SessionManager>) {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
        seed_user(&store, "alice", "secret123").await;
        let sessions = Arc::new(SessionManager::new(
            store,
            TokenCodec::new(b"gate-test-secret"),
            Duration::from_secs(3600),
            cheap_argon2(),
        ));
        (AuthorizationGate::new(sessions.clone(), policy), sessions)
    }

    fn grants(entries: Vec<(&str, Vec<(&str, &str)>)>) -> RoleGrants {
        RoleGrants::new(
            entries
                .into_iter()
                .map(|(role, perms)| {
                    (
                        role.to_string(),
                        perms.into_iter().map(|(r, a)| Permission::new(r, a)).collect(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.allows(&[], "docs", "read"));
    }

    #[test]
    fn test_role_grants() {
        let policy = grants(vec![("user", vec![("docs", "read")]), ("admin", vec![(ANY, ANY)])]);

        let user = vec!["user".to_string()];
        assert!(policy.allows(&user, "docs", "read"));
        assert!(!policy.allows(&user, "docs", "write"));

        let admin = vec!["admin".to_string()];
        assert!(policy.allows(&admin, "users", "delete"));

        assert!(!policy.allows(&["ghost".to_string()], "docs", "read"));
        assert!(!policy.allows(&[], "docs", "read"));
    }

    #[tokio::test]
    async fn test_valid_session_allowed() {
        let (gate, sessions) = gate_with(Arc::new(AllowAll)).await;
        let issued = sessions.login("alice", "secret123").await.unwrap();

        let decision = gate.check_permission("alice", &issued.token, "docs", "read").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.expires_at, issued.expires_at);
        assert!(decision.expires_in > 3500 && decision.expires_in <= 3600);
    }

    #[tokio::test]
    async fn test_empty_inputs_are_bad_request() {
        let (gate, sessions) = gate_with(Arc::new(AllowAll)).await;
        let issued = sessions.login("alice", "secret123").await.unwrap();

        for (subject, token, resource, action) in [
            ("", issued.token.as_str(), "docs", "read"),
            ("alice", "", "docs", "read"),
            ("alice", issued.token.as_str(), "", "read"),
            ("alice", issued.token.as_str(), "docs", ""),
        ] {
            let err = gate.check_permission(subject, token, resource, action).await.unwrap_err();
            assert!(matches!(err, Error::BadRequest { .. }));
        }
    }

    #[tokio::test]
    async fn test_superseded_token_unauthenticated() {
        let (gate, sessions) = gate_with(Arc::new(AllowAll)).await;
        let old = sessions.login("alice", "secret123").await.unwrap();
        sessions.login("alice", "secret123").await.unwrap();

        let err = gate.check_permission("alice", &old.token, "docs", "read").await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_subject_mismatch_unauthenticated() {
        let (gate, sessions) = gate_with(Arc::new(AllowAll)).await;
        let issued = sessions.login("alice", "secret123").await.unwrap();

        let err = gate.check_permission("bob", &issued.token, "docs", "read").await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_deleted_user_unauthenticated() {
        let (gate, sessions) = gate_with(Arc::new(AllowAll)).await;
        let issued = sessions.login("alice", "secret123").await.unwrap();
        sessions.store().delete_with_token("alice", &issued.token).await.unwrap();

        let err = gate.authorize(&issued.token, "docs", "read").await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_policy_denial() {
        let (gate, sessions) = gate_with(Arc::new(grants(vec![("user", vec![("docs", "read")])]))).await;
        let issued = sessions.login("alice", "secret123").await.unwrap();

        assert!(gate.authorize(&issued.token, "docs", "read").await.unwrap().allowed);
        assert!(!gate.authorize(&issued.token, "docs", "write").await.unwrap().allowed);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = policy_from_config(&PolicyConfig::RoleGrants {
            grants: HashMap::from([("user".to_string(), vec![Permission::new("docs", ANY)])]),
        });
        assert!(policy.allows(&["user".to_string()], "docs", "write"));
        assert!(!policy.allows(&["user".to_string()], "users", "write"));

        assert!(policy_from_config(&PolicyConfig::AllowAll).allows(&[], "x", "y"));
    }
}
