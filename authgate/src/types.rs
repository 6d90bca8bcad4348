//! Common type definitions.
//!
//! - [`UserId`]: user record identifier
//! - [`Permission`]: a `(resource, action)` grant, as attached to roles by the
//!   [`crate::auth::gate::RoleGrants`] policy
//! - [`abbrev_uuid`]: abbreviate UUIDs for logging

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Wildcard accepted in either half of a [`Permission`].
pub const ANY: &str = "*";

/// A single grant: `action` may be performed on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Whether this grant covers `action` on `resource`. `*` matches anything.
    pub fn covers(&self, resource: &str, action: &str) -> bool {
        (self.resource == ANY || self.resource == resource) && (self.action == ANY || self.action == action)
    }
}
