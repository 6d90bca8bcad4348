//! Credential store implementations.
//!
//! - [`CredentialStore`]: the trait every store implements
//! - [`PgStore`]: PostgreSQL-backed store
//! - [`MemoryStore`]: in-process store for `database.type: memory` and tests
//! - [`TimeoutStore`]: bounds each call of an inner store by a deadline

pub mod memory;
pub mod repository;
pub mod timeout;
pub mod users;

pub use memory::MemoryStore;
pub use repository::CredentialStore;
pub use timeout::TimeoutStore;
pub use users::PgStore;
