//! Persistence boundary for accounts, claim configuration and the
//! authorization graph.
//!
//! Services depend only on the traits; the in-memory store backs tests and
//! development, the Postgres store backs deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;
pub use r#trait::{
    ClaimConfigStore, CredentialStore, GraphStore, IdentityStore, NewUser, StoreError,
    UserChanges, constraints,
};
