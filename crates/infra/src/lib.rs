//! Infrastructure layer: persistence backends and the application services
//! built on top of them.

pub mod services;
pub mod store;

mod integration_tests;

pub use services::{
    AccountService, ClaimConfigService, GraphService, NewAccount, ProfileUpdate, ServiceError,
    ServiceResult, TokenIssuer,
};
pub use store::{IdentityStore, InMemoryIdentityStore, PostgresIdentityStore, StoreError};
