//! `iacp-core`: identity domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::{
    AppRoleBinding, AppRoleView, Application, ApplicationWithRoles, Role, User,
    UserAccess, UserApplicationBinding, UserApplicationView, UserSummary,
};
pub use error::{DomainError, DomainResult};
pub use id::{AppId, BindingId, RoleId, UserId};
pub use value_object::{AppName, Email, Password, Phone, RoleName, Username};
