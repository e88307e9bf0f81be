use async_trait::async_trait;
use thiserror::Error;

use iacp_auth::{ClaimConfigPatch, ClaimConfiguration};
use iacp_core::{
    AppId, AppRoleBinding, AppRoleView, Application, Role, RoleId, User, UserApplicationBinding,
    UserApplicationView, UserId,
};

/// Persistence failure.
///
/// These are **infrastructure errors**. Constraint violations are surfaced
/// separately so services can turn them into conflicts or re-reads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A referenced parent row does not exist (anymore).
    #[error("referenced row missing: {constraint}")]
    MissingReference { constraint: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    pub fn missing(constraint: impl Into<String>) -> Self {
        Self::MissingReference {
            constraint: constraint.into(),
        }
    }
}

/// Constraint names shared by every backend.
pub mod constraints {
    pub const USERS_USERNAME: &str = "users_username_key";
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const USERS_PHONE: &str = "users_phone_key";
    pub const ROLES_NAME: &str = "roles_role_name_key";
    pub const APPLICATIONS_NAME: &str = "applications_app_name_key";
    pub const APP_ROLES_PAIR: &str = "app_roles_app_id_role_id_key";
    pub const APP_ROLES_APP: &str = "app_roles_app_id_fkey";
    pub const APP_ROLES_ROLE: &str = "app_roles_role_id_fkey";
    pub const USER_APPLICATIONS_PAIR: &str = "user_applications_user_id_app_id_key";
    pub const USER_APPLICATIONS_USER: &str = "user_applications_user_id_fkey";
    pub const USER_APPLICATIONS_APP: &str = "user_applications_app_id_fkey";
    pub const CLAIM_CONFIG_SINGLETON: &str = "claim_config_singleton_key";
}

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
}

/// Partial user update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

/// User accounts.
///
/// Implementations must enforce uniqueness of username, email and phone and
/// remove a user's application bindings when the user is deleted.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;

    /// All users, ordered by id.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Apply `changes` and stamp `updated_at`. `None` when the user is unknown.
    async fn update_user(&self, id: UserId, changes: UserChanges)
    -> Result<Option<User>, StoreError>;

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;
}

/// The single claim-configuration row.
#[async_trait]
pub trait ClaimConfigStore: Send + Sync {
    async fn load_claim_config(&self) -> Result<Option<ClaimConfiguration>, StoreError>;

    /// Insert the row. Returns `false` if one already exists.
    async fn create_claim_config(&self, config: &ClaimConfiguration) -> Result<bool, StoreError>;

    /// Write only the patch's supplied fields, atomically. Returns the
    /// resulting row, or `None` if there is none yet.
    async fn patch_claim_config(
        &self,
        patch: &ClaimConfigPatch,
    ) -> Result<Option<ClaimConfiguration>, StoreError>;
}

/// Roles, applications and the two binding tables.
///
/// Deleting a role or application removes every binding that references it.
/// Binding listings come back in insertion order.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// All roles, ordered by name.
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;
    async fn role_by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError>;
    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;
    async fn insert_role(&self, name: &str) -> Result<Role, StoreError>;
    async fn rename_role(&self, id: RoleId, name: &str) -> Result<Option<Role>, StoreError>;
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError>;

    /// All applications, ordered by name.
    async fn list_applications(&self) -> Result<Vec<Application>, StoreError>;
    async fn application_by_id(&self, id: AppId) -> Result<Option<Application>, StoreError>;
    async fn application_by_name(&self, name: &str) -> Result<Option<Application>, StoreError>;
    async fn insert_application(&self, name: &str) -> Result<Application, StoreError>;
    async fn rename_application(
        &self,
        id: AppId,
        name: &str,
    ) -> Result<Option<Application>, StoreError>;
    async fn delete_application(&self, id: AppId) -> Result<bool, StoreError>;

    async fn app_role(&self, app: AppId, role: RoleId)
    -> Result<Option<AppRoleBinding>, StoreError>;
    async fn insert_app_role(&self, app: AppId, role: RoleId)
    -> Result<AppRoleBinding, StoreError>;
    async fn delete_app_role(&self, app: AppId, role: RoleId) -> Result<bool, StoreError>;
    /// Joined app-role rows, for one application or for all of them.
    async fn app_role_views(&self, app: Option<AppId>) -> Result<Vec<AppRoleView>, StoreError>;
    async fn roles_for_app(&self, app: AppId) -> Result<Vec<Role>, StoreError>;
    async fn apps_for_role(&self, role: RoleId) -> Result<Vec<Application>, StoreError>;
    /// Roles of several applications at once, as `(app, role)` pairs.
    async fn roles_for_apps(&self, apps: &[AppId]) -> Result<Vec<(AppId, Role)>, StoreError>;

    async fn user_application(
        &self,
        user: UserId,
        app: AppId,
    ) -> Result<Option<UserApplicationBinding>, StoreError>;
    async fn insert_user_application(
        &self,
        user: UserId,
        app: AppId,
    ) -> Result<UserApplicationBinding, StoreError>;
    async fn delete_user_application(&self, user: UserId, app: AppId) -> Result<bool, StoreError>;
    /// Joined user-application rows, for one application or for all of them.
    async fn user_application_views(
        &self,
        app: Option<AppId>,
    ) -> Result<Vec<UserApplicationView>, StoreError>;
    async fn apps_for_user(&self, user: UserId) -> Result<Vec<Application>, StoreError>;
}

/// Everything the services need from one backend.
pub trait IdentityStore: CredentialStore + ClaimConfigStore + GraphStore {}

impl<T> IdentityStore for T where T: CredentialStore + ClaimConfigStore + GraphStore {}
