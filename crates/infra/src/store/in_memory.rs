use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use iacp_auth::{ClaimConfigPatch, ClaimConfiguration};
use iacp_core::{
    AppId, AppRoleBinding, AppRoleView, Application, BindingId, Role, RoleId, User,
    UserApplicationBinding, UserApplicationView, UserId,
};

use super::r#trait::{
    ClaimConfigStore, CredentialStore, GraphStore, NewUser, StoreError, UserChanges, constraints,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    roles: Vec<Role>,
    applications: Vec<Application>,
    app_roles: Vec<AppRoleBinding>,
    user_applications: Vec<UserApplicationBinding>,
    claim_config: Option<ClaimConfiguration>,
    next_user: i32,
    next_role: i32,
    next_app: i32,
    next_app_role: i32,
    next_user_app: i32,
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

impl Tables {
    fn user_conflict(&self, skip: Option<UserId>, username: &str, email: &str, phone: &str) -> Option<&'static str> {
        self.users
            .iter()
            .filter(|u| Some(u.id) != skip)
            .find_map(|u| {
                if u.username == username {
                    Some(constraints::USERS_USERNAME)
                } else if u.email == email {
                    Some(constraints::USERS_EMAIL)
                } else if u.phone == phone {
                    Some(constraints::USERS_PHONE)
                } else {
                    None
                }
            })
    }

    fn app(&self, id: AppId) -> Option<&Application> {
        self.applications.iter().find(|a| a.id == id)
    }

    fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }
}

/// In-memory identity store.
///
/// Intended for tests/dev. Mirrors the relational schema: unique columns,
/// unique binding pairs, and cascading deletes are all enforced here.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    tables: RwLock<Tables>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }
}

fn sorted_by<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|r| key(r));
    rows
}

#[async_trait]
impl CredentialStore for InMemoryIdentityStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.write()?;
        if let Some(constraint) = t.user_conflict(None, &user.username, &user.email, &user.phone) {
            return Err(StoreError::unique(constraint));
        }
        let now = Utc::now();
        let row = User {
            id: UserId::new(next(&mut t.next_user)),
            username: user.username,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.user(id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.iter().find(|u| u.username == username).cloned())
    }

    async fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.iter().find(|u| u.phone == phone).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(sorted_by(self.read()?.users.clone(), |u| u.id))
    }

    async fn update_user(
        &self,
        id: UserId,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut t = self.write()?;
        let Some(current) = t.user(id).cloned() else {
            return Ok(None);
        };

        let username = changes.username.unwrap_or(current.username);
        let email = changes.email.unwrap_or(current.email);
        let phone = changes.phone.unwrap_or(current.phone);
        if let Some(constraint) = t.user_conflict(Some(id), &username, &email, &phone) {
            return Err(StoreError::unique(constraint));
        }

        let Some(row) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        row.username = username;
        row.email = email;
        row.phone = phone;
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        if t.users.len() == before {
            return Ok(false);
        }
        t.user_applications.retain(|b| b.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ClaimConfigStore for InMemoryIdentityStore {
    async fn load_claim_config(&self) -> Result<Option<ClaimConfiguration>, StoreError> {
        Ok(self.read()?.claim_config.clone())
    }

    async fn create_claim_config(&self, config: &ClaimConfiguration) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        if t.claim_config.is_some() {
            return Ok(false);
        }
        t.claim_config = Some(config.clone());
        Ok(true)
    }

    async fn patch_claim_config(
        &self,
        patch: &ClaimConfigPatch,
    ) -> Result<Option<ClaimConfiguration>, StoreError> {
        let mut t = self.write()?;
        Ok(t.claim_config.as_mut().map(|row| {
            patch.apply_to(row);
            row.clone()
        }))
    }
}

fn app_role_view(t: &Tables, b: &AppRoleBinding) -> Option<AppRoleView> {
    let app = t.app(b.app_id)?;
    let role = t.role(b.role_id)?;
    Some(AppRoleView {
        id: b.id,
        app_id: b.app_id,
        role_id: b.role_id,
        role_name: role.role_name.clone(),
        app_name: app.app_name.clone(),
        created_at: b.created_at,
        updated_at: b.updated_at,
    })
}

fn user_application_view(t: &Tables, b: &UserApplicationBinding) -> Option<UserApplicationView> {
    let user = t.user(b.user_id)?;
    let app = t.app(b.app_id)?;
    Some(UserApplicationView {
        id: b.id,
        user_id: b.user_id,
        app_id: b.app_id,
        username: user.username.clone(),
        email: user.email.clone(),
        app_name: app.app_name.clone(),
        created_at: b.created_at,
        updated_at: b.updated_at,
    })
}

fn stamp() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now, now)
}

#[async_trait]
impl GraphStore for InMemoryIdentityStore {
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(sorted_by(self.read()?.roles.clone(), |r| r.role_name.clone()))
    }

    async fn role_by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.read()?.role(id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.read()?.roles.iter().find(|r| r.role_name == name).cloned())
    }

    async fn insert_role(&self, name: &str) -> Result<Role, StoreError> {
        let mut t = self.write()?;
        if t.roles.iter().any(|r| r.role_name == name) {
            return Err(StoreError::unique(constraints::ROLES_NAME));
        }
        let (created_at, updated_at) = stamp();
        let row = Role {
            id: RoleId::new(next(&mut t.next_role)),
            role_name: name.to_string(),
            created_at,
            updated_at,
        };
        t.roles.push(row.clone());
        Ok(row)
    }

    async fn rename_role(&self, id: RoleId, name: &str) -> Result<Option<Role>, StoreError> {
        let mut t = self.write()?;
        if t.roles.iter().any(|r| r.id != id && r.role_name == name) {
            return Err(StoreError::unique(constraints::ROLES_NAME));
        }
        Ok(t.roles.iter_mut().find(|r| r.id == id).map(|r| {
            r.role_name = name.to_string();
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let before = t.roles.len();
        t.roles.retain(|r| r.id != id);
        if t.roles.len() == before {
            return Ok(false);
        }
        t.app_roles.retain(|b| b.role_id != id);
        Ok(true)
    }

    async fn list_applications(&self) -> Result<Vec<Application>, StoreError> {
        Ok(sorted_by(self.read()?.applications.clone(), |a| a.app_name.clone()))
    }

    async fn application_by_id(&self, id: AppId) -> Result<Option<Application>, StoreError> {
        Ok(self.read()?.app(id).cloned())
    }

    async fn application_by_name(&self, name: &str) -> Result<Option<Application>, StoreError> {
        Ok(self.read()?.applications.iter().find(|a| a.app_name == name).cloned())
    }

    async fn insert_application(&self, name: &str) -> Result<Application, StoreError> {
        let mut t = self.write()?;
        if t.applications.iter().any(|a| a.app_name == name) {
            return Err(StoreError::unique(constraints::APPLICATIONS_NAME));
        }
        let (created_at, updated_at) = stamp();
        let row = Application {
            id: AppId::new(next(&mut t.next_app)),
            app_name: name.to_string(),
            created_at,
            updated_at,
        };
        t.applications.push(row.clone());
        Ok(row)
    }

    async fn rename_application(
        &self,
        id: AppId,
        name: &str,
    ) -> Result<Option<Application>, StoreError> {
        let mut t = self.write()?;
        if t.applications.iter().any(|a| a.id != id && a.app_name == name) {
            return Err(StoreError::unique(constraints::APPLICATIONS_NAME));
        }
        Ok(t.applications.iter_mut().find(|a| a.id == id).map(|a| {
            a.app_name = name.to_string();
            a.updated_at = Utc::now();
            a.clone()
        }))
    }

    async fn delete_application(&self, id: AppId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let before = t.applications.len();
        t.applications.retain(|a| a.id != id);
        if t.applications.len() == before {
            return Ok(false);
        }
        t.app_roles.retain(|b| b.app_id != id);
        t.user_applications.retain(|b| b.app_id != id);
        Ok(true)
    }

    async fn app_role(
        &self,
        app: AppId,
        role: RoleId,
    ) -> Result<Option<AppRoleBinding>, StoreError> {
        Ok(self
            .read()?
            .app_roles
            .iter()
            .find(|b| b.app_id == app && b.role_id == role)
            .cloned())
    }

    async fn insert_app_role(&self, app: AppId, role: RoleId) -> Result<AppRoleBinding, StoreError> {
        let mut t = self.write()?;
        if t.app(app).is_none() {
            return Err(StoreError::missing(constraints::APP_ROLES_APP));
        }
        if t.role(role).is_none() {
            return Err(StoreError::missing(constraints::APP_ROLES_ROLE));
        }
        if t.app_roles.iter().any(|b| b.app_id == app && b.role_id == role) {
            return Err(StoreError::unique(constraints::APP_ROLES_PAIR));
        }
        let (created_at, updated_at) = stamp();
        let row = AppRoleBinding {
            id: BindingId::new(next(&mut t.next_app_role)),
            app_id: app,
            role_id: role,
            created_at,
            updated_at,
        };
        t.app_roles.push(row.clone());
        Ok(row)
    }

    async fn delete_app_role(&self, app: AppId, role: RoleId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let before = t.app_roles.len();
        t.app_roles.retain(|b| !(b.app_id == app && b.role_id == role));
        Ok(t.app_roles.len() != before)
    }

    async fn app_role_views(&self, app: Option<AppId>) -> Result<Vec<AppRoleView>, StoreError> {
        let t = self.read()?;
        Ok(t.app_roles
            .iter()
            .filter(|b| app.is_none_or(|a| b.app_id == a))
            .filter_map(|b| app_role_view(&t, b))
            .collect())
    }

    async fn roles_for_app(&self, app: AppId) -> Result<Vec<Role>, StoreError> {
        let t = self.read()?;
        Ok(t.app_roles
            .iter()
            .filter(|b| b.app_id == app)
            .filter_map(|b| t.role(b.role_id).cloned())
            .collect())
    }

    async fn apps_for_role(&self, role: RoleId) -> Result<Vec<Application>, StoreError> {
        let t = self.read()?;
        Ok(t.app_roles
            .iter()
            .filter(|b| b.role_id == role)
            .filter_map(|b| t.app(b.app_id).cloned())
            .collect())
    }

    async fn roles_for_apps(&self, apps: &[AppId]) -> Result<Vec<(AppId, Role)>, StoreError> {
        let t = self.read()?;
        Ok(t.app_roles
            .iter()
            .filter(|b| apps.contains(&b.app_id))
            .filter_map(|b| t.role(b.role_id).map(|r| (b.app_id, r.clone())))
            .collect())
    }

    async fn user_application(
        &self,
        user: UserId,
        app: AppId,
    ) -> Result<Option<UserApplicationBinding>, StoreError> {
        Ok(self
            .read()?
            .user_applications
            .iter()
            .find(|b| b.user_id == user && b.app_id == app)
            .cloned())
    }

    async fn insert_user_application(
        &self,
        user: UserId,
        app: AppId,
    ) -> Result<UserApplicationBinding, StoreError> {
        let mut t = self.write()?;
        if t.user(user).is_none() {
            return Err(StoreError::missing(constraints::USER_APPLICATIONS_USER));
        }
        if t.app(app).is_none() {
            return Err(StoreError::missing(constraints::USER_APPLICATIONS_APP));
        }
        if t.user_applications.iter().any(|b| b.user_id == user && b.app_id == app) {
            return Err(StoreError::unique(constraints::USER_APPLICATIONS_PAIR));
        }
        let (created_at, updated_at) = stamp();
        let row = UserApplicationBinding {
            id: BindingId::new(next(&mut t.next_user_app)),
            user_id: user,
            app_id: app,
            created_at,
            updated_at,
        };
        t.user_applications.push(row.clone());
        Ok(row)
    }

    async fn delete_user_application(&self, user: UserId, app: AppId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let before = t.user_applications.len();
        t.user_applications.retain(|b| !(b.user_id == user && b.app_id == app));
        Ok(t.user_applications.len() != before)
    }

    async fn user_application_views(
        &self,
        app: Option<AppId>,
    ) -> Result<Vec<UserApplicationView>, StoreError> {
        let t = self.read()?;
        Ok(t.user_applications
            .iter()
            .filter(|b| app.is_none_or(|a| b.app_id == a))
            .filter_map(|b| user_application_view(&t, b))
            .collect())
    }

    async fn apps_for_user(&self, user: UserId) -> Result<Vec<Application>, StoreError> {
        let t = self.read()?;
        Ok(t.user_applications
            .iter()
            .filter(|b| b.user_id == user)
            .filter_map(|b| t.app(b.app_id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(n: &str) -> NewUser {
        NewUser {
            username: format!("user_{n}"),
            email: format!("{n}@example.com"),
            phone: format!("+1555000{n}"),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn user_columns_are_unique() {
        let store = InMemoryIdentityStore::new();
        store.insert_user(new_user("1")).await.unwrap();

        let mut dup = new_user("2");
        dup.email = "1@example.com".into();
        assert_eq!(
            store.insert_user(dup).await,
            Err(StoreError::unique(constraints::USERS_EMAIL))
        );
    }

    #[tokio::test]
    async fn update_may_keep_own_values() {
        let store = InMemoryIdentityStore::new();
        let user = store.insert_user(new_user("1")).await.unwrap();

        let changes = UserChanges {
            username: Some(user.username.clone()),
            phone: Some("+15559999".into()),
            ..Default::default()
        };
        let updated = store.update_user(user.id, changes).await.unwrap().unwrap();
        assert_eq!(updated.phone, "+15559999");
        assert_eq!(updated.username, user.username);
    }

    #[tokio::test]
    async fn deleting_a_role_cascades_bindings() {
        let store = InMemoryIdentityStore::new();
        let app = store.insert_application("crm").await.unwrap();
        let role = store.insert_role("admin").await.unwrap();
        store.insert_app_role(app.id, role.id).await.unwrap();

        assert!(store.delete_role(role.id).await.unwrap());
        assert!(store.app_role_views(None).await.unwrap().is_empty());
        assert!(!store.delete_role(role.id).await.unwrap());
    }

    #[tokio::test]
    async fn bindings_need_both_parents() {
        let store = InMemoryIdentityStore::new();
        let app = store.insert_application("crm").await.unwrap();
        assert!(matches!(
            store.insert_app_role(app.id, RoleId::new(42)).await,
            Err(StoreError::MissingReference { .. })
        ));
    }

    #[tokio::test]
    async fn listings_are_sorted_by_name() {
        let store = InMemoryIdentityStore::new();
        store.insert_role("viewer").await.unwrap();
        store.insert_role("admin").await.unwrap();
        let names: Vec<_> = store
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.role_name)
            .collect();
        assert_eq!(names, ["admin", "viewer"]);
    }

    #[tokio::test]
    async fn claim_config_row_is_created_once() {
        let store = InMemoryIdentityStore::new();
        let patch = ClaimConfigPatch::default();
        assert_eq!(store.patch_claim_config(&patch).await.unwrap(), None);
        assert!(store.create_claim_config(&ClaimConfiguration::default()).await.unwrap());
        assert!(!store.create_claim_config(&ClaimConfiguration::default()).await.unwrap());
    }

    #[tokio::test]
    async fn claim_config_patches_keep_each_others_fields() {
        let store = InMemoryIdentityStore::new();
        store.create_claim_config(&ClaimConfiguration::default()).await.unwrap();

        let no_email = ClaimConfigPatch {
            include_email: Some(false),
            ..Default::default()
        };
        let no_username = ClaimConfigPatch {
            include_username: Some(false),
            ..Default::default()
        };
        store.patch_claim_config(&no_email).await.unwrap();
        let row = store.patch_claim_config(&no_username).await.unwrap().unwrap();

        assert!(!row.include_email);
        assert!(!row.include_username);
        assert!(row.include_user_id);
        assert_eq!(row.token_expiry, "24h");
    }
}
