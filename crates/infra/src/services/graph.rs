//! Roles, applications, and the bindings between users, applications and roles.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use iacp_core::{
    AppId, AppName, AppRoleBinding, AppRoleView, Application, ApplicationWithRoles, Role, RoleId,
    RoleName, UserAccess, UserApplicationBinding, UserApplicationView, UserId,
};

use super::{ServiceError, ServiceResult};
use crate::store::{IdentityStore, StoreError, constraints};

const ROLE_NAME_TAKEN: &str = "Role with this name already exists";
const APP_NAME_TAKEN: &str = "Application with this name already exists";

#[derive(Clone)]
pub struct GraphService {
    store: Arc<dyn IdentityStore>,
}

impl GraphService {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    // ---- roles ----

    pub async fn list_roles(&self) -> ServiceResult<Vec<Role>> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn get_role(&self, id: RoleId) -> ServiceResult<Role> {
        self.store
            .role_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role"))
    }

    #[instrument(skip(self))]
    pub async fn create_role(&self, name: &str) -> ServiceResult<Role> {
        let name = RoleName::parse(name)?;
        if self.store.role_by_name(name.as_str()).await?.is_some() {
            return Err(ServiceError::Conflict(ROLE_NAME_TAKEN.into()));
        }
        let role = self
            .store
            .insert_role(name.as_str())
            .await
            .map_err(|e| conflict_as(e, ROLE_NAME_TAKEN))?;
        info!(role_id = %role.id, "created role");
        Ok(role)
    }

    #[instrument(skip(self))]
    pub async fn rename_role(&self, id: RoleId, name: &str) -> ServiceResult<Role> {
        let name = RoleName::parse(name)?;
        self.get_role(id).await?;
        if let Some(holder) = self.store.role_by_name(name.as_str()).await? {
            if holder.id != id {
                return Err(ServiceError::Conflict(ROLE_NAME_TAKEN.into()));
            }
        }
        self.store
            .rename_role(id, name.as_str())
            .await
            .map_err(|e| conflict_as(e, ROLE_NAME_TAKEN))?
            .ok_or_else(|| ServiceError::not_found("Role"))
    }

    /// Hard delete; every app-role binding of the role goes with it.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, id: RoleId) -> ServiceResult<()> {
        if !self.store.delete_role(id).await? {
            return Err(ServiceError::not_found("Role"));
        }
        info!(role_id = %id, "deleted role");
        Ok(())
    }

    // ---- applications ----

    pub async fn list_applications(&self) -> ServiceResult<Vec<Application>> {
        Ok(self.store.list_applications().await?)
    }

    pub async fn get_application(&self, id: AppId) -> ServiceResult<Application> {
        self.store
            .application_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Application"))
    }

    #[instrument(skip(self))]
    pub async fn create_application(&self, name: &str) -> ServiceResult<Application> {
        let name = AppName::parse(name)?;
        if self.store.application_by_name(name.as_str()).await?.is_some() {
            return Err(ServiceError::Conflict(APP_NAME_TAKEN.into()));
        }
        let app = self
            .store
            .insert_application(name.as_str())
            .await
            .map_err(|e| conflict_as(e, APP_NAME_TAKEN))?;
        info!(app_id = %app.id, "created application");
        Ok(app)
    }

    #[instrument(skip(self))]
    pub async fn rename_application(&self, id: AppId, name: &str) -> ServiceResult<Application> {
        let name = AppName::parse(name)?;
        self.get_application(id).await?;
        if let Some(holder) = self.store.application_by_name(name.as_str()).await? {
            if holder.id != id {
                return Err(ServiceError::Conflict(APP_NAME_TAKEN.into()));
            }
        }
        self.store
            .rename_application(id, name.as_str())
            .await
            .map_err(|e| conflict_as(e, APP_NAME_TAKEN))?
            .ok_or_else(|| ServiceError::not_found("Application"))
    }

    /// Hard delete; role and user bindings of the application go with it.
    #[instrument(skip(self))]
    pub async fn delete_application(&self, id: AppId) -> ServiceResult<()> {
        if !self.store.delete_application(id).await? {
            return Err(ServiceError::not_found("Application"));
        }
        info!(app_id = %id, "deleted application");
        Ok(())
    }

    // ---- app ↔ role ----

    /// Bind `role` to `app`. Re-assigning an existing pair returns the
    /// existing binding.
    #[instrument(skip(self))]
    pub async fn assign_role(&self, app: AppId, role: RoleId) -> ServiceResult<AppRoleBinding> {
        self.get_application(app).await?;
        self.get_role(role).await?;

        if let Some(existing) = self.store.app_role(app, role).await? {
            debug!("role already bound to application");
            return Ok(existing);
        }

        match self.store.insert_app_role(app, role).await {
            Ok(binding) => Ok(binding),
            Err(StoreError::UniqueViolation { .. }) => self
                .store
                .app_role(app, role)
                .await?
                .ok_or_else(|| ServiceError::Internal("app-role binding vanished".into())),
            Err(StoreError::MissingReference { constraint }) => Err(missing_parent(&constraint)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the binding; `false` when there was none.
    #[instrument(skip(self))]
    pub async fn unassign_role(&self, app: AppId, role: RoleId) -> ServiceResult<bool> {
        Ok(self.store.delete_app_role(app, role).await?)
    }

    /// Joined app-role rows, optionally for a single (existing) application.
    pub async fn app_roles(&self, app: Option<AppId>) -> ServiceResult<Vec<AppRoleView>> {
        if let Some(app) = app {
            self.get_application(app).await?;
        }
        Ok(self.store.app_role_views(app).await?)
    }

    pub async fn roles_for_app(&self, app: AppId) -> ServiceResult<Vec<Role>> {
        Ok(self.store.roles_for_app(app).await?)
    }

    pub async fn apps_for_role(&self, role: RoleId) -> ServiceResult<Vec<Application>> {
        self.get_role(role).await?;
        Ok(self.store.apps_for_role(role).await?)
    }

    // ---- user ↔ application ----

    /// Bind `user` to `app`. Re-assigning an existing pair returns the
    /// existing binding.
    #[instrument(skip(self))]
    pub async fn assign_user(
        &self,
        app: AppId,
        user: UserId,
    ) -> ServiceResult<UserApplicationBinding> {
        self.get_application(app).await?;
        if self.store.user_by_id(user).await?.is_none() {
            return Err(ServiceError::not_found("User"));
        }

        if let Some(existing) = self.store.user_application(user, app).await? {
            debug!("user already bound to application");
            return Ok(existing);
        }

        match self.store.insert_user_application(user, app).await {
            Ok(binding) => Ok(binding),
            Err(StoreError::UniqueViolation { .. }) => self
                .store
                .user_application(user, app)
                .await?
                .ok_or_else(|| ServiceError::Internal("user-application binding vanished".into())),
            Err(StoreError::MissingReference { constraint }) => Err(missing_parent(&constraint)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the binding; `false` when there was none.
    #[instrument(skip(self))]
    pub async fn unassign_user(&self, app: AppId, user: UserId) -> ServiceResult<bool> {
        Ok(self.store.delete_user_application(user, app).await?)
    }

    /// Joined user-application rows, optionally for a single (existing) application.
    pub async fn user_applications(
        &self,
        app: Option<AppId>,
    ) -> ServiceResult<Vec<UserApplicationView>> {
        if let Some(app) = app {
            self.get_application(app).await?;
        }
        Ok(self.store.user_application_views(app).await?)
    }

    /// Resolve user → applications → roles.
    ///
    /// Applications keep the order of the user's bindings; each carries every
    /// role bound to it (possibly none).
    #[instrument(skip(self))]
    pub async fn access_for(&self, user: UserId) -> ServiceResult<UserAccess> {
        if self.store.user_by_id(user).await?.is_none() {
            return Err(ServiceError::not_found("User"));
        }

        let apps = self.store.apps_for_user(user).await?;
        let ids: Vec<AppId> = apps.iter().map(|a| a.id).collect();

        let mut roles_by_app: HashMap<AppId, Vec<Role>> = HashMap::new();
        for (app, role) in self.store.roles_for_apps(&ids).await? {
            roles_by_app.entry(app).or_default().push(role);
        }

        let applications = apps
            .into_iter()
            .map(|app| {
                let roles = roles_by_app.remove(&app.id).unwrap_or_default();
                ApplicationWithRoles::new(app, roles)
            })
            .collect();

        Ok(UserAccess {
            user_id: user,
            applications,
        })
    }
}

fn conflict_as(err: StoreError, message: &str) -> ServiceError {
    match err {
        StoreError::UniqueViolation { .. } => ServiceError::Conflict(message.into()),
        other => other.into(),
    }
}

fn missing_parent(constraint: &str) -> ServiceError {
    match constraint {
        constraints::APP_ROLES_ROLE => ServiceError::not_found("Role"),
        constraints::USER_APPLICATIONS_USER => ServiceError::not_found("User"),
        _ => ServiceError::not_found("Application"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryIdentityStore;

    fn service() -> GraphService {
        GraphService::new(Arc::new(InMemoryIdentityStore::new()))
    }

    #[tokio::test]
    async fn role_names_are_unique() {
        let svc = service();
        svc.create_role("admin").await.unwrap();
        assert_eq!(
            svc.create_role("admin").await,
            Err(ServiceError::Conflict(ROLE_NAME_TAKEN.into()))
        );
    }

    #[tokio::test]
    async fn rename_to_own_name_is_allowed() {
        let svc = service();
        let role = svc.create_role("admin").await.unwrap();
        let renamed = svc.rename_role(role.id, "admin").await.unwrap();
        assert_eq!(renamed.role_name, "admin");

        svc.create_role("viewer").await.unwrap();
        assert_eq!(
            svc.rename_role(role.id, "viewer").await,
            Err(ServiceError::Conflict(ROLE_NAME_TAKEN.into()))
        );
    }

    #[tokio::test]
    async fn assign_requires_existing_parents() {
        let svc = service();
        let app = svc.create_application("crm").await.unwrap();
        assert_eq!(
            svc.assign_role(app.id, RoleId::new(5)).await,
            Err(ServiceError::NotFound("Role not found".into()))
        );
        assert_eq!(
            svc.assign_user(AppId::new(77), UserId::new(1)).await,
            Err(ServiceError::NotFound("Application not found".into()))
        );
    }

    #[tokio::test]
    async fn apps_for_role_follows_bindings() {
        let svc = service();
        let crm = svc.create_application("crm").await.unwrap();
        let erp = svc.create_application("erp").await.unwrap();
        let admin = svc.create_role("admin").await.unwrap();
        svc.assign_role(erp.id, admin.id).await.unwrap();
        svc.assign_role(crm.id, admin.id).await.unwrap();

        let names: Vec<_> = svc
            .apps_for_role(admin.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.app_name)
            .collect();
        assert_eq!(names, ["erp", "crm"]);
    }

    #[tokio::test]
    async fn roles_for_app_follows_bindings() {
        let svc = service();
        let crm = svc.create_application("crm").await.unwrap();
        let viewer = svc.create_role("viewer").await.unwrap();
        let admin = svc.create_role("admin").await.unwrap();
        svc.assign_role(crm.id, viewer.id).await.unwrap();
        svc.assign_role(crm.id, admin.id).await.unwrap();

        let names: Vec<_> = svc
            .roles_for_app(crm.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.role_name)
            .collect();
        assert_eq!(names, ["viewer", "admin"]);

        svc.unassign_role(crm.id, viewer.id).await.unwrap();
        assert_eq!(svc.roles_for_app(crm.id).await.unwrap(), vec![admin]);
    }
}
