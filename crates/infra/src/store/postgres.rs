//! Postgres-backed identity store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation { constraint }` |
//! | Database (foreign key violation) | `23503` | `MissingReference { constraint }` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / network / decode | N/A | `Backend` |
//!
//! Cascading deletes of bindings are left to the `ON DELETE CASCADE` foreign
//! keys in `migrations/0001_identity.sql`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use iacp_auth::{ClaimConfigPatch, ClaimConfiguration};
use iacp_core::{
    AppId, AppRoleBinding, AppRoleView, Application, BindingId, Role, RoleId, User,
    UserApplicationBinding, UserApplicationView, UserId,
};

use super::r#trait::{
    ClaimConfigStore, CredentialStore, GraphStore, NewUser, StoreError, UserChanges,
};

const SCHEMA: &str = include_str!("../../migrations/0001_identity.sql");

const USER_COLUMNS: &str = "id, username, email, phone, password, created_at, updated_at";

/// Postgres-backed identity store.
///
/// Uniqueness and cascades are enforced by the database; this type only maps
/// rows and errors.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn fetch_user(&self, operation: &str, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        password_hash: row.try_get("password")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: RoleId::new(row.try_get("id")?),
        role_name: row.try_get("role_name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn application_from_row(row: &PgRow) -> Result<Application, sqlx::Error> {
    Ok(Application {
        id: AppId::new(row.try_get("id")?),
        app_name: row.try_get("app_name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn app_role_from_row(row: &PgRow) -> Result<AppRoleBinding, sqlx::Error> {
    Ok(AppRoleBinding {
        id: BindingId::new(row.try_get("id")?),
        app_id: AppId::new(row.try_get("app_id")?),
        role_id: RoleId::new(row.try_get("role_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_application_from_row(row: &PgRow) -> Result<UserApplicationBinding, sqlx::Error> {
    Ok(UserApplicationBinding {
        id: BindingId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        app_id: AppId::new(row.try_get("app_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn claim_config_from_row(row: &PgRow) -> Result<ClaimConfiguration, sqlx::Error> {
    Ok(ClaimConfiguration {
        include_username: row.try_get("include_username")?,
        include_email: row.try_get("include_email")?,
        include_user_id: row.try_get("include_user_id")?,
        token_expiry: row.try_get("token_expiry")?,
    })
}

fn map_rows<T>(
    operation: &str,
    rows: &[PgRow],
    f: impl Fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, StoreError> {
    rows.iter()
        .map(f)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| map_sqlx_error(operation, e))
}

#[async_trait]
impl CredentialStore for PostgresIdentityStore {
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, email, phone, password) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.password_hash)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_user", e))?;
        user_from_row(&row).map_err(|e| map_sqlx_error("insert_user", e))
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_id", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("user_by_id", e))
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("user_by_email", "email", email).await
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("user_by_username", "username", username).await
    }

    async fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("user_by_phone", "phone", phone).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        map_rows("list_users", &rows, user_from_row)
    }

    #[instrument(skip(self, changes), fields(user_id = %id), err)]
    async fn update_user(
        &self,
        id: UserId,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                password = COALESCE($5, password),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(changes.username)
            .bind(changes.email)
            .bind(changes.phone)
            .bind(changes.password_hash)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("update_user", e))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ClaimConfigStore for PostgresIdentityStore {
    async fn load_claim_config(&self) -> Result<Option<ClaimConfiguration>, StoreError> {
        let row = sqlx::query(
            "SELECT include_username, include_email, include_user_id, token_expiry FROM claim_config LIMIT 1",
        )
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_claim_config", e))?;
        row.as_ref()
            .map(claim_config_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("load_claim_config", e))
    }

    #[instrument(skip(self, config), err)]
    async fn create_claim_config(&self, config: &ClaimConfiguration) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO claim_config (include_username, include_email, include_user_id, token_expiry)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (singleton) DO NOTHING
            "#,
        )
        .bind(config.include_username)
        .bind(config.include_email)
        .bind(config.include_user_id)
        .bind(&config.token_expiry)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_claim_config", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, patch), err)]
    async fn patch_claim_config(
        &self,
        patch: &ClaimConfigPatch,
    ) -> Result<Option<ClaimConfiguration>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE claim_config SET
                include_username = COALESCE($1, include_username),
                include_email = COALESCE($2, include_email),
                include_user_id = COALESCE($3, include_user_id),
                token_expiry = COALESCE($4, token_expiry),
                updated_at = NOW()
            RETURNING include_username, include_email, include_user_id, token_expiry
            "#,
        )
        .bind(patch.include_username)
        .bind(patch.include_email)
        .bind(patch.include_user_id)
        .bind(patch.token_expiry.as_deref())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("patch_claim_config", e))?;
        row.as_ref()
            .map(claim_config_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("patch_claim_config", e))
    }
}

#[async_trait]
impl GraphStore for PostgresIdentityStore {
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query("SELECT id, role_name, created_at, updated_at FROM roles ORDER BY role_name")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        map_rows("list_roles", &rows, role_from_row)
    }

    async fn role_by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, role_name, created_at, updated_at FROM roles WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_id", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("role_by_id", e))
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, role_name, created_at, updated_at FROM roles WHERE role_name = $1")
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_name", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("role_by_name", e))
    }

    #[instrument(skip(self), err)]
    async fn insert_role(&self, name: &str) -> Result<Role, StoreError> {
        let row = sqlx::query(
            "INSERT INTO roles (role_name) VALUES ($1) RETURNING id, role_name, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        role_from_row(&row).map_err(|e| map_sqlx_error("insert_role", e))
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn rename_role(&self, id: RoleId, name: &str) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE roles SET role_name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, role_name, created_at, updated_at
            "#,
        )
        .bind(id.get())
        .bind(name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("rename_role", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("rename_role", e))
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_applications(&self) -> Result<Vec<Application>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, app_name, created_at, updated_at FROM applications ORDER BY app_name",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_applications", e))?;
        map_rows("list_applications", &rows, application_from_row)
    }

    async fn application_by_id(&self, id: AppId) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query("SELECT id, app_name, created_at, updated_at FROM applications WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("application_by_id", e))?;
        row.as_ref()
            .map(application_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("application_by_id", e))
    }

    async fn application_by_name(&self, name: &str) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query(
            "SELECT id, app_name, created_at, updated_at FROM applications WHERE app_name = $1",
        )
        .bind(name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("application_by_name", e))?;
        row.as_ref()
            .map(application_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("application_by_name", e))
    }

    #[instrument(skip(self), err)]
    async fn insert_application(&self, name: &str) -> Result<Application, StoreError> {
        let row = sqlx::query(
            "INSERT INTO applications (app_name) VALUES ($1) RETURNING id, app_name, created_at, updated_at",
        )
        .bind(name)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_application", e))?;
        application_from_row(&row).map_err(|e| map_sqlx_error("insert_application", e))
    }

    #[instrument(skip(self), fields(app_id = %id), err)]
    async fn rename_application(
        &self,
        id: AppId,
        name: &str,
    ) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE applications SET app_name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, app_name, created_at, updated_at
            "#,
        )
        .bind(id.get())
        .bind(name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("rename_application", e))?;
        row.as_ref()
            .map(application_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("rename_application", e))
    }

    #[instrument(skip(self), fields(app_id = %id), err)]
    async fn delete_application(&self, id: AppId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_application", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn app_role(
        &self,
        app: AppId,
        role: RoleId,
    ) -> Result<Option<AppRoleBinding>, StoreError> {
        let row = sqlx::query(
            "SELECT id, app_id, role_id, created_at, updated_at FROM app_roles WHERE app_id = $1 AND role_id = $2",
        )
        .bind(app.get())
        .bind(role.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("app_role", e))?;
        row.as_ref()
            .map(app_role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("app_role", e))
    }

    #[instrument(skip(self), fields(app_id = %app, role_id = %role), err)]
    async fn insert_app_role(&self, app: AppId, role: RoleId) -> Result<AppRoleBinding, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO app_roles (app_id, role_id) VALUES ($1, $2)
            RETURNING id, app_id, role_id, created_at, updated_at
            "#,
        )
        .bind(app.get())
        .bind(role.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_app_role", e))?;
        app_role_from_row(&row).map_err(|e| map_sqlx_error("insert_app_role", e))
    }

    #[instrument(skip(self), fields(app_id = %app, role_id = %role), err)]
    async fn delete_app_role(&self, app: AppId, role: RoleId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM app_roles WHERE app_id = $1 AND role_id = $2")
            .bind(app.get())
            .bind(role.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_app_role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn app_role_views(&self, app: Option<AppId>) -> Result<Vec<AppRoleView>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT ar.id, ar.app_id, ar.role_id, r.role_name, a.app_name, ar.created_at, ar.updated_at
            FROM app_roles ar
            INNER JOIN roles r ON r.id = ar.role_id
            INNER JOIN applications a ON a.id = ar.app_id
            WHERE $1::INTEGER IS NULL OR ar.app_id = $1
            ORDER BY ar.id
            "#,
        )
        .bind(app.map(AppId::get))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("app_role_views", e))?;
        map_rows("app_role_views", &rows, |row| {
            Ok(AppRoleView {
                id: BindingId::new(row.try_get("id")?),
                app_id: AppId::new(row.try_get("app_id")?),
                role_id: RoleId::new(row.try_get("role_id")?),
                role_name: row.try_get("role_name")?,
                app_name: row.try_get("app_name")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
    }

    async fn roles_for_app(&self, app: AppId) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.role_name, r.created_at, r.updated_at
            FROM app_roles ar
            INNER JOIN roles r ON r.id = ar.role_id
            WHERE ar.app_id = $1
            ORDER BY ar.id
            "#,
        )
        .bind(app.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_for_app", e))?;
        map_rows("roles_for_app", &rows, role_from_row)
    }

    async fn apps_for_role(&self, role: RoleId) -> Result<Vec<Application>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.app_name, a.created_at, a.updated_at
            FROM app_roles ar
            INNER JOIN applications a ON a.id = ar.app_id
            WHERE ar.role_id = $1
            ORDER BY ar.id
            "#,
        )
        .bind(role.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("apps_for_role", e))?;
        map_rows("apps_for_role", &rows, application_from_row)
    }

    async fn roles_for_apps(&self, apps: &[AppId]) -> Result<Vec<(AppId, Role)>, StoreError> {
        if apps.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = apps.iter().map(|a| a.get()).collect();
        let rows = sqlx::query(
            r#"
            SELECT ar.app_id, r.id, r.role_name, r.created_at, r.updated_at
            FROM app_roles ar
            INNER JOIN roles r ON r.id = ar.role_id
            WHERE ar.app_id = ANY($1)
            ORDER BY ar.id
            "#,
        )
        .bind(ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_for_apps", e))?;
        map_rows("roles_for_apps", &rows, |row| {
            Ok((AppId::new(row.try_get("app_id")?), role_from_row(row)?))
        })
    }

    async fn user_application(
        &self,
        user: UserId,
        app: AppId,
    ) -> Result<Option<UserApplicationBinding>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, app_id, created_at, updated_at FROM user_applications WHERE user_id = $1 AND app_id = $2",
        )
        .bind(user.get())
        .bind(app.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("user_application", e))?;
        row.as_ref()
            .map(user_application_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("user_application", e))
    }

    #[instrument(skip(self), fields(user_id = %user, app_id = %app), err)]
    async fn insert_user_application(
        &self,
        user: UserId,
        app: AppId,
    ) -> Result<UserApplicationBinding, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO user_applications (user_id, app_id) VALUES ($1, $2)
            RETURNING id, user_id, app_id, created_at, updated_at
            "#,
        )
        .bind(user.get())
        .bind(app.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user_application", e))?;
        user_application_from_row(&row).map_err(|e| map_sqlx_error("insert_user_application", e))
    }

    #[instrument(skip(self), fields(user_id = %user, app_id = %app), err)]
    async fn delete_user_application(&self, user: UserId, app: AppId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_applications WHERE user_id = $1 AND app_id = $2")
            .bind(user.get())
            .bind(app.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user_application", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_application_views(
        &self,
        app: Option<AppId>,
    ) -> Result<Vec<UserApplicationView>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT ua.id, ua.user_id, ua.app_id, u.username, u.email, a.app_name, ua.created_at, ua.updated_at
            FROM user_applications ua
            INNER JOIN users u ON u.id = ua.user_id
            INNER JOIN applications a ON a.id = ua.app_id
            WHERE $1::INTEGER IS NULL OR ua.app_id = $1
            ORDER BY ua.id
            "#,
        )
        .bind(app.map(AppId::get))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("user_application_views", e))?;
        map_rows("user_application_views", &rows, |row| {
            Ok(UserApplicationView {
                id: BindingId::new(row.try_get("id")?),
                user_id: UserId::new(row.try_get("user_id")?),
                app_id: AppId::new(row.try_get("app_id")?),
                username: row.try_get("username")?,
                email: row.try_get("email")?,
                app_name: row.try_get("app_name")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
    }

    async fn apps_for_user(&self, user: UserId) -> Result<Vec<Application>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.app_name, a.created_at, a.updated_at
            FROM user_applications ua
            INNER JOIN applications a ON a.id = ua.app_id
            WHERE ua.user_id = $1
            ORDER BY ua.id
            "#,
        )
        .bind(user.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("apps_for_user", e))?;
        map_rows("apps_for_user", &rows, application_from_row)
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation { constraint },
                Some("23503") => StoreError::MissingReference { constraint },
                _ => StoreError::Backend(format!(
                    "database error in {}: {}",
                    operation,
                    db_err.message()
                )),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
