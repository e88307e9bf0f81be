//! Applications and their role/user bindings.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};

use iacp_core::AppId;

use crate::app::dto::{self, ApiJson, ApplicationRequest, AssignRoleRequest, AssignUserRequest};
use crate::app::{errors, services::AppServices};
use crate::context::CallerContext;

const NAME_REQUIRED: &str = "Application name is required";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_applications).post(create_application))
        .route(
            "/:app_id",
            get(get_application)
                .put(update_application)
                .delete(delete_application),
        )
        .route("/:app_id/roles", get(list_app_roles).post(assign_role))
        .route("/:app_id/roles/:role_id", delete(unassign_role))
        .route("/:app_id/users", get(list_app_users).post(assign_user))
        .route("/:app_id/users/:user_id", delete(unassign_user))
}

fn app_id(raw: &str) -> Result<AppId, axum::response::Response> {
    dto::parse_id(raw, "application")
}

pub async fn list_applications(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.graph.list_applications().await {
        Ok(applications) => (
            StatusCode::OK,
            Json(serde_json::json!({ "applications": applications })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_application(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<ApplicationRequest>,
) -> axum::response::Response {
    let Some(name) = body.app_name else {
        return errors::json_error(StatusCode::BAD_REQUEST, NAME_REQUIRED);
    };

    match services.graph.create_application(&name).await {
        Ok(application) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Application created successfully",
                "application": application,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_application(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id = match app_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.graph.get_application(id).await {
        Ok(application) => (
            StatusCode::OK,
            Json(serde_json::json!({ "application": application })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_application(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
    ApiJson(body): ApiJson<ApplicationRequest>,
) -> axum::response::Response {
    let id = match app_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Some(name) = body.app_name else {
        return errors::json_error(StatusCode::BAD_REQUEST, NAME_REQUIRED);
    };

    match services.graph.rename_application(id, &name).await {
        Ok(application) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Application updated successfully",
                "application": application,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /api/applications/:appId
///
/// Role and user bindings of the application are removed with it.
pub async fn delete_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id = match app_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    if let Err(e) = services.graph.delete_application(id).await {
        return errors::service_error_to_response(e);
    }
    tracing::info!(actor = %caller.label(), app_id = %id, "application deleted");

    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Application deleted successfully" })),
    )
        .into_response()
}

// ---- app ↔ role ----

pub async fn list_app_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id = match app_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.graph.app_roles(Some(id)).await {
        Ok(app_roles) => {
            (StatusCode::OK, Json(serde_json::json!({ "appRoles": app_roles }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /api/applications/:appId/roles
///
/// Assigning a role that is already bound returns the existing binding.
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
    ApiJson(body): ApiJson<AssignRoleRequest>,
) -> axum::response::Response {
    let id = match app_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.graph.assign_role(id, body.role_id).await {
        Ok(app_role) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Role assigned to application successfully",
                "appRole": app_role,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn unassign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path((raw_app, raw_role)): Path<(String, String)>,
) -> axum::response::Response {
    let (app, role) = match dto::app_and_role(&raw_app, &raw_role) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };

    match services.graph.unassign_role(app, role).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "Role removed from application successfully" })),
        )
            .into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "App-role assignment not found"),
        Err(e) => errors::service_error_to_response(e),
    }
}

// ---- user ↔ application ----

pub async fn list_app_users(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id = match app_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.graph.user_applications(Some(id)).await {
        Ok(bindings) => (
            StatusCode::OK,
            Json(serde_json::json!({ "userApplications": bindings })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /api/applications/:appId/users
///
/// Assigning a user that is already bound returns the existing binding.
pub async fn assign_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
    ApiJson(body): ApiJson<AssignUserRequest>,
) -> axum::response::Response {
    let id = match app_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.graph.assign_user(id, body.user_id).await {
        Ok(binding) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "User assigned to application successfully",
                "userApplication": binding,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn unassign_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path((raw_app, raw_user)): Path<(String, String)>,
) -> axum::response::Response {
    let (app, user) = match dto::app_and_user(&raw_app, &raw_user) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };

    match services.graph.unassign_user(app, user).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "User removed from application successfully" })),
        )
            .into_response(),
        Ok(false) => {
            errors::json_error(StatusCode::NOT_FOUND, "User-application assignment not found")
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
