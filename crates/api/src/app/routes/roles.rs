use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use iacp_core::RoleId;

use crate::app::dto::{self, ApiJson, RoleRequest};
use crate::app::{errors, services::AppServices};
use crate::context::CallerContext;

const NAME_REQUIRED: &str = "Role name is required";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/:id", get(get_role).put(update_role).delete(delete_role))
        .route("/:id/applications", get(role_applications))
}

pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.graph.list_roles().await {
        Ok(roles) => (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> axum::response::Response {
    let Some(name) = body.role_name else {
        return errors::json_error(StatusCode::BAD_REQUEST, NAME_REQUIRED);
    };

    match services.graph.create_role(&name).await {
        Ok(role) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Role created successfully",
                "role": role,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id: RoleId = match dto::parse_id(&raw_id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.graph.get_role(id).await {
        Ok(role) => (StatusCode::OK, Json(serde_json::json!({ "role": role }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// PUT /api/roles/:id
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> axum::response::Response {
    let id: RoleId = match dto::parse_id(&raw_id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Some(name) = body.role_name else {
        return errors::json_error(StatusCode::BAD_REQUEST, NAME_REQUIRED);
    };

    match services.graph.rename_role(id, &name).await {
        Ok(role) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Role updated successfully",
                "role": role,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /api/roles/:id
///
/// Every app-role binding of the role is removed with it.
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id: RoleId = match dto::parse_id(&raw_id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    if let Err(e) = services.graph.delete_role(id).await {
        return errors::service_error_to_response(e);
    }
    tracing::info!(actor = %caller.label(), role_id = %id, "role deleted");

    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Role deleted successfully" })),
    )
        .into_response()
}

/// GET /api/roles/:id/applications
pub async fn role_applications(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id: RoleId = match dto::parse_id(&raw_id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.graph.apps_for_role(id).await {
        Ok(applications) => (
            StatusCode::OK,
            Json(serde_json::json!({ "applications": applications })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
