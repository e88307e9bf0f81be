//! Administrative user management.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use iacp_core::UserId;

use crate::app::dto::{self, ApiJson, RegisterRequest, UpdateUserRequest};
use crate::app::{errors, services::AppServices};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/applications-roles", get(user_access))
}

pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.accounts.list().await {
        Ok(users) => (StatusCode::OK, Json(serde_json::json!({ "users": users }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /api/users
///
/// Same rules as registration, without issuing a token.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> axum::response::Response {
    match services.accounts.register(body.into()).await {
        Ok(user) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "User created successfully",
                "user": user,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match dto::parse_id(&raw_id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.accounts.get(id).await {
        Ok(user) => (StatusCode::OK, Json(serde_json::json!({ "user": user }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// PUT /api/users/:id
///
/// Partial update; empty strings leave the field unchanged.
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> axum::response::Response {
    let id: UserId = match dto::parse_id(&raw_id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.accounts.update(id, body.into()).await {
        Ok(user) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "User updated successfully",
                "user": user,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match dto::parse_id(&raw_id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    if let Err(e) = services.accounts.delete(id).await {
        return errors::service_error_to_response(e);
    }
    tracing::info!(actor = %caller.label(), user_id = %id, "user deleted");

    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "User deleted successfully" })),
    )
        .into_response()
}

/// GET /api/users/:id/applications-roles
pub async fn user_access(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw_id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match dto::parse_id(&raw_id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.graph.access_for(id).await {
        Ok(access) => (StatusCode::OK, Json(access)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
