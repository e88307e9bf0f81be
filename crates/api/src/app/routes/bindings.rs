//! Listings of every binding, joined with the names on both sides.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::{errors, services::AppServices};

/// GET /api/app-roles
pub async fn list_app_roles(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.graph.app_roles(None).await {
        Ok(app_roles) => {
            (StatusCode::OK, Json(serde_json::json!({ "appRoles": app_roles }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /api/user-applications
pub async fn list_user_applications(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.graph.user_applications(None).await {
        Ok(bindings) => (
            StatusCode::OK,
            Json(serde_json::json!({ "userApplications": bindings })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
