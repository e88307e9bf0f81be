//! Registration, login and token inspection.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};

use iacp_core::UserSummary;
use iacp_infra::ServiceError;

use crate::app::dto::{ApiJson, DecodeRequest, LoginRequest, RegisterRequest};
use crate::app::{errors, services::AppServices};
use crate::middleware::extract_bearer;

const TOKEN_REJECTED: &str = "Invalid or expired token";

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/decode", post(decode))
}

/// POST /api/auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> axum::response::Response {
    let user = match services.accounts.register(body.into()).await {
        Ok(user) => user,
        Err(e) => return errors::service_error_to_response(e),
    };

    let token = match services.tokens.issue_for(&user).await {
        Ok(token) => token,
        Err(e) => return errors::service_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "User registered successfully",
            "token": token,
            "user": UserSummary::from(&user),
        })),
    )
        .into_response()
}

/// POST /api/auth/login
///
/// Email, phone and password must all match; every mismatch gets the same 401.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> axum::response::Response {
    let user = match services
        .accounts
        .login(&body.email, &body.phone, &body.password)
        .await
    {
        Ok(user) => user,
        Err(e) => return errors::service_error_to_response(e),
    };

    let token = match services.tokens.issue_for(&user).await {
        Ok(token) => token,
        Err(e) => return errors::service_error_to_response(e),
    };

    let access = match services.graph.access_for(user.id).await {
        Ok(access) => access,
        Err(e) => return errors::service_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Login successful",
            "token": token,
            "user": UserSummary::from(&user),
            "applications": access.applications,
        })),
    )
        .into_response()
}

/// GET /api/auth/me
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(token) = extract_bearer(&headers) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, TOKEN_REJECTED);
    };

    let claims = match services.tokens.verify(token) {
        Ok(claims) => claims,
        Err(e) => return errors::service_error_to_response(e),
    };

    let user = match services.accounts.resolve_claims(&claims).await {
        Ok(user) => user,
        Err(e) => return errors::service_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "user": UserSummary::from(&user),
            "claims": claims,
        })),
    )
        .into_response()
}

/// POST /api/auth/decode
///
/// Debug helper: verifies the token and echoes its payload.
pub async fn decode(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<DecodeRequest>,
) -> axum::response::Response {
    match services.tokens.verify(&body.token) {
        Ok(decoded) => {
            (StatusCode::OK, Json(serde_json::json!({ "decoded": decoded }))).into_response()
        }
        Err(ServiceError::Token(e)) => {
            errors::json_error_with_details(StatusCode::UNAUTHORIZED, "Invalid token", e.to_string())
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
