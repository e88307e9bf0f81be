use axum::{
    async_trait,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, de::DeserializeOwned};

use iacp_core::{AppId, RoleId, UserId};
use iacp_infra::{NewAccount, ProfileUpdate};

use crate::app::errors;

// -------------------------
// Extractors
// -------------------------

/// `Json<T>` whose rejections are `{ "error": ... }` bodies with status 400.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    let message = match &rejection {
        JsonRejection::JsonDataError(e) => format!("Invalid request body: {}", e.body_text()),
        JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_string(),
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".to_string()
        }
        other => other.body_text(),
    };
    errors::json_error(StatusCode::BAD_REQUEST, message)
}

/// Parse a numeric path segment, answering `Invalid <what> ID` on failure.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr,
{
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, format!("Invalid {what} ID")))
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl From<RegisterRequest> for NewAccount {
    fn from(body: RegisterRequest) -> Self {
        NewAccount {
            username: body.username,
            email: body.email,
            phone: body.phone,
            password: body.password,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

impl From<UpdateUserRequest> for ProfileUpdate {
    fn from(body: UpdateUserRequest) -> Self {
        // Empty strings mean "leave unchanged".
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());
        ProfileUpdate {
            username: present(body.username),
            email: present(body.email),
            phone: present(body.phone),
            password: present(body.password),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    pub role_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    pub app_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignUserRequest {
    pub user_id: UserId,
}

// -------------------------
// Path helpers
// -------------------------

/// Identifier pair of a binding path such as `/:appId/roles/:roleId`.
pub fn app_and_role(app: &str, role: &str) -> Result<(AppId, RoleId), axum::response::Response> {
    match (app.parse(), role.parse()) {
        (Ok(app), Ok(role)) => Ok((app, role)),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "Invalid application ID or role ID",
        )),
    }
}

pub fn app_and_user(app: &str, user: &str) -> Result<(AppId, UserId), axum::response::Response> {
    match (app.parse(), user.parse()) {
        (Ok(app), Ok(user)) => Ok((app, user)),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "Invalid application ID or user ID",
        )),
    }
}
