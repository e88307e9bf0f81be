use axum::{Json, http::StatusCode, response::IntoResponse};

pub const SERVICE_NAME: &str = "IACP - Identity, Auth, Claim, Provider";

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "service": SERVICE_NAME })),
    )
}
