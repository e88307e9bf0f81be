use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use iacp_auth::ClaimConfigPatch;

use crate::app::dto::ApiJson;
use crate::app::{errors, services::AppServices};
use crate::context::CallerContext;

/// GET /api/config/claims (public)
pub async fn get_claims(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.claim_config.get().await {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /api/config/claims
///
/// Only the supplied fields change. Applies to tokens issued afterwards.
pub async fn update_claims(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    ApiJson(patch): ApiJson<ClaimConfigPatch>,
) -> axum::response::Response {
    let config = match services.claim_config.update(&patch).await {
        Ok(config) => config,
        Err(e) => return errors::service_error_to_response(e),
    };
    tracing::info!(actor = %caller.label(), "claim configuration updated");

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Claim configuration updated",
            "config": config,
        })),
    )
        .into_response()
}
