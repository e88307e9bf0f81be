use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use iacp_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg),
        ServiceError::Unauthorized(msg) => json_error(StatusCode::UNAUTHORIZED, msg),
        ServiceError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, msg),
        ServiceError::Token(e) => {
            tracing::debug!(error = %e, "token rejected");
            json_error(StatusCode::UNAUTHORIZED, "Invalid or expired token")
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        ServiceError::Internal(msg) => {
            tracing::error!(error = %msg, "internal failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// `{ "error": message }` with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}

/// `{ "error": message, "details": details }` with the given status.
pub fn json_error_with_details(
    status: StatusCode,
    message: impl Into<String>,
    details: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": message.into(),
            "details": details.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use iacp_infra::StoreError;

    #[test]
    fn statuses_follow_the_error_kind() {
        let cases = [
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Conflict("taken".into()), StatusCode::CONFLICT),
            (ServiceError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (
                ServiceError::Store(StoreError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(service_error_to_response(err).status(), status);
        }
    }
}
