use axum::{
    Router,
    routing::{get, post},
};

pub mod applications;
pub mod auth;
pub mod bindings;
pub mod config;
pub mod roles;
pub mod system;
pub mod users;

/// Endpoints reachable without a bearer token. `/api/auth/me` and
/// `/api/auth/decode` verify tokens themselves.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/api/auth", auth::router())
        .route("/api/config/claims", get(config::get_claims))
}

/// Endpoints behind the bearer-token middleware.
pub fn protected_router() -> Router {
    Router::new()
        .route("/api/config/claims", post(config::update_claims))
        .nest("/api/users", users::router())
        .nest("/api/roles", roles::router())
        .nest("/api/applications", applications::router())
        .route("/api/app-roles", get(bindings::list_app_roles))
        .route("/api/user-applications", get(bindings::list_user_applications))
}
