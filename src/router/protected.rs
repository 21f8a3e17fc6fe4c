//! Protected routes that require a session token.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

use super::admin::admin_routes;
use crate::app_state::AppState;
use crate::auth::middleware::{require_admin_role, session_auth_middleware};
use crate::handlers::auth as auth_handlers;

/// Build protected routes. Admin routes additionally require the ADMIN role.
pub fn protected_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/logout", post(auth_handlers::logout))
        .route("/api/auth/me", get(auth_handlers::me))
        .nest(
            "/api/admin",
            admin_routes().route_layer(from_fn(require_admin_role)),
        )
        .route_layer(from_fn_with_state(app_state, session_auth_middleware))
}
