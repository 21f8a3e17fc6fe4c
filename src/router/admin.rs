//! Admin-only routes. Mounted under `/api/admin` behind the session and
//! role checks in `protected.rs`.

use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::admin;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/monitoring", get(admin::monitoring))
        .route("/tokens", get(admin::tokens))
        .route("/update-kwh", post(admin::update_kwh))
        .route("/meters/{id}", get(admin::get_meter))
        .route("/meters/{id}/top-up", post(admin::top_up))
        .route("/meters/{id}/tokens", get(admin::token_history))
        .route(
            "/meters/{id}/usage",
            get(admin::usage_history).post(admin::record_usage),
        )
}
