use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::response::NoContent;
use crate::app_state::AppState;
use crate::auth::middleware::AuthenticatedUser;
use crate::error::{handle_rejection, ApiError, Result};
use crate::models::UserProfile;

/// Login request. Fields are optional so a missing one is reported as 400.
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(max = 254))]
    #[schema(example = "admin@example.com")]
    pub email: Option<String>,

    #[validate(length(max = 72))]
    #[schema(example = "admin")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Send back as `x-session-token`
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::missing_field(field)),
    }
}

/// Exchange email and password for a session token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(request) = payload.map_err(handle_rejection)?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(format!("Validation error: {}", e)))?;

    let email = required(request.email, "email")?;
    let password = required(request.password, "password")?;

    info!("🔐 Login attempt");
    let user = state.credentials.verify_credentials(&email, &password).await?;
    let session = state.sessions.create_session(user.id).await?;
    info!("✅ User {} logged in", user.id);

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: session.user.profile(),
    }))
}

/// Revoke the presented session token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Missing or invalid session")
    ),
    security(("session_token" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<NoContent> {
    state.sessions.revoke_session(&auth.token).await?;
    info!("User {} logged out", auth.user.id);
    Ok(NoContent)
}

/// Profile of the session's user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Missing or invalid session")
    ),
    security(("session_token" = [])),
    tag = "auth"
)]
pub async fn me(auth: AuthenticatedUser) -> Json<UserProfile> {
    Json(auth.user.profile())
}
