use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::app_state::AppState;
use crate::error::{ApiError, ErrorCode};
use crate::middleware::metrics::track_auth_failure;
use crate::models::User;

pub const SESSION_HEADER: &str = "x-session-token";

/// `x-session-token`, falling back to `Authorization: Bearer`
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let token = from_header.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    });

    token.map(str::to_string)
}

/// Session authentication middleware
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()) else {
        track_auth_failure("missing_session");
        return ApiError::with_code(ErrorCode::SessionMissing, "Missing session token")
            .into_response();
    };

    match state.sessions.resolve_session(&token).await {
        Ok(Some(user)) => {
            debug!("Session resolved for user {}", user.id);
            request
                .extensions_mut()
                .insert(AuthenticatedUser { user, token });
            next.run(request).await
        }
        Ok(None) => {
            track_auth_failure("invalid_session");
            ApiError::with_code(ErrorCode::SessionInvalid, "Invalid or expired session")
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Role-based authorization middleware for admin access
pub async fn require_admin_role(
    user: AuthenticatedUser,
    request: Request<Body>,
    next: Next,
) -> Response {
    if user.user.is_admin() {
        next.run(request).await
    } else {
        warn!("User {} denied admin access", user.user.id);
        ApiError::Forbidden("Admin access required".to_string()).into_response()
    }
}

/// Extractor for the user resolved by `session_auth_middleware`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// The bearer value that authenticated this request
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("No authentication found".to_string()))
    }
}
