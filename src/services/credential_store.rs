use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::password::PasswordService;
use crate::database::{with_timeout, UserStore};
use crate::error::{ApiError, Result};
use crate::middleware::metrics::{track_auth_attempt, track_auth_failure};
use crate::models::user::normalize_email;
use crate::models::User;

/// Looks up users and checks passwords against their bcrypt hashes
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    timeout: Duration,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self { users, timeout }
    }

    /// Case-insensitive, surrounding whitespace ignored
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Ok(None);
        }

        with_timeout(self.timeout, "find_user_by_email", self.users.find_user_by_email(&email)).await
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        with_timeout(self.timeout, "find_user_by_id", self.users.find_user_by_id(id)).await
    }

    /// Unknown email and wrong password fail with the same error.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User> {
        let user = self.find_user_by_email(email).await?;
        let password = password.to_owned();

        let Some(user) = user else {
            debug!("Login for unknown email");
            tokio::task::spawn_blocking(move || PasswordService::verify_against_dummy(&password))
                .await
                .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))?;
            track_auth_attempt(false, "password");
            track_auth_failure("unknown_email");
            return Err(ApiError::invalid_credentials());
        };

        let password_hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || {
            PasswordService::verify_password(&password, &password_hash)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))??;

        if matches {
            info!("✅ Password verified for user {}", user.id);
            track_auth_attempt(true, "password");
            Ok(user)
        } else {
            warn!("❌ Invalid password for user {}", user.id);
            track_auth_attempt(false, "password");
            track_auth_failure("invalid_password");
            Err(ApiError::invalid_credentials())
        }
    }
}
