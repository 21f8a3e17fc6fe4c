use bcrypt::{hash, verify, DEFAULT_COST};
use once_cell::sync::Lazy;
use tracing::error;

use crate::error::{ApiError, Result};

/// Verified against when the email is unknown so both login failures cost
/// one bcrypt round.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash("not-a-real-password", DEFAULT_COST).ok());

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String> {
        Self::hash_password_with_cost(password, DEFAULT_COST)
    }

    pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String> {
        hash(password, cost).map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal("Password hashing failed".to_string())
        })
    }

    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        verify(password, password_hash).map_err(|e| {
            error!("Password verification failed: {}", e);
            ApiError::Internal("Password verification failed".to_string())
        })
    }

    /// Burns the same work as a real verification. Always false.
    pub fn verify_against_dummy(password: &str) -> bool {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            let _ = verify(password, dummy);
        }
        false
    }
}
