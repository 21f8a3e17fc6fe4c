use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::database::{with_timeout, SessionStore, UserStore};
use crate::error::{ApiError, Result};
use crate::models::{IssuedSession, Session, User};

const TOKEN_BYTES: usize = 32;
const MAX_ISSUE_ATTEMPTS: usize = 3;
/// Upper clamp for the session lifetime, ten years
const MAX_TTL_SECS: i64 = 315_360_000;

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of the bearer value. This is the only form that is stored.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Issues, resolves and revokes opaque session tokens
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    ttl: chrono::Duration,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        ttl_secs: i64,
        timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            ttl: chrono::Duration::seconds(ttl_secs.clamp(0, MAX_TTL_SECS)),
            timeout,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Fails with a persistence error if the user does not exist.
    pub async fn create_session(&self, user_id: i64) -> Result<IssuedSession> {
        let user = with_timeout(self.timeout, "find_user_by_id", self.users.find_user_by_id(user_id))
            .await?
            .ok_or_else(|| ApiError::Persistence(format!("Session owner {} does not exist", user_id)))?;

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let token = generate_token();
            let created_at = Utc::now();
            let session = Session {
                token_hash: token_digest(&token),
                user_id,
                created_at,
                expires_at: created_at + self.ttl,
                revoked_at: None,
            };
            let expires_at = session.expires_at;

            match with_timeout(self.timeout, "insert_session", self.sessions.insert_session(session)).await {
                Ok(()) => {
                    info!("Session issued for user {} (expires {})", user_id, expires_at);
                    return Ok(IssuedSession {
                        token,
                        created_at,
                        expires_at,
                        user,
                    });
                }
                Err(ApiError::Conflict(_)) => {
                    warn!(attempt, "Session token collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        error!("Could not issue a unique session token for user {}", user_id);
        Err(ApiError::Persistence("Could not issue a unique session token".to_string()))
    }

    /// `None` for unknown, malformed, expired or revoked tokens. Only store
    /// failures are errors.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<User>> {
        let token = token.trim();
        if !is_well_formed(token) {
            debug!("Rejected malformed session token");
            return Ok(None);
        }

        let digest = token_digest(token);
        let Some(session) =
            with_timeout(self.timeout, "find_session", self.sessions.find_session(&digest)).await?
        else {
            return Ok(None);
        };

        if !session.is_active(Utc::now()) {
            debug!("Session for user {} is no longer active", session.user_id);
            return Ok(None);
        }

        with_timeout(self.timeout, "find_user_by_id", self.users.find_user_by_id(session.user_id)).await
    }

    /// Returns whether a live session was revoked
    pub async fn revoke_session(&self, token: &str) -> Result<bool> {
        let token = token.trim();
        if !is_well_formed(token) {
            return Ok(false);
        }

        let revoked = with_timeout(
            self.timeout,
            "revoke_session",
            self.sessions.revoke_session(&token_digest(token), Utc::now()),
        )
        .await?;

        if revoked {
            info!("Session revoked");
        }
        Ok(revoked)
    }

    /// Deletes expired and revoked sessions
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = with_timeout(
            self.timeout,
            "delete_inactive_sessions",
            self.sessions.delete_inactive_sessions(Utc::now()),
        )
        .await?;

        if removed > 0 {
            info!("Purged {} inactive sessions", removed);
        }
        Ok(removed)
    }

    pub fn start_purge_task(&self, every: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = manager.purge_expired().await {
                    error!("Session purge failed: {}", e);
                }
            }
        })
    }
}
