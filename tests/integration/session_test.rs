// Session Integration Test
// Login, session issue/resolve/revoke/expiry and purge against the in-memory store

use std::sync::Arc;
use std::time::Duration;

use prepaid_meter_api::database::seed::seed_demo_data;
use prepaid_meter_api::database::schema::types::UserRole;
use prepaid_meter_api::database::MemoryStore;
use prepaid_meter_api::services::session_manager::generate_token;
use prepaid_meter_api::services::{CredentialStore, SessionManager};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Helper to seed the demo users and build the auth services
async fn seeded(ttl_secs: i64) -> (CredentialStore, SessionManager) {
    let store = Arc::new(MemoryStore::default());
    seed_demo_data(store.as_ref(), 4).await.unwrap();

    let credentials = CredentialStore::new(store.clone(), TIMEOUT);
    let sessions = SessionManager::new(store.clone(), store, ttl_secs, TIMEOUT);
    (credentials, sessions)
}

#[tokio::test]
async fn login_then_resolve_yields_same_user() {
    let (credentials, sessions) = seeded(3600).await;

    let user = credentials
        .verify_credentials("admin@example.com", "admin")
        .await
        .unwrap();
    let issued = sessions.create_session(user.id).await.unwrap();

    assert_eq!(issued.token.len(), 64);
    assert_eq!(issued.user.id, user.id);
    assert!(issued.expires_at > issued.created_at);

    let resolved = sessions.resolve_session(&issued.token).await.unwrap().unwrap();
    assert_eq!(resolved.id, user.id);
    assert_eq!(resolved.role, UserRole::Admin);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let (credentials, _) = seeded(3600).await;

    let wrong_password = credentials
        .verify_credentials("budi@example.com", "admin")
        .await
        .unwrap_err();
    let unknown_email = credentials
        .verify_credentials("nobody@example.com", "user")
        .await
        .unwrap_err();

    assert!(wrong_password.is_authentication());
    assert!(unknown_email.is_authentication());
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[tokio::test]
async fn email_lookup_ignores_case_and_whitespace() {
    let (credentials, _) = seeded(3600).await;

    let user = credentials
        .verify_credentials("  Adi@Example.COM ", "user")
        .await
        .unwrap();
    assert_eq!(user.name, "Adi Setiawan");
}

#[tokio::test]
async fn never_issued_and_malformed_tokens_resolve_to_none() {
    let (_, sessions) = seeded(3600).await;

    assert!(sessions.resolve_session(&generate_token()).await.unwrap().is_none());
    assert!(sessions.resolve_session("").await.unwrap().is_none());
    assert!(sessions.resolve_session("not-a-token").await.unwrap().is_none());
}

#[tokio::test]
async fn revoked_session_resolves_to_none() {
    let (_, sessions) = seeded(3600).await;
    let issued = sessions.create_session(2).await.unwrap();

    assert!(sessions.revoke_session(&issued.token).await.unwrap());
    assert!(sessions.resolve_session(&issued.token).await.unwrap().is_none());
    // Second revoke finds nothing live
    assert!(!sessions.revoke_session(&issued.token).await.unwrap());
}

#[tokio::test]
async fn expired_session_resolves_to_none_and_is_purged() {
    let (_, sessions) = seeded(0).await;
    let issued = sessions.create_session(1).await.unwrap();

    assert!(sessions.resolve_session(&issued.token).await.unwrap().is_none());
    assert_eq!(sessions.purge_expired().await.unwrap(), 1);
    assert_eq!(sessions.purge_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn sessions_are_independent() {
    let (_, sessions) = seeded(3600).await;
    let first = sessions.create_session(1).await.unwrap();
    let second = sessions.create_session(1).await.unwrap();
    assert_ne!(first.token, second.token);

    sessions.revoke_session(&first.token).await.unwrap();
    assert!(sessions.resolve_session(&second.token).await.unwrap().is_some());
    assert_eq!(sessions.purge_expired().await.unwrap(), 1);
}

#[tokio::test]
async fn session_for_missing_user_is_a_persistence_error() {
    let (_, sessions) = seeded(3600).await;

    let err = sessions.create_session(999).await.unwrap_err();
    assert!(err.is_persistence());
}
