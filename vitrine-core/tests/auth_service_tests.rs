/// Integration tests for the auth state machine
///
/// These run the full service against the in-memory store and the recording
/// email sender, covering the credential lifecycle end to end: sign-up,
/// verification gating, password reset, session invalidation, cascades,
/// and the authorization gate.
use std::sync::Arc;

use chrono::Duration;
use vitrine_core::auth::service::{AdminCreateUser, AdminUpdateUser};
use vitrine_core::auth::{
    AuthError, AuthPolicy, AuthService, AuthorizationGate, AuthzError, TokenError,
};
use vitrine_core::email::MockEmailSender;
use vitrine_core::store::{MemoryStore, SessionStore, UserStore};

const EMAIL: &str = "customer@example.com";
const PASSWORD: &str = "window-display-7";

fn harness(policy: AuthPolicy) -> (Arc<AuthService>, Arc<MemoryStore>, Arc<MockEmailSender>) {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(MockEmailSender::new());
    let service = Arc::new(AuthService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        mailer.clone(),
        policy,
    ));

    (service, store, mailer)
}

/// Pulls the raw token out of the most recent email body.
fn last_token(mailer: &MockEmailSender) -> String {
    let body = mailer.last().expect("an email should have been sent").html_body;
    let start = body.find("tok_").expect("email body should contain a token");
    body[start..start + 36].to_string()
}

#[tokio::test]
async fn test_sign_in_blocked_until_email_verified() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();

    // Correct credentials, unverified email: a distinct error class, so the
    // client can prompt "check your email" rather than "wrong password".
    let err = service.sign_in(EMAIL, PASSWORD, false).await.unwrap_err();
    assert!(matches!(err, AuthError::EmailNotVerified));

    let token = last_token(&mailer);
    let verification = service.verify_email(&token).await.unwrap();
    assert!(verification.session.is_some());

    let session = service.sign_in(EMAIL, PASSWORD, false).await.unwrap();
    assert!(session.id.starts_with("sess_"));

    let user = service.validate_session(&session.id).await.unwrap().unwrap();
    assert!(user.email_verified);
}

#[tokio::test]
async fn test_sign_up_auto_sign_in_policy() {
    let (service, _store, _mailer) = harness(AuthPolicy::default());

    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    let session = outcome.session.expect("auto sign-in should create a session");

    // The session is live even though the email is unverified; verification
    // remains a separate gate for sign-in.
    let user = service.validate_session(&session.id).await.unwrap().unwrap();
    assert_eq!(user.id, outcome.user_id);
    assert!(!user.email_verified);
}

#[tokio::test]
async fn test_sign_up_without_auto_sign_in() {
    let (service, _store, _mailer) = harness(AuthPolicy {
        auto_sign_in: false,
        ..Default::default()
    });

    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    assert!(outcome.session.is_none());
}

#[tokio::test]
async fn test_sign_up_email_conflict() {
    let (service, _store, _mailer) = harness(AuthPolicy::default());

    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();

    let err = service
        .sign_up("Customer@Example.COM", "another-password", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailConflict));
}

#[tokio::test]
async fn test_sign_up_weak_password() {
    let (service, _store, _mailer) = harness(AuthPolicy::default());

    let err = service.sign_up(EMAIL, "short", None).await.unwrap_err();
    assert!(matches!(err, AuthError::WeakPassword(_)));
}

#[tokio::test]
async fn test_invalid_credentials_are_indistinguishable() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    let token = last_token(&mailer);
    service.verify_email(&token).await.unwrap();

    // An account without a password can never complete password sign-in.
    service
        .admin_create_user(AdminCreateUser {
            email: "nopassword@example.com".to_string(),
            password: None,
            name: None,
            is_admin: false,
        })
        .await
        .unwrap();

    let wrong_password = service.sign_in(EMAIL, "wrong-password", false).await.unwrap_err();
    let unknown_email = service
        .sign_in("ghost@example.com", PASSWORD, false)
        .await
        .unwrap_err();
    let passwordless = service
        .sign_in("nopassword@example.com", PASSWORD, false)
        .await
        .unwrap_err();

    // Same variant, same message — no distinguishing signal in any of the
    // three cases.
    for err in [&wrong_password, &unknown_email, &passwordless] {
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert_eq!(wrong_password.to_string(), passwordless.to_string());
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    let token = last_token(&mailer);

    service.verify_email(&token).await.unwrap();

    let err = service.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::Token(TokenError::AlreadyUsed)));
}

#[tokio::test]
async fn test_expired_verification_token() {
    let (service, _store, mailer) = harness(AuthPolicy {
        verification_ttl: Duration::zero(),
        ..Default::default()
    });

    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    let token = last_token(&mailer);

    let err = service.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::Token(TokenError::Expired)));
}

#[tokio::test]
async fn test_password_reset_invalidates_all_sessions() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    service.verify_email(&last_token(&mailer)).await.unwrap();

    let desktop = service.sign_in(EMAIL, PASSWORD, false).await.unwrap();
    let phone = service.sign_in(EMAIL, PASSWORD, true).await.unwrap();

    service.request_password_reset(EMAIL).await.unwrap();
    let reset_token = last_token(&mailer);

    service
        .reset_password(&reset_token, "brand-new-password")
        .await
        .unwrap();

    // Every session from before the reset is dead.
    assert!(service.validate_session(&desktop.id).await.unwrap().is_none());
    assert!(service.validate_session(&phone.id).await.unwrap().is_none());

    // Old password out, new password in.
    let err = service.sign_in(EMAIL, PASSWORD, false).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    service
        .sign_in(EMAIL, "brand-new-password", false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_weak_reset_password_leaves_token_usable() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    service.verify_email(&last_token(&mailer)).await.unwrap();
    service.request_password_reset(EMAIL).await.unwrap();
    let reset_token = last_token(&mailer);

    let err = service.reset_password(&reset_token, "tiny").await.unwrap_err();
    assert!(matches!(err, AuthError::WeakPassword(_)));

    // The strength check runs before the consume, so the link still works.
    service
        .reset_password(&reset_token, "acceptable-password")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_request_for_unknown_email_is_success_shaped() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    let outcome = service
        .request_password_reset("nonexistent@example.com")
        .await
        .unwrap();
    assert!(outcome.email_error.is_none());
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_delete_account_cascades_sessions_and_tokens() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    let session = outcome.session.unwrap();
    let verification_token = last_token(&mailer);

    assert!(service.delete_account(outcome.user_id).await.unwrap());

    // Prior sessions no longer validate and pending tokens no longer
    // consume.
    assert!(service.validate_session(&session.id).await.unwrap().is_none());
    let err = service.verify_email(&verification_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Token(TokenError::NotFound)));
}

#[tokio::test]
async fn test_sign_out_is_idempotent() {
    let (service, _store, _mailer) = harness(AuthPolicy::default());

    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    let session = outcome.session.unwrap();

    service.sign_out(&session.id).await.unwrap();
    service.sign_out(&session.id).await.unwrap();
    service.sign_out("sess_never_existed").await.unwrap();

    assert!(service.validate_session(&session.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_email_failure_does_not_roll_back_sign_up() {
    let (service, store, mailer) = harness(AuthPolicy::default());

    mailer.set_fail(true);
    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    assert!(outcome.email_error.is_some());

    // The account exists and is retry-safe.
    let user = UserStore::find_by_email(store.as_ref(), EMAIL)
        .await
        .unwrap()
        .expect("account should have been committed");
    assert_eq!(user.id, outcome.user_id);

    // A failed resend is a real error — the send is the whole operation.
    let err = service.resend_verification_email(EMAIL).await.unwrap_err();
    assert!(matches!(err, AuthError::EmailDelivery(_)));

    // Once delivery recovers, the re-issued token completes the flow.
    mailer.set_fail(false);
    service.resend_verification_email(EMAIL).await.unwrap();
    let token = last_token(&mailer);
    let verification = service.verify_email(&token).await.unwrap();
    assert_eq!(verification.user_id, outcome.user_id);
}

#[tokio::test]
async fn test_resend_verification_is_success_shaped_for_unknown_and_verified() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    // Unknown email: nothing sent, no error.
    service
        .resend_verification_email("ghost@example.com")
        .await
        .unwrap();
    assert!(mailer.sent().is_empty());

    // Already verified: also a quiet no-op.
    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    service.verify_email(&last_token(&mailer)).await.unwrap();
    let sent_before = mailer.sent().len();
    service.resend_verification_email(EMAIL).await.unwrap();
    assert_eq!(mailer.sent().len(), sent_before);
}

#[tokio::test]
async fn test_validate_session_slides_expiry() {
    let (service, store, _mailer) = harness(AuthPolicy::default());

    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    let session = outcome.session.unwrap();

    // Shrink the recorded expiry, then watch validation push it back out to
    // the policy TTL.
    let near_expiry = chrono::Utc::now() + Duration::minutes(5);
    SessionStore::extend(store.as_ref(), &session.id, near_expiry)
        .await
        .unwrap();

    service.validate_session(&session.id).await.unwrap().unwrap();

    let refreshed = SessionStore::find(store.as_ref(), &session.id)
        .await
        .unwrap()
        .unwrap();
    assert!(refreshed.expires_at > near_expiry);
}

#[tokio::test]
async fn test_validate_session_drops_expired_and_orphaned() {
    let (service, store, _mailer) = harness(AuthPolicy::default());

    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    let session = outcome.session.unwrap();

    // Expired: validation reports unauthenticated and deletes the row.
    SessionStore::extend(
        store.as_ref(),
        &session.id,
        chrono::Utc::now() - Duration::seconds(1),
    )
    .await
    .unwrap();
    assert!(service.validate_session(&session.id).await.unwrap().is_none());
    assert!(SessionStore::find(store.as_ref(), &session.id)
        .await
        .unwrap()
        .is_none());

    // Orphaned: owner gone, session swept on sight.
    let orphan = vitrine_core::models::CreateSession {
        id: "sess_orphaned_session_0000000000000".to_string(),
        user_id: uuid::Uuid::new_v4(),
        remember: false,
        expires_at: chrono::Utc::now() + Duration::hours(1),
    };
    SessionStore::create(store.as_ref(), orphan).await.unwrap();
    assert!(service
        .validate_session("sess_orphaned_session_0000000000000")
        .await
        .unwrap()
        .is_none());
    assert!(SessionStore::find(store.as_ref(), "sess_orphaned_session_0000000000000")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_change_password_revokes_sessions() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    service.verify_email(&last_token(&mailer)).await.unwrap();
    let session = service.sign_in(EMAIL, PASSWORD, false).await.unwrap();

    assert!(service
        .change_password(outcome.user_id, "a-different-password")
        .await
        .unwrap());

    assert!(service.validate_session(&session.id).await.unwrap().is_none());
    service
        .sign_in(EMAIL, "a-different-password", false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_authorization_gate() {
    let (service, _store, mailer) = harness(AuthPolicy::default());
    let gate = AuthorizationGate::new(service.clone());

    // A regular customer passes the user gate but not the admin gate.
    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    service.verify_email(&last_token(&mailer)).await.unwrap();
    let customer_session = service.sign_in(EMAIL, PASSWORD, false).await.unwrap();

    let customer = gate.require_user(&customer_session.id).await.unwrap();
    assert!(!customer.is_admin);

    let err = gate.require_admin(&customer_session.id).await.unwrap_err();
    assert!(matches!(err, AuthzError::Forbidden));

    // An admin passes both gates.
    let admin = service
        .admin_create_user(AdminCreateUser {
            email: "staff@example.com".to_string(),
            password: Some("staff-password-1".to_string()),
            name: Some("Staff".to_string()),
            is_admin: true,
        })
        .await
        .unwrap();
    service
        .admin_update_user(
            admin.id,
            AdminUpdateUser {
                email_verified: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let admin_session = service
        .sign_in("staff@example.com", "staff-password-1", false)
        .await
        .unwrap();
    let authorized = gate.require_admin(&admin_session.id).await.unwrap();
    assert_eq!(authorized.id, admin.id);

    // No session at all.
    let err = gate.require_admin("sess_not_a_real_session").await.unwrap_err();
    assert!(matches!(err, AuthzError::Unauthenticated));
}

#[tokio::test]
async fn test_admin_password_update_revokes_sessions() {
    let (service, _store, mailer) = harness(AuthPolicy::default());

    let outcome = service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    service.verify_email(&last_token(&mailer)).await.unwrap();
    let session = service.sign_in(EMAIL, PASSWORD, false).await.unwrap();

    service
        .admin_update_user(
            outcome.user_id,
            AdminUpdateUser {
                password: Some("admin-chosen-password".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("user should exist");

    assert!(service.validate_session(&session.id).await.unwrap().is_none());
    service
        .sign_in(EMAIL, "admin-chosen-password", false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_purge_expired_sweeps_sessions_and_tokens() {
    let (service, _store, mailer) = harness(AuthPolicy {
        session_ttl: Duration::zero(),
        verification_ttl: Duration::zero(),
        ..Default::default()
    });

    // Session and token are both born expired under the zero TTLs.
    service.sign_up(EMAIL, PASSWORD, None).await.unwrap();
    assert!(!mailer.sent().is_empty());

    let report = service.purge_expired().await.unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(report.tokens, 1);
}
