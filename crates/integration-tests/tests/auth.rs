//! Integration tests for auth and dashboard flows.

use marbelle_client::ApiError;
use marbelle_client::api::{ProfileUpdate, RegistrationRequest};
use marbelle_client::session::CredentialStore;
use marbelle_core::UserId;
use marbelle_integration_tests::{TEST_EMAIL, TEST_PASSWORD, TestContext};

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_new_account() {
    let ctx = TestContext::new().await;

    let user_id = ctx
        .auth()
        .register(RegistrationRequest {
            email: "new@example.com".to_owned(),
            first_name: "Grace".to_owned(),
            last_name: "Hopper".to_owned(),
            company_name: None,
            phone: None,
            password: "sea-green-marble".to_owned(),
            password_confirm: "sea-green-marble".to_owned(),
        })
        .await
        .expect("registration succeeds");

    assert_eq!(user_id, UserId::new(2));
}

#[tokio::test]
async fn test_register_password_mismatch_surfaces_field_errors() {
    let ctx = TestContext::new().await;

    let result = ctx
        .auth()
        .register(RegistrationRequest {
            email: "new@example.com".to_owned(),
            first_name: "Grace".to_owned(),
            last_name: "Hopper".to_owned(),
            company_name: None,
            phone: None,
            password: "sea-green-marble".to_owned(),
            password_confirm: "something-else".to_owned(),
        })
        .await;

    let Err(ApiError::Validation { errors, .. }) = result else {
        panic!("expected validation error");
    };
    let errors = errors.expect("field errors present");
    assert!(errors.get("password_confirm").is_some());
}

// ============================================================================
// Login / Logout
// ============================================================================

#[tokio::test]
async fn test_malformed_email_is_rejected_before_any_request() {
    let ctx = TestContext::new().await;

    let result = ctx.auth().login("not-an-email", "whatever").await;
    assert!(matches!(result, Err(ApiError::Validation { .. })));
    assert_eq!(ctx.backend.request_count("POST /auth/login/"), 0);
}

#[tokio::test]
async fn test_logout_clears_local_session() {
    let ctx = TestContext::new().await;
    ctx.login().await;
    assert!(ctx.session.is_authenticated());

    ctx.auth().logout().await.expect("logout succeeds");
    assert!(!ctx.session.is_authenticated());
    assert!(ctx.store.credentials().is_none());

    // Requests after logout carry no token and never trigger a refresh.
    let result = ctx.dashboard().profile().await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(ctx.backend.refresh_calls(), 0);
}

// ============================================================================
// Dashboard
// ============================================================================

#[tokio::test]
async fn test_profile_update_refreshes_cached_profile() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let updated = ctx
        .dashboard()
        .update_profile(&ProfileUpdate {
            phone: Some("+4520123456".to_owned()),
            ..ProfileUpdate::default()
        })
        .await
        .expect("profile update succeeds");

    assert_eq!(updated.phone.as_deref(), Some("+4520123456"));

    let cached = ctx.session.cached_profile().expect("profile cached");
    assert_eq!(cached.phone.as_deref(), Some("+4520123456"));
}

#[tokio::test]
async fn test_change_password_end_to_end() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let wrong = ctx
        .dashboard()
        .change_password("not-the-password", "new-password-1")
        .await;
    assert!(matches!(wrong, Err(ApiError::Validation { .. })));

    ctx.dashboard()
        .change_password(TEST_PASSWORD, "new-password-1")
        .await
        .expect("password change succeeds");

    ctx.auth().logout().await.expect("logout");

    // The old password no longer works; the new one does.
    let stale = ctx.auth().login(TEST_EMAIL, TEST_PASSWORD).await;
    assert!(matches!(stale, Err(ApiError::Validation { .. })));
    ctx.auth()
        .login(TEST_EMAIL, "new-password-1")
        .await
        .expect("login with new password");
}
