//! Integration tests for the session client's refresh pipeline.
//!
//! These drive the real client over HTTP against the in-process stub
//! backend; the stub counts refresh calls so single-flight behavior is
//! directly observable.

use std::time::Duration;

use marbelle_client::ApiError;
use marbelle_client::session::SessionEvent;
use marbelle_integration_tests::TestContext;

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn test_login_then_authenticated_request() {
    let ctx = TestContext::new().await;
    let profile = ctx.login().await;
    assert_eq!(profile.email.as_str(), "ada@example.com");
    assert!(ctx.session.is_authenticated());

    let fetched = ctx.dashboard().profile().await.expect("profile fetch");
    assert_eq!(fetched.first_name, "Ada");
    assert_eq!(ctx.backend.refresh_calls(), 0);
}

// ============================================================================
// Transparent Refresh
// ============================================================================

#[tokio::test]
async fn test_expired_access_token_is_refreshed_transparently() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    // Invalidate the access token server-side; the refresh token stays good.
    ctx.backend.expire_access_token();

    let profile = ctx.dashboard().profile().await.expect("profile fetch");
    assert_eq!(profile.last_name, "Lovelace");
    assert_eq!(ctx.backend.refresh_calls(), 1);

    // Token atomicity: the stored pair is the backend's current pair.
    let pair = ctx.store_pair();
    assert_eq!(pair.access_token(), ctx.backend.current_access_token());
    assert_eq!(pair.refresh_token(), ctx.backend.current_refresh_token());
    assert!(ctx.session.is_authenticated());
}

#[tokio::test]
async fn test_single_flight_refresh_for_concurrent_failures() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    ctx.backend.expire_access_token();
    // Widen the race window so every request fails while the one refresh is
    // still in flight.
    ctx.backend.set_refresh_delay(Duration::from_millis(100));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let dashboard = ctx.dashboard();
        handles.push(tokio::spawn(async move { dashboard.profile().await }));
    }

    for handle in handles {
        let profile = handle
            .await
            .expect("task completes")
            .expect("request succeeds after refresh");
        assert_eq!(profile.first_name, "Ada");
    }

    assert_eq!(
        ctx.backend.refresh_calls(),
        1,
        "five simultaneous 401s must produce exactly one refresh call"
    );
}

#[tokio::test]
async fn test_refresh_failure_rejects_all_and_ends_session() {
    let ctx = TestContext::new().await;
    ctx.login().await;
    let mut events = ctx.session.subscribe();

    ctx.backend.expire_access_token();
    ctx.backend.set_fail_refresh(true);
    ctx.backend.set_refresh_delay(Duration::from_millis(100));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let dashboard = ctx.dashboard();
        handles.push(tokio::spawn(async move { dashboard.profile().await }));
    }

    for handle in handles {
        let result = handle.await.expect("task completes");
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    assert_eq!(ctx.backend.refresh_calls(), 1);
    assert!(!ctx.session.is_authenticated(), "store must be cleared");

    // Exactly one session-ended notification.
    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("event arrives")
        .expect("channel open");
    assert_eq!(event, SessionEvent::Expired);
    assert!(events.try_recv().is_err());
}

// ============================================================================
// Retry Discipline
// ============================================================================

#[tokio::test]
async fn test_request_is_retried_at_most_once() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    // The backend now 401s every authenticated request, even with a fresh
    // token. The client must give up after one refresh + one retry.
    ctx.backend.set_always_unauthorized(true);

    let result = ctx.dashboard().profile().await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(ctx.backend.request_count("GET /auth/user/"), 2);
    assert_eq!(ctx.backend.refresh_calls(), 1);
}

#[tokio::test]
async fn test_unauthenticated_request_does_not_trigger_refresh() {
    let ctx = TestContext::new().await;

    let result = ctx.dashboard().profile().await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(ctx.backend.refresh_calls(), 0);
}

// ============================================================================
// Error Mapping
// ============================================================================

#[tokio::test]
async fn test_application_level_failure_maps_to_validation() {
    let ctx = TestContext::new().await;

    let result = ctx.auth().login("ada@example.com", "wrong-password").await;
    let Err(ApiError::Validation { message, errors }) = result else {
        panic!("expected validation error");
    };
    assert_eq!(message, "Login failed.");
    assert!(errors.is_some());
}
