//! Session lifecycle against the fake API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use secrecy::ExposeSecret;
use tienda_client::{
    ChangeEvent, ClientError, MemorySessionStore, Session, SessionStore, StoreClient, Subscription,
};
use tienda_integration_tests::{ANA_EMAIL, ANA_PASSWORD, ANA_USERNAME, FakeApi};

fn counter(client: &StoreClient, event: ChangeEvent) -> (Arc<AtomicUsize>, Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    let subscription = client.events().subscribe(event, move |_| {
        handle.fetch_add(1, Ordering::SeqCst);
    });
    (count, subscription)
}

#[tokio::test]
async fn test_login_stores_session_and_announces_it() {
    let api = FakeApi::start().await;
    let client = api.client();
    let (carts, _cart_sub) = counter(&client, ChangeEvent::CartUpdated);
    let (wishlists, _wishlist_sub) = counter(&client, ChangeEvent::WishlistUpdated);

    let session = client
        .login(ANA_EMAIL, ANA_PASSWORD)
        .await
        .expect("login should succeed");

    assert!(client.has_session());
    assert!(session.refresh_token.is_some());
    let user = session.user.expect("login returns the user");
    assert_eq!(user.name.as_deref(), Some(ANA_USERNAME));
    assert_eq!(carts.load(Ordering::SeqCst), 1);
    assert_eq!(wishlists.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_credentials_leave_client_anonymous() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();

    let err = client
        .login(ANA_EMAIL, "wrong-password")
        .await
        .expect_err("bad password must fail");

    assert!(matches!(err, ClientError::Rejected { status: 401, .. }));
    assert!(!client.has_session());
}

#[tokio::test]
async fn test_register_then_fetch_profile() {
    let api = FakeApi::start().await;
    let client = api.client();

    client
        .register("bruno@example.com", "bruno", "hunter22")
        .await
        .expect("register should succeed");
    let profile = client.profile().await.expect("profile should load");

    assert_eq!(profile.username, "bruno");
    assert_eq!(profile.email, "bruno@example.com");
    assert_eq!(api.hits("GET /api/dashboard"), 1);
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let api = FakeApi::start().await;
    let client = api.client();

    let err = client
        .register(ANA_EMAIL, "someone-else", "hunter22")
        .await
        .expect_err("email is taken");

    assert!(matches!(err, ClientError::Rejected { status: 409, .. }));
}

#[tokio::test]
async fn test_register_validates_before_sending() {
    let api = FakeApi::start().await;
    let client = api.client();

    let err = client
        .register("not-an-email", "bruno", "hunter22")
        .await
        .expect_err("malformed email");
    assert!(matches!(err, ClientError::Validation(_)));

    let err = client
        .register("bruno@example.com", "bruno", "123")
        .await
        .expect_err("short password");
    assert!(matches!(err, ClientError::Validation(_)));

    assert_eq!(api.hits("POST /api/auth/register"), 0);
}

#[tokio::test]
async fn test_refresh_replaces_access_token() {
    let api = FakeApi::start().await;
    let client = api.client();
    let before = client
        .login(ANA_EMAIL, ANA_PASSWORD)
        .await
        .expect("login should succeed");

    client.refresh_session().await.expect("refresh should succeed");

    let after = client.session().session().expect("still signed in");
    assert_ne!(
        after.access_token.expose_secret(),
        before.access_token.expose_secret()
    );
    client.fetch_cart().await.expect("new token is accepted");
}

#[tokio::test]
async fn test_rejected_token_clears_session() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();
    api.revoke_tokens();

    let err = client.fetch_cart().await.expect_err("token was revoked");

    assert!(matches!(err, ClientError::Unauthorized));
    assert!(err.requires_login());
    assert!(!client.has_session());
}

#[tokio::test]
async fn test_missing_session_never_reaches_server() {
    let api = FakeApi::start().await;
    let client = api.client();

    let err = client.fetch_cart().await.expect_err("no session");

    assert!(matches!(err, ClientError::SessionMissing));
    assert_eq!(api.hits("GET /api/cart"), 0);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();
    let (carts, _sub) = counter(&client, ChangeEvent::CartUpdated);

    client.logout().expect("first logout");
    client.logout().expect("second logout");

    assert!(!client.has_session());
    assert_eq!(carts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_timeout_keeps_session() {
    let api = FakeApi::start().await;
    let token = api.issue_token(ANA_EMAIL, 3600);
    let config = api.config().with_timeout(std::time::Duration::from_millis(200));
    let client = FakeApi::client_with(
        &config,
        MemorySessionStore::with_session(Session::new(token)),
    );
    api.set_delay(std::time::Duration::from_millis(800));

    let err = client.fetch_cart().await.expect_err("server is too slow");

    assert!(matches!(err, ClientError::NetworkFailure { timed_out: true, .. }));
    assert!(!err.requires_login());
    assert!(client.session().has_session());
}

#[tokio::test]
async fn test_password_reset_round_trip() {
    let api = FakeApi::start().await;
    let client = api.client();

    let token = client
        .request_password_reset(ANA_EMAIL)
        .await
        .expect("reset requested")
        .expect("token returned");
    client
        .reset_password(token.expose_secret(), "nueva-clave")
        .await
        .expect("password reset");

    let err = client
        .login(ANA_EMAIL, ANA_PASSWORD)
        .await
        .expect_err("old password no longer works");
    assert!(matches!(err, ClientError::Rejected { status: 401, .. }));
    client
        .login(ANA_EMAIL, "nueva-clave")
        .await
        .expect("new password works");

    // Reset tokens are single use.
    let err = client
        .reset_password(token.expose_secret(), "otra-clave")
        .await
        .expect_err("token already used");
    assert!(matches!(err, ClientError::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn test_password_reset_for_unknown_email() {
    let api = FakeApi::start().await;
    let client = api.client();

    let err = client
        .request_password_reset("nadie@example.com")
        .await
        .expect_err("no such account");

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_short_reset_password_never_reaches_server() {
    let api = FakeApi::start().await;
    let client = api.client();

    let err = client
        .reset_password("some-token", "123")
        .await
        .expect_err("too short");

    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(api.hits("POST /api/auth/reset-password"), 0);
}

#[tokio::test]
async fn test_failed_relogin_announces_cleared_session() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();
    let (carts, _cart_sub) = counter(&client, ChangeEvent::CartUpdated);
    let (wishlists, _wishlist_sub) = counter(&client, ChangeEvent::WishlistUpdated);

    client
        .login(ANA_EMAIL, "wrong-password")
        .await
        .expect_err("bad password must fail");

    assert!(!client.has_session());
    assert_eq!(carts.load(Ordering::SeqCst), 1);
    assert_eq!(wishlists.load(Ordering::SeqCst), 1);
}
