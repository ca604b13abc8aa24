//! Authentication and authorization gate tests: CSRF ordering, principal
//! evaluation and the built-in Basic authenticator.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http::{Method, StatusCode};
use tower::ServiceExt;

use wikiserve::{BasicAuthenticator, ServerConfig};

use super::test_utils::{
    body_string, build_router, get, ping_route, request, CountingAuthenticator,
};

// =============================================================================
// CSRF Gate
// =============================================================================

#[tokio::test]
async fn test_csrf_rejects_writes_before_authentication() {
    let (authenticator, calls) = CountingAuthenticator::new(Some("alice"));
    let router = build_router(
        ServerConfig::default(),
        vec![ping_route()],
        vec![authenticator],
    );

    let response = router
        .oneshot(request(Method::POST, "/ping", &[], Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_string(response).await.contains("X-Requested-With"));
    // The gate fired before the authenticator ever ran
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_csrf_header_admits_writes() {
    let (authenticator, calls) = CountingAuthenticator::new(Some("alice"));
    let router = build_router(
        ServerConfig::default(),
        vec![ping_route()],
        vec![authenticator],
    );

    let response = router
        .oneshot(request(
            Method::POST,
            "/ping",
            &[("X-Requested-With", "TiddlyWiki")],
            Body::empty(),
        ))
        .await
        .unwrap();
    // Past the gate: authenticated, authorized, then 404 (GET-only route)
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_csrf_disabled_skips_header_check() {
    let mut config = ServerConfig::default();
    config.csrf_disable = true;
    let router = build_router(config, vec![ping_route()], vec![]);

    let response = router
        .oneshot(request(Method::POST, "/ping", &[], Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_csrf_never_gates_reads() {
    let router = build_router(ServerConfig::default(), vec![ping_route()], vec![]);
    let response = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn test_anonymous_denied_without_anon_principal() {
    let mut config = ServerConfig::default();
    config.readers = Some("alice".to_string());
    let router = build_router(config, vec![ping_route()], vec![]);

    let response = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_string(response).await;
    assert!(body.contains("(anon)"));
    assert!(body.contains("not authorized"));
}

#[tokio::test]
async fn test_named_identity_denied_mentions_identity() {
    let (authenticator, _calls) = CountingAuthenticator::new(Some("bob"));
    let mut config = ServerConfig::default();
    config.readers = Some("alice".to_string());
    let router = build_router(config, vec![ping_route()], vec![authenticator]);

    let response = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_string(response).await.contains("'bob'"));
}

#[tokio::test]
async fn test_authenticated_sentinel_admits_any_identity() {
    let (authenticator, _calls) = CountingAuthenticator::new(Some("bob"));
    let mut config = ServerConfig::default();
    config.readers = Some("(authenticated)".to_string());
    let router = build_router(config, vec![ping_route()], vec![authenticator]);

    let response = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_explicit_username_admitted() {
    let (authenticator, _calls) = CountingAuthenticator::new(Some("alice"));
    let mut config = ServerConfig::default();
    config.readers = Some("alice,carol".to_string());
    let router = build_router(config, vec![ping_route()], vec![authenticator]);

    let response = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Basic Authenticator End to End
// =============================================================================

fn credentialed_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.username = Some("alice".to_string());
    config.password = Some("secret".to_string());
    config
}

fn basic_router(config: &ServerConfig) -> axum::Router {
    let authenticator = Arc::new(BasicAuthenticator::new(config, "TestWiki"));
    build_router(config.clone(), vec![ping_route()], vec![authenticator])
}

fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
}

#[tokio::test]
async fn test_basic_auth_challenge_without_header() {
    let config = credentialed_config();
    let router = basic_router(&config);

    let response = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(challenge.starts_with("Basic realm="));
}

#[tokio::test]
async fn test_basic_auth_valid_credentials() {
    let config = credentialed_config();
    let router = basic_router(&config);

    let header = basic_header("alice", "secret");
    let response = router
        .oneshot(request(
            Method::GET,
            "/ping",
            &[("Authorization", &header)],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "pong");
}

#[tokio::test]
async fn test_basic_auth_wrong_credentials() {
    let config = credentialed_config();
    let router = basic_router(&config);

    let header = basic_header("alice", "nope");
    let response = router
        .oneshot(request(
            Method::GET,
            "/ping",
            &[("Authorization", &header)],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_basic_auth_inactive_without_credentials() {
    // init returns Ok(false) when no credentials are configured, so the
    // authenticator is excluded and anonymous rules apply
    let config = ServerConfig::default();
    let authenticator = Arc::new(BasicAuthenticator::new(&config, "TestWiki"));
    let router = build_router(config, vec![ping_route()], vec![authenticator]);

    let response = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
