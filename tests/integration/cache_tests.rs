//! Conditional-request caching and compression tests.

use std::sync::Arc;

use axum::body::Body;
use flate2::read::{GzDecoder, ZlibDecoder};
use http::{Method, StatusCode};
use regex::Regex;
use std::io::Read;
use tower::ServiceExt;

use wikiserve::{Route, ServerConfig, COMPRESSION_THRESHOLD};

use super::test_utils::{body_bytes, build_router, get, ping_route, request, FixedBodyHandler};

fn fixed_route(size: usize) -> Route {
    Route::new(
        Method::GET,
        Regex::new(r"^/body$").unwrap(),
        Arc::new(FixedBodyHandler(size)),
    )
}

// =============================================================================
// Etag / 304 Revalidation
// =============================================================================

#[tokio::test]
async fn test_etag_round_trip_yields_304() {
    let mut config = ServerConfig::default();
    config.use_browser_cache = true;
    let router = build_router(config, vec![ping_route()], vec![]);

    // First request: 200 with a quoted Etag
    let response = router.clone().oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "max-age=0, must-revalidate"
    );
    let etag = response
        .headers()
        .get("etag")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    // Replay with If-None-Match: 304, empty body, no Content-Encoding
    let response = router
        .oneshot(request(
            Method::GET,
            "/ping",
            &[("If-None-Match", &etag)],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(response.headers().get("content-encoding").is_none());
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_stale_etag_gets_full_response() {
    let mut config = ServerConfig::default();
    config.use_browser_cache = true;
    let router = build_router(config, vec![ping_route()], vec![]);

    let response = router
        .oneshot(request(
            Method::GET,
            "/ping",
            &[("If-None-Match", "\"0123456789abcdef\"")],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), b"pong");
}

#[tokio::test]
async fn test_no_etag_when_cache_disabled() {
    let router = build_router(ServerConfig::default(), vec![ping_route()], vec![]);
    let response = router.oneshot(get("/ping")).await.unwrap();
    assert!(response.headers().get("etag").is_none());
    assert!(response.headers().get("cache-control").is_none());
}

// =============================================================================
// Compression Threshold
// =============================================================================

#[tokio::test]
async fn test_threshold_body_sent_identity() {
    let mut config = ServerConfig::default();
    config.gzip = true;
    let router = build_router(config, vec![fixed_route(COMPRESSION_THRESHOLD)], vec![]);

    let response = router
        .oneshot(request(
            Method::GET,
            "/body",
            &[("Accept-Encoding", "gzip")],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("content-encoding").is_none());
    assert_eq!(body_bytes(response).await.len(), COMPRESSION_THRESHOLD);
}

#[tokio::test]
async fn test_over_threshold_body_gzip_compressed() {
    let mut config = ServerConfig::default();
    config.gzip = true;
    let size = COMPRESSION_THRESHOLD + 1;
    let router = build_router(config, vec![fixed_route(size)], vec![]);

    let response = router
        .oneshot(request(
            Method::GET,
            "/body",
            &[("Accept-Encoding", "gzip")],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-encoding").unwrap(), "gzip");

    let compressed = body_bytes(response).await;
    assert!(compressed.len() < size, "compressible body must shrink");

    let mut decoded = Vec::new();
    GzDecoder::new(compressed.as_ref())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, vec![b'a'; size]);
}

#[tokio::test]
async fn test_deflate_preferred_when_offered() {
    let mut config = ServerConfig::default();
    config.gzip = true;
    let size = COMPRESSION_THRESHOLD + 1;
    let router = build_router(config, vec![fixed_route(size)], vec![]);

    let response = router
        .oneshot(request(
            Method::GET,
            "/body",
            &[("Accept-Encoding", "gzip, deflate")],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("content-encoding").unwrap(),
        "deflate"
    );

    let compressed = body_bytes(response).await;
    let mut decoded = Vec::new();
    ZlibDecoder::new(compressed.as_ref())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded.len(), size);
}

#[tokio::test]
async fn test_no_accept_encoding_sent_identity() {
    let mut config = ServerConfig::default();
    config.gzip = true;
    let size = COMPRESSION_THRESHOLD * 2;
    let router = build_router(config, vec![fixed_route(size)], vec![]);

    let response = router.oneshot(get("/body")).await.unwrap();
    assert!(response.headers().get("content-encoding").is_none());
    assert_eq!(body_bytes(response).await.len(), size);
}

#[tokio::test]
async fn test_gzip_disabled_sent_identity() {
    let router = build_router(
        ServerConfig::default(),
        vec![fixed_route(COMPRESSION_THRESHOLD * 2)],
        vec![],
    );

    let response = router
        .oneshot(request(
            Method::GET,
            "/body",
            &[("Accept-Encoding", "gzip, deflate")],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert!(response.headers().get("content-encoding").is_none());
}

// =============================================================================
// Cache + Compression Interaction
// =============================================================================

#[tokio::test]
async fn test_revalidation_wins_over_compression() {
    let mut config = ServerConfig::default();
    config.use_browser_cache = true;
    config.gzip = true;
    let size = COMPRESSION_THRESHOLD * 2;
    let router = build_router(config, vec![fixed_route(size)], vec![]);

    // Prime: compressed 200 with an Etag computed over the identity body
    let response = router
        .clone()
        .oneshot(request(
            Method::GET,
            "/body",
            &[("Accept-Encoding", "gzip")],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response
        .headers()
        .get("etag")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    // Revalidate: 304 with no body and no compression step at all
    let response = router
        .oneshot(request(
            Method::GET,
            "/body",
            &[("Accept-Encoding", "gzip"), ("If-None-Match", &etag)],
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(response.headers().get("content-encoding").is_none());
    assert!(body_bytes(response).await.is_empty());
}
