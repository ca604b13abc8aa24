//! Test utilities for integration tests.
//!
//! Provides request-builder helpers, simple route handlers and a
//! call-counting authenticator for verifying pipeline ordering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use regex::Regex;

use wikiserve::{
    AuthOutcome, Authenticator, HandlerError, MemoryStore, RequestState, Route, RouteHandler,
    ServerConfig, WikiServer,
};

// =============================================================================
// Server Builders
// =============================================================================

/// Build a router over an empty in-memory store.
pub fn build_router(
    config: ServerConfig,
    routes: Vec<Route>,
    authenticators: Vec<Arc<dyn Authenticator>>,
) -> Router {
    build_router_with_store(config, routes, authenticators, Arc::new(MemoryStore::new()))
}

/// Build a router over a caller-supplied store.
pub fn build_router_with_store(
    config: ServerConfig,
    routes: Vec<Route>,
    authenticators: Vec<Arc<dyn Authenticator>>,
    store: Arc<MemoryStore>,
) -> Router {
    let mut server = WikiServer::new(store, config);
    server.add_routes(routes);
    for authenticator in authenticators {
        server.add_authenticator(authenticator);
    }
    server.into_router()
}

/// A GET /ping → "pong" route, the smallest useful route table.
pub fn ping_route() -> Route {
    Route::new(
        Method::GET,
        Regex::new(r"^/ping$").unwrap(),
        Arc::new(PingHandler),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Responds 200 "pong" through the responder, so cache/compression
/// transforms apply.
pub struct PingHandler;

#[async_trait]
impl RouteHandler for PingHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        Ok(state
            .responder
            .send(
                StatusCode::OK,
                &[("Content-Type", "text/plain".to_string())],
                "pong",
            )
            .await)
    }
}

/// Responds with a fixed body of the given size, for threshold tests.
pub struct FixedBodyHandler(pub usize);

#[async_trait]
impl RouteHandler for FixedBodyHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        Ok(state
            .responder
            .send(
                StatusCode::OK,
                &[("Content-Type", "text/plain".to_string())],
                vec![b'a'; self.0],
            )
            .await)
    }
}

/// Echoes the framed text body back, for framing tests.
pub struct EchoTextHandler;

#[async_trait]
impl RouteHandler for EchoTextHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let text = state
            .body
            .as_text()
            .ok_or_else(|| HandlerError::InvalidBody("expected text framing".to_string()))?
            .to_string();
        Ok((StatusCode::OK, text).into_response())
    }
}

/// Echoes the framed raw body length, for framing tests.
pub struct EchoRawLenHandler;

#[async_trait]
impl RouteHandler for EchoRawLenHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let bytes = state
            .body
            .as_bytes()
            .ok_or_else(|| HandlerError::InvalidBody("expected raw framing".to_string()))?;
        Ok((StatusCode::OK, bytes.len().to_string()).into_response())
    }
}

/// Reads the raw stream itself, for stream-framing tests.
pub struct DrainStreamHandler;

#[async_trait]
impl RouteHandler for DrainStreamHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let body = state
            .body
            .take_stream()
            .ok_or_else(|| HandlerError::InvalidBody("expected stream framing".to_string()))?;
        let bytes = body
            .collect()
            .await
            .map_err(|err| HandlerError::Other(err.to_string()))?
            .to_bytes();
        Ok((StatusCode::OK, format!("streamed {} bytes", bytes.len())).into_response())
    }
}

/// Always fails, for 500-containment tests.
pub struct FailingHandler;

#[async_trait]
impl RouteHandler for FailingHandler {
    async fn handle(&self, _state: &mut RequestState) -> Result<Response, HandlerError> {
        Err(HandlerError::Other("boom".to_string()))
    }
}

// =============================================================================
// Counting Authenticator
// =============================================================================

/// An authenticator that counts its invocations and grants a fixed identity.
///
/// Used to assert that the CSRF gate runs before authentication ever does.
pub struct CountingAuthenticator {
    username: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl CountingAuthenticator {
    pub fn new(username: Option<&str>) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let authenticator = Arc::new(Self {
            username: username.map(str::to_string),
            calls: Arc::clone(&calls),
        });
        (authenticator, calls)
    }
}

#[async_trait]
impl Authenticator for CountingAuthenticator {
    fn init(&self) -> Result<bool, String> {
        Ok(true)
    }

    async fn authenticate(&self, state: &mut RequestState) -> AuthOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        state.authenticated_username = self.username.clone();
        AuthOutcome::Granted
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

/// A bare GET request.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// A request with arbitrary method, headers and body.
pub fn request(
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: impl Into<Body>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body.into()).unwrap()
}

/// Collect a response body into bytes.
pub async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Collect a response body into a UTF-8 string.
pub async fn body_string(response: Response) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}
