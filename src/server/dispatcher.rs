//! The per-request dispatch pipeline.
//!
//! Every connection lands here via the router's fallback handler. For each
//! request the pipeline runs strictly in sequence:
//!
//! ```text
//! parse URL → CSRF gate → authenticate → authorize → match route
//!           → frame body → invoke handler → finalize response
//! ```
//!
//! Alternate exits: 403 (CSRF header missing on a write), 401 (identity not
//! authorized, message names the attempted identity), 404 (no route), 413
//! (body over the configured cap), 500 (handler failure, contained). No
//! body bytes are read before the authentication and authorization gates
//! have passed; the CSRF check is cheapest and runs first.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use tracing::{debug, error};

use crate::config::ServerConfig;
use crate::wiki::WikiStore;

use super::auth::AuthOutcome;
use super::authorization::{AuthorizationPolicy, PermissionClass};
use super::lifecycle::WikiServer;
use super::response::Responder;
use super::route::BodyFormat;

/// Header a same-origin programmatic client must send on write methods.
pub const CSRF_HEADER: &str = "x-requested-with";

/// Required value of the CSRF header.
pub const CSRF_HEADER_VALUE: &str = "TiddlyWiki";

// =============================================================================
// Request State
// =============================================================================

/// The request body as framed for the matched route.
#[derive(Debug)]
pub enum RequestBody {
    /// Raw, unread body; `Stream` routes and all GET/HEAD requests
    Unread(Body),

    /// Fully buffered and decoded as UTF-8 text
    Text(String),

    /// Fully buffered raw bytes
    Raw(Bytes),
}

impl RequestBody {
    /// The buffered text, for `Text`-framed routes.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RequestBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The buffered bytes, for `Raw`-framed routes.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Take the raw body out, for `Stream`-framed routes.
    pub fn take_stream(&mut self) -> Option<Body> {
        match std::mem::replace(self, RequestBody::Raw(Bytes::new())) {
            RequestBody::Unread(body) => Some(body),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// Ephemeral per-request state, created by the dispatcher and owned by it
/// for the request's lifetime.
pub struct RequestState {
    /// Wiki store handle for handlers
    pub wiki: Arc<dyn WikiStore>,

    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Authorization policy, so handlers can answer questions like
    /// "is this request read-only?"
    pub policy: Arc<AuthorizationPolicy>,

    /// Request method
    pub method: Method,

    /// Full request path, before prefix stripping
    pub path: String,

    /// Decoded query parameters in order of appearance
    pub query_parameters: Vec<(String, String)>,

    /// Path prefix in force for this request
    pub path_prefix: String,

    /// Positional captures from the matched route pattern; `None` marks an
    /// optional group that did not participate
    pub params: Vec<Option<String>>,

    /// Identity resolved by the authenticator, `None` when anonymous
    pub authenticated_username: Option<String>,

    /// Whether the required permission class admits anonymous access
    pub allow_anon: bool,

    /// Request headers
    pub headers: HeaderMap,

    /// The framed request body
    pub body: RequestBody,

    /// Response finalizer bound to this request
    pub responder: Responder,

    /// Server display name, used in handler responses
    pub server_name: String,
}

impl RequestState {
    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Positional capture, flattened over the optional-group `None`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).and_then(|p| p.as_deref())
    }

    /// Whether the authenticated identity lacks write permission.
    pub fn is_read_only(&self) -> bool {
        !self.policy.is_authorized(
            PermissionClass::Writers,
            self.authenticated_username.as_deref(),
        )
    }

    #[cfg(test)]
    pub(crate) fn for_tests(headers: HeaderMap) -> Self {
        Self {
            wiki: Arc::new(crate::wiki::MemoryStore::new()),
            config: Arc::new(ServerConfig::default()),
            policy: Arc::new(AuthorizationPolicy::from_config(&ServerConfig::default())),
            method: Method::GET,
            path: "/".to_string(),
            query_parameters: Vec::new(),
            path_prefix: String::new(),
            params: Vec::new(),
            authenticated_username: None,
            allow_anon: true,
            headers,
            body: RequestBody::Unread(Body::empty()),
            responder: Responder::disabled(),
            server_name: "TestWiki".to_string(),
        }
    }
}

// =============================================================================
// Dispatch Entry Point
// =============================================================================

/// Axum fallback handler: every method and path funnels into the pipeline.
pub(crate) async fn dispatch(State(server): State<Arc<WikiServer>>, request: Request) -> Response {
    server.handle_request(request).await
}

impl WikiServer {
    /// Run one request through the pipeline.
    pub(crate) async fn handle_request(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();

        // 1. Parse URL and query string unconditionally
        let path = parts.uri.path().to_string();
        let query_parameters: Vec<(String, String)> = parts
            .uri
            .query()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        // 2. Which permission class does this method need?
        let authorization_type = AuthorizationPolicy::required_permission(&parts.method);

        // 3. CSRF gate, before anything else touches the request
        if authorization_type == PermissionClass::Writers && !self.csrf_disable() {
            let header_ok = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|value| value.to_str().ok())
                == Some(CSRF_HEADER_VALUE);
            if !header_ok {
                return plain_response(
                    StatusCode::FORBIDDEN,
                    format!(
                        "'X-Requested-With' header required to login to '{}'",
                        self.server_name()
                    ),
                );
            }
        }

        let responder = Responder::new(
            self.browser_cache_enabled(),
            self.gzip_enabled(),
            &parts.headers,
        );
        let mut state = RequestState {
            wiki: self.wiki(),
            config: self.config(),
            policy: self.policy(),
            method: parts.method.clone(),
            path: path.clone(),
            query_parameters,
            path_prefix: self.path_prefix().to_string(),
            params: Vec::new(),
            authenticated_username: None,
            // 4. Whether anonymous access would suffice
            allow_anon: self.policy().is_authorized(authorization_type, None),
            headers: parts.headers,
            body: RequestBody::Unread(body),
            responder,
            server_name: self.server_name().to_string(),
        };

        // 5. Only the first registered authenticator runs
        if let Some(authenticator) = self.authenticators().first() {
            match authenticator.authenticate(&mut state).await {
                AuthOutcome::Granted => {}
                AuthOutcome::Challenge(response) => return response,
            }
        }

        // 6. Authorize the resolved identity
        if !self
            .policy()
            .is_authorized(authorization_type, state.authenticated_username.as_deref())
        {
            return plain_response(
                StatusCode::UNAUTHORIZED,
                format!(
                    "'{}' is not authorized to access '{}'",
                    state.authenticated_username.as_deref().unwrap_or("(anon)"),
                    self.server_name()
                ),
            );
        }

        // 7. Find the route
        let matched = self
            .routes()
            .find_matching_route(&state.method, &path, self.path_prefix());

        if self.debug_enabled() {
            debug!(
                path = %state.path,
                headers = ?state.headers,
                username = state.authenticated_username.as_deref().unwrap_or("(anon)"),
                "request"
            );
        }

        let Some((route, params)) = matched else {
            return plain_response(StatusCode::NOT_FOUND, String::new());
        };
        state.params = params;

        // 8. Frame the body per the route's contract. GET/HEAD always hand
        // the stream through untouched.
        let wants_stream = route.body_format == BodyFormat::Stream
            || state.method == Method::GET
            || state.method == Method::HEAD;
        if !wants_stream {
            let raw = state.body.take_stream().unwrap_or_else(Body::empty);
            let limit = match self.max_request_body() {
                0 => usize::MAX,
                cap => cap as usize,
            };
            let buffered = match axum::body::to_bytes(raw, limit).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!(error = %err, "request body rejected while buffering");
                    return plain_response(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "Request body exceeds the configured limit".to_string(),
                    );
                }
            };
            state.body = if route.body_format == BodyFormat::Raw {
                RequestBody::Raw(buffered)
            } else {
                RequestBody::Text(String::from_utf8_lossy(&buffered).into_owned())
            };
        }

        // 9. The handler owns the response from here; failures are contained
        let handler = Arc::clone(&route.handler);
        match handler.handle(&mut state).await {
            Ok(response) => response,
            Err(err) => {
                error!(
                    path = %state.path,
                    method = %state.method,
                    error = %err,
                    "route handler failed"
                );
                plain_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

fn plain_response(status: StatusCode, message: String) -> Response {
    if message.is_empty() {
        status.into_response()
    } else {
        (status, message).into_response()
    }
}
