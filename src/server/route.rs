//! Regex route table.
//!
//! Routes bind an HTTP method and a path regex to a handler. Matching is
//! strictly in registration order with the first full match winning; there
//! is no specificity ranking, deduplication or pattern validation beyond
//! what the regex engine accepts.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use http::Method;
use regex::Regex;

use crate::error::HandlerError;

use super::dispatcher::RequestState;

// =============================================================================
// Body Format
// =============================================================================

/// How the dispatcher frames the request body before invoking a handler.
///
/// A closed enum: a route cannot declare an unknown framing, so that class
/// of route misconfiguration is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    /// Hand the raw, unread body to the handler (always the case for
    /// GET/HEAD regardless of the declared format)
    Stream,

    /// Buffer the whole body and decode it as UTF-8 text
    #[default]
    Text,

    /// Buffer the whole body as raw bytes
    Raw,
}

// =============================================================================
// Route Handler
// =============================================================================

/// A pluggable route handler.
///
/// Handlers receive the per-request [`RequestState`] (captures, identity,
/// framed body, wiki handle) and either build their response through
/// `state.responder` to get conditional caching and compression, or return
/// any response directly. Errors are caught by the dispatcher and mapped to
/// a 500.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError>;
}

// =============================================================================
// Route
// =============================================================================

/// A (method, path-pattern) → handler binding.
#[derive(Clone)]
pub struct Route {
    /// HTTP method this route answers
    pub method: Method,

    /// Path pattern; must match the entire prefix-stripped path
    pub path: Regex,

    /// Request-body framing contract
    pub body_format: BodyFormat,

    /// The handler invoked once the pipeline's gates have passed
    pub handler: Arc<dyn RouteHandler>,
}

impl Route {
    /// Create a route with the default `Text` body framing.
    pub fn new(method: Method, path: Regex, handler: Arc<dyn RouteHandler>) -> Self {
        Self {
            method,
            path,
            body_format: BodyFormat::default(),
            handler,
        }
    }

    /// Override the body framing contract.
    pub fn with_body_format(mut self, body_format: BodyFormat) -> Self {
        self.body_format = body_format;
        self
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path.as_str())
            .field("body_format", &self.body_format)
            .finish()
    }
}

// =============================================================================
// Route Table
// =============================================================================

/// The ordered route list plus its matching algorithm.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Order of insertion is match precedence.
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the first route matching the method and path.
    ///
    /// The configured path prefix is stripped first; when the path lies
    /// outside the prefix no route can match at all. A stripped path that
    /// comes out empty is treated as `/`. On a match the capture groups
    /// (without group 0) are returned in order, `None` for optional groups
    /// that did not participate.
    pub fn find_matching_route(
        &self,
        method: &Method,
        path: &str,
        path_prefix: &str,
    ) -> Option<(&Route, Vec<Option<String>>)> {
        let pathname = if path_prefix.is_empty() {
            path
        } else if let Some(stripped) = path.strip_prefix(path_prefix) {
            if stripped.is_empty() {
                "/"
            } else {
                stripped
            }
        } else {
            return None;
        };

        for route in &self.routes {
            if route.method != *method {
                continue;
            }
            let Some(captures) = route.path.captures(pathname) else {
                continue;
            };
            // The pattern must cover the entire path, anchored or not
            let full = captures.get(0).expect("group 0 always participates");
            if full.start() != 0 || full.end() != pathname.len() {
                continue;
            }
            let params = captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect();
            return Some((route, params));
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
