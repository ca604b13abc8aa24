//! HTTP server core: the request-dispatch pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         WikiServer                               │
//! │                                                                  │
//! │  ┌───────────┐ ┌──────────────┐ ┌───────────────┐ ┌───────────┐  │
//! │  │  route    │ │authorization │ │     auth      │ │ response  │  │
//! │  │ (regex    │ │ (readers/    │ │ (authenticator│ │ (etag +   │  │
//! │  │  table)   │ │  writers)    │ │  chain)       │ │  gzip)    │  │
//! │  └─────┬─────┘ └──────┬───────┘ └───────┬───────┘ └─────┬─────┘  │
//! │        └──────────────┴────────┬────────┴───────────────┘        │
//! │                                ▼                                 │
//! │                      ┌──────────────────┐                        │
//! │                      │   dispatcher     │                        │
//! │                      │ (per-request     │                        │
//! │                      │  pipeline)       │                        │
//! │                      └──────────────────┘                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every request runs: CSRF gate → authenticate → authorize → route match
//! → body framing → handler. The handlers and authenticators are pluggable;
//! the pipeline is not.

pub mod auth;
pub mod authorization;
pub mod dispatcher;
pub mod handlers;
pub mod lifecycle;
pub mod response;
pub mod route;
pub mod routes;

pub use auth::{AuthOutcome, Authenticator, BasicAuthenticator};
pub use authorization::{
    AuthorizationPolicy, PermissionClass, ANON_PRINCIPAL, AUTHENTICATED_PRINCIPAL,
};
pub use dispatcher::{RequestBody, RequestState, CSRF_HEADER, CSRF_HEADER_VALUE};
pub use handlers::{
    DeleteTiddlerHandler, GetTiddlerHandler, IndexHandler, ListTiddlersHandler, PutTiddlerHandler,
    StatusHandler,
};
pub use lifecycle::WikiServer;
pub use response::{Responder, COMPRESSION_THRESHOLD};
pub use route::{BodyFormat, Route, RouteHandler, RouteTable};
pub use routes::wiki_routes;
