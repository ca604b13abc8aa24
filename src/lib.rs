//! # Wikiserve
//!
//! An embeddable HTTP server for TiddlyWiki-style wikis.
//!
//! The crate's core is a request-dispatch pipeline: an ordered regex route
//! table, a readers/writers authorization policy, a pluggable authenticator
//! chain, per-route request-body framing, and conditional-request caching
//! with optional compression on the way out. The wiki content store sits
//! behind a narrow trait; routes and authenticators are injected at
//! construction time.
//!
//! ## Features
//!
//! - **Regex routing**: ordered route table, first full match wins
//! - **Pluggable authentication**: authenticator chain with init-time
//!   filtering; built-in HTTP Basic support
//! - **Readers/writers authorization**: `(anon)` and `(authenticated)`
//!   sentinel principals alongside explicit usernames
//! - **Conditional caching**: content-fingerprint `Etag`s and 304 replies
//! - **Compression**: gzip/deflate for bodies over 2 KiB
//! - **TLS**: HTTPS when a key/certificate pair is configured
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wikiserve::config::ServerConfig;
//! use wikiserve::server::{wiki_routes, BasicAuthenticator, WikiServer};
//! use wikiserve::wiki::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let store = Arc::new(MemoryStore::new());
//!
//!     let mut server = WikiServer::new(store, config.clone());
//!     server.add_routes(wiki_routes());
//!     let realm = server.server_name().to_string();
//!     server.add_authenticator(Arc::new(BasicAuthenticator::new(&config, realm)));
//!
//!     server.listen(None, None, None).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod wiki;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{HandlerError, StartupError};
pub use server::{
    wiki_routes, AuthOutcome, Authenticator, AuthorizationPolicy, BasicAuthenticator, BodyFormat,
    PermissionClass, RequestBody, RequestState, Responder, Route, RouteHandler, RouteTable,
    WikiServer, ANON_PRINCIPAL, AUTHENTICATED_PRINCIPAL, COMPRESSION_THRESHOLD, CSRF_HEADER,
    CSRF_HEADER_VALUE,
};
pub use wiki::{MemoryStore, Tiddler, WikiStore, SITE_TITLE_TIDDLER};
