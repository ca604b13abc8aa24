//! Server construction and lifecycle.
//!
//! [`WikiServer`] owns the route table, the authenticator list and the
//! authorization policy, all of which are fixed before `listen` is called;
//! per-request state never escapes the dispatcher, so no locking is needed
//! anywhere on the request path.
//!
//! Routes and authenticators are handed in (or added) by an explicit
//! composition step; there is no runtime module discovery.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{ServerConfig, DEFAULT_PORT};
use crate::error::StartupError;
use crate::wiki::{WikiStore, SITE_TITLE_TIDDLER};

use super::auth::Authenticator;
use super::authorization::AuthorizationPolicy;
use super::dispatcher::dispatch;
use super::route::{Route, RouteTable};

// =============================================================================
// Server
// =============================================================================

/// The wiki HTTP server: configuration, route table, authenticators and
/// authorization policy, assembled once and immutable while listening.
pub struct WikiServer {
    config: Arc<ServerConfig>,
    wiki: Arc<dyn WikiStore>,
    routes: RouteTable,
    authenticators: Vec<Arc<dyn Authenticator>>,
    policy: Arc<AuthorizationPolicy>,
    server_name: String,
    path_prefix: String,
}

impl WikiServer {
    /// Create a server over the given store and configuration.
    ///
    /// The server name shown in challenges and log lines comes from the
    /// wiki's site-title tiddler when present.
    pub fn new(wiki: Arc<dyn WikiStore>, config: ServerConfig) -> Self {
        let server_name = wiki
            .get_tiddler_text(SITE_TITLE_TIDDLER)
            .unwrap_or_else(|| "TiddlyWiki".to_string());
        let policy = Arc::new(AuthorizationPolicy::from_config(&config));
        let path_prefix = config.path_prefix_or_empty().to_string();
        Self {
            config: Arc::new(config),
            wiki,
            routes: RouteTable::new(),
            authenticators: Vec::new(),
            policy,
            server_name,
            path_prefix,
        }
    }

    /// Append a route; registration order is match precedence.
    pub fn add_route(&mut self, route: Route) {
        self.routes.add_route(route);
    }

    /// Append every route from an ordered list.
    pub fn add_routes(&mut self, routes: impl IntoIterator<Item = Route>) {
        for route in routes {
            self.add_route(route);
        }
    }

    /// Register an authenticator if its `init` succeeds.
    ///
    /// An `Err` from `init` is logged and the authenticator is skipped; the
    /// server keeps serving without it. `Ok(false)` skips it silently.
    pub fn add_authenticator(&mut self, authenticator: Arc<dyn Authenticator>) {
        match authenticator.init() {
            Ok(true) => self.authenticators.push(authenticator),
            Ok(false) => {}
            Err(message) => error!("Error initializing authenticator: {message}"),
        }
    }

    // =========================================================================
    // Accessors used by the dispatcher and handlers
    // =========================================================================

    pub(crate) fn config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.config)
    }

    pub(crate) fn wiki(&self) -> Arc<dyn WikiStore> {
        Arc::clone(&self.wiki)
    }

    pub(crate) fn policy(&self) -> Arc<AuthorizationPolicy> {
        Arc::clone(&self.policy)
    }

    pub(crate) fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub(crate) fn authenticators(&self) -> &[Arc<dyn Authenticator>] {
        &self.authenticators
    }

    /// Display name used in challenges, rejections and log lines.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub(crate) fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub(crate) fn csrf_disable(&self) -> bool {
        self.config.csrf_disable
    }

    pub(crate) fn gzip_enabled(&self) -> bool {
        self.config.gzip
    }

    pub(crate) fn browser_cache_enabled(&self) -> bool {
        self.config.use_browser_cache
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.config.debug_level != "none"
    }

    pub(crate) fn max_request_body(&self) -> u64 {
        self.config.max_request_body
    }

    // =========================================================================
    // Router Assembly
    // =========================================================================

    /// Build the axum router.
    ///
    /// Every method and path is funneled into the dispatch pipeline through
    /// the fallback handler; axum supplies HTTP parsing and the trace layer,
    /// nothing else.
    pub fn into_router(self) -> Router {
        let server = Arc::new(self);
        Router::new()
            .fallback(dispatch)
            .with_state(server)
            .layer(TraceLayer::new_for_http())
    }

    // =========================================================================
    // Listening
    // =========================================================================

    /// Bind and serve until the task is cancelled or the listener fails.
    ///
    /// `port`, `host` and `prefix` override the configuration when given. A
    /// non-numeric port names an environment variable (8080 when unset);
    /// port 0 asks the OS for a free port, and the assigned port is what
    /// gets logged once the socket is actually listening.
    pub async fn listen(
        mut self,
        port: Option<&str>,
        host: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<(), StartupError> {
        let port_value = port.unwrap_or(self.config.port.as_str()).to_string();
        let host = host.unwrap_or(self.config.host.as_str()).to_string();
        if let Some(prefix) = prefix {
            self.path_prefix = prefix.to_string();
        }
        let prefix = self.path_prefix.clone();

        let port = resolve_port(&port_value);
        let address = format!("{host}:{port}");

        let tls = match (&self.config.tls_key, &self.config.tls_cert) {
            (Some(key), Some(cert)) => Some(
                // Loaded once, eagerly; credentials are not reloaded
                RustlsConfig::from_pem_file(cert.clone(), key.clone())
                    .await
                    .map_err(StartupError::Tls)?,
            ),
            _ => None,
        };
        let protocol = if tls.is_some() { "https" } else { "http" };

        let listener = std::net::TcpListener::bind(&address).map_err(|source| {
            StartupError::Bind {
                address: address.clone(),
                source,
            }
        })?;
        listener.set_nonblocking(true).map_err(StartupError::Serve)?;
        let local_addr: SocketAddr = listener.local_addr().map_err(StartupError::Serve)?;

        info!(
            "Serving on {protocol}://{}:{}{prefix}",
            local_addr.ip(),
            local_addr.port()
        );
        info!("(press ctrl-C to exit)");

        let app = self.into_router();
        match tls {
            Some(tls) => axum_server::from_tcp_rustls(listener, tls)
                .serve(app.into_make_service())
                .await
                .map_err(StartupError::Serve),
            None => {
                let listener =
                    tokio::net::TcpListener::from_std(listener).map_err(StartupError::Serve)?;
                axum::serve(listener, app)
                    .await
                    .map_err(StartupError::Serve)
            }
        }
    }
}

/// Resolve a configured port value.
///
/// A numeric value is the port itself. Anything else names an environment
/// variable expected to hold the port, with 8080 as the final fallback.
fn resolve_port(value: &str) -> u16 {
    if let Ok(port) = value.parse::<u16>() {
        return port;
    }
    std::env::var(value)
        .ok()
        .and_then(|env_value| env_value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}

// =============================================================================
// Tests
// =============================================================================
