//! Configuration for the wiki server.
//!
//! All settings can be given as command-line flags or environment variables
//! with the `WIKISERVE_` prefix, and every optional setting has a documented
//! default.
//!
//! # Example
//!
//! ```ignore
//! use wikiserve::config::ServerConfig;
//! use clap::Parser;
//!
//! let config = ServerConfig::parse();
//! println!("Listening on {}:{}", config.host, config.port);
//! ```
//!
//! # Environment Variables
//!
//! - `WIKISERVE_HOST` - Bind address (default: 127.0.0.1)
//! - `WIKISERVE_PORT` - Port, or the *name* of an environment variable that
//!   holds the port (default: 8080)
//! - `WIKISERVE_PATH_PREFIX` - URL prefix stripped before route matching
//! - `WIKISERVE_USERNAME` / `WIKISERVE_PASSWORD` - Basic-auth credentials
//! - `WIKISERVE_READERS` / `WIKISERVE_WRITERS` - Comma-separated principals
//! - `WIKISERVE_TLS_KEY` / `WIKISERVE_TLS_CERT` - PEM files enabling HTTPS

use std::path::PathBuf;

use clap::Parser;

// =============================================================================
// Default Values
// =============================================================================

/// Default bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port (also the fallback when a named environment variable is
/// unset).
pub const DEFAULT_PORT: u16 = 8080;

/// Default root tiddler rendered for `GET /`.
pub const DEFAULT_ROOT_TIDDLER: &str = "$:/core/save/all";

/// Default maximum buffered request body in bytes (10 MiB). `0` disables the
/// cap entirely, restoring unbounded buffering.
pub const DEFAULT_MAX_REQUEST_BODY: u64 = 10 * 1024 * 1024;

// =============================================================================
// Server Configuration
// =============================================================================

/// Wikiserve - an embeddable HTTP server for TiddlyWiki-style wikis.
///
/// Serves a wiki's content and editing API over HTTP with regex-based
/// routing, pluggable authentication and conditional-request caching.
#[derive(Parser, Debug, Clone)]
#[command(name = "wikiserve")]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    // =========================================================================
    // Listen Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "WIKISERVE_HOST")]
    pub host: String,

    /// Port to listen on.
    ///
    /// A non-numeric value is treated as the name of an environment variable
    /// holding the port; if that variable is unset, 8080 is used. Port 0
    /// asks the OS for any free port (the assigned port is logged).
    #[arg(short, long, default_value = "8080", env = "WIKISERVE_PORT")]
    pub port: String,

    /// URL path prefix stripped from request paths before route matching.
    ///
    /// With prefix `/wiki`, a request for `/wiki/status` matches routes as
    /// `/status`, and a request outside the prefix matches no route at all.
    #[arg(long, env = "WIKISERVE_PATH_PREFIX")]
    pub path_prefix: Option<String>,

    // =========================================================================
    // TLS Configuration
    // =========================================================================
    /// Path to a PEM-encoded TLS private key. HTTPS is enabled only when
    /// both key and certificate are supplied.
    #[arg(long, env = "WIKISERVE_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Path to a PEM-encoded TLS certificate.
    #[arg(long, env = "WIKISERVE_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    // =========================================================================
    // Authentication / Authorization Configuration
    // =========================================================================
    /// Username for the built-in Basic authenticator.
    #[arg(long, env = "WIKISERVE_USERNAME")]
    pub username: Option<String>,

    /// Password for the built-in Basic authenticator.
    #[arg(long, env = "WIKISERVE_PASSWORD")]
    pub password: Option<String>,

    /// Comma-separated principals granted read access.
    ///
    /// Entries may be usernames or the sentinels `(anon)` and
    /// `(authenticated)`. Defaults to the configured username when both
    /// username and password are set, otherwise to `(anon)`.
    #[arg(long, env = "WIKISERVE_READERS")]
    pub readers: Option<String>,

    /// Comma-separated principals granted write access (same syntax as
    /// `--readers`).
    #[arg(long, env = "WIKISERVE_WRITERS")]
    pub writers: Option<String>,

    /// Disable the CSRF header check on write methods.
    ///
    /// When not disabled, PUT/POST/DELETE requests must carry
    /// `X-Requested-With: TiddlyWiki`.
    #[arg(long, default_value_t = false, env = "WIKISERVE_CSRF_DISABLE")]
    pub csrf_disable: bool,

    // =========================================================================
    // Response Transform Configuration
    // =========================================================================
    /// Compress response bodies larger than 2 KiB when the client accepts
    /// gzip or deflate.
    #[arg(long, default_value_t = false, env = "WIKISERVE_GZIP")]
    pub gzip: bool,

    /// Enable conditional-request caching: 200 responses get an `Etag` and a
    /// matching `If-None-Match` yields a 304 with an empty body.
    #[arg(long, default_value_t = false, env = "WIKISERVE_USE_BROWSER_CACHE")]
    pub use_browser_cache: bool,

    // =========================================================================
    // Rendering Configuration
    // =========================================================================
    /// Title of the tiddler rendered for `GET /`.
    #[arg(long, default_value = DEFAULT_ROOT_TIDDLER, env = "WIKISERVE_ROOT_TIDDLER")]
    pub root_tiddler: String,

    /// Content type the root tiddler is rendered to.
    #[arg(long, default_value = "text/plain", env = "WIKISERVE_ROOT_RENDER_TYPE")]
    pub root_render_type: String,

    /// Content type the rendered root is served as.
    #[arg(long, default_value = "text/html", env = "WIKISERVE_ROOT_SERVE_TYPE")]
    pub root_serve_type: String,

    /// Content type single tiddlers are rendered to.
    #[arg(long, default_value = "text/html", env = "WIKISERVE_TIDDLER_RENDER_TYPE")]
    pub tiddler_render_type: String,

    /// Template tiddler used when rendering single tiddlers.
    #[arg(
        long,
        default_value = "$:/core/templates/server/static.tiddler.html",
        env = "WIKISERVE_TIDDLER_RENDER_TEMPLATE"
    )]
    pub tiddler_render_template: String,

    /// Content type system tiddlers are rendered to.
    #[arg(
        long,
        default_value = "text/plain",
        env = "WIKISERVE_SYSTEM_TIDDLER_RENDER_TYPE"
    )]
    pub system_tiddler_render_type: String,

    /// Template tiddler used when rendering system tiddlers.
    #[arg(
        long,
        default_value = "$:/core/templates/wikified-tiddler",
        env = "WIKISERVE_SYSTEM_TIDDLER_RENDER_TEMPLATE"
    )]
    pub system_tiddler_render_template: String,

    // =========================================================================
    // Limits and Logging
    // =========================================================================
    /// Maximum buffered request body in bytes for text/raw routes; larger
    /// bodies are rejected with 413. `0` disables the cap.
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEST_BODY, env = "WIKISERVE_MAX_REQUEST_BODY")]
    pub max_request_body: u64,

    /// Debug level: `none` or `debug`. At `debug`, every request's path,
    /// headers and authenticated username are logged.
    #[arg(long, default_value = "none", env = "WIKISERVE_DEBUG_LEVEL")]
    pub debug_level: String,
}

impl ServerConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        // TLS must be configured as a pair
        match (&self.tls_key, &self.tls_cert) {
            (Some(_), None) => {
                return Err("tls-key given without tls-cert; supply both to enable HTTPS \
                            or neither to serve plain HTTP"
                    .to_string());
            }
            (None, Some(_)) => {
                return Err("tls-cert given without tls-key; supply both to enable HTTPS \
                            or neither to serve plain HTTP"
                    .to_string());
            }
            _ => {}
        }

        // Credentials must also be configured as a pair
        match (&self.username, &self.password) {
            (Some(_), None) => {
                return Err("username given without password".to_string());
            }
            (None, Some(_)) => {
                return Err("password given without username".to_string());
            }
            _ => {}
        }

        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.port.is_empty() {
            return Err("port must not be empty".to_string());
        }

        Ok(())
    }

    /// Whether HTTPS is enabled (both halves of the TLS pair supplied).
    pub fn tls_enabled(&self) -> bool {
        self.tls_key.is_some() && self.tls_cert.is_some()
    }

    /// The path prefix, normalized to an empty string when unset.
    pub fn path_prefix_or_empty(&self) -> &str {
        self.path_prefix.as_deref().unwrap_or("")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            path_prefix: None,
            tls_key: None,
            tls_cert: None,
            username: None,
            password: None,
            readers: None,
            writers: None,
            csrf_disable: false,
            gzip: false,
            use_browser_cache: false,
            root_tiddler: DEFAULT_ROOT_TIDDLER.to_string(),
            root_render_type: "text/plain".to_string(),
            root_serve_type: "text/html".to_string(),
            tiddler_render_type: "text/html".to_string(),
            tiddler_render_template: "$:/core/templates/server/static.tiddler.html".to_string(),
            system_tiddler_render_type: "text/plain".to_string(),
            system_tiddler_render_template: "$:/core/templates/wikified-tiddler".to_string(),
            max_request_body: DEFAULT_MAX_REQUEST_BODY,
            debug_level: "none".to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
