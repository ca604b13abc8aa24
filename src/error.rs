use thiserror::Error;

/// Errors that can occur while starting the server.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration is inconsistent (e.g. only one half of a TLS pair)
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS key or certificate could not be loaded
    #[error("TLS error: failed to load key/certificate: {0}")]
    Tls(std::io::Error),

    /// The listen socket could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// The accept loop terminated with an error
    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Errors produced by route handlers.
///
/// The dispatcher catches these and converts them to a 500 response so that
/// a misbehaving handler can never take down the listener. Handlers that
/// want a specific client-facing status (404, 400, ...) build that response
/// themselves and return `Ok`.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Request body was structurally invalid for the route
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The wiki store rejected the operation
    #[error("Store error: {0}")]
    Store(String),

    /// Anything else a pluggable handler wants to surface
    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Tests
// =============================================================================
