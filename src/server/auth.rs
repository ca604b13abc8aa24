//! Pluggable request authentication.
//!
//! An [`Authenticator`] resolves a request to an identity. The server owns
//! an ordered list but consults only the first registered authenticator per
//! request; `init` decides at construction time whether an authenticator
//! joins that list at all.
//!
//! The built-in [`BasicAuthenticator`] implements HTTP Basic authentication
//! against the single username/password pair from the configuration. It is
//! inactive (excluded by `init`) when no credentials are configured, which
//! leaves anonymous rules in force.

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http::{header, StatusCode};

use crate::config::ServerConfig;

use super::dispatcher::RequestState;

// =============================================================================
// Authenticator Trait
// =============================================================================

/// Outcome of an authentication attempt.
pub enum AuthOutcome {
    /// Proceed with the pipeline. The authenticator has recorded the
    /// identity in `state.authenticated_username`, or left it `None` for
    /// anonymous access.
    Granted,

    /// The authenticator produced the terminal response (a login challenge,
    /// a rejection). The dispatcher sends it and performs no further writes.
    Challenge(Response),
}

/// A pluggable request-to-identity resolver.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Decide whether this authenticator is usable.
    ///
    /// `Ok(true)` registers it, `Ok(false)` skips it silently (not
    /// applicable in this configuration), `Err(message)` is logged as an
    /// error and the authenticator is excluded; the server keeps running.
    fn init(&self) -> Result<bool, String>;

    /// Resolve the request to an identity, or produce a challenge.
    async fn authenticate(&self, state: &mut RequestState) -> AuthOutcome;
}

// =============================================================================
// Basic Authenticator
// =============================================================================

/// HTTP Basic authentication against the configured username/password.
pub struct BasicAuthenticator {
    username: Option<String>,
    password: Option<String>,
    server_name: String,
}

impl BasicAuthenticator {
    /// Create the authenticator from configuration. `server_name` appears in
    /// the challenge realm.
    pub fn new(config: &ServerConfig, server_name: impl Into<String>) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            server_name: server_name.into(),
        }
    }

    fn challenge(&self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(
                header::WWW_AUTHENTICATE,
                format!("Basic realm=\"{}\"", self.server_name),
            )],
            "Authorization header required",
        )
            .into_response()
    }

    fn reject() -> Response {
        (StatusCode::FORBIDDEN, "Invalid username or password").into_response()
    }
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    fn init(&self) -> Result<bool, String> {
        // Only usable with a configured credential pair
        Ok(self.username.is_some() && self.password.is_some())
    }

    async fn authenticate(&self, state: &mut RequestState) -> AuthOutcome {
        let Some(header_value) = state
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
        else {
            return AuthOutcome::Challenge(self.challenge());
        };

        let Some(encoded) = header_value.strip_prefix("Basic ") else {
            return AuthOutcome::Challenge(Self::reject());
        };
        let Ok(decoded) = BASE64.decode(encoded.trim()) else {
            return AuthOutcome::Challenge(Self::reject());
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return AuthOutcome::Challenge(Self::reject());
        };
        let Some((username, password)) = credentials.split_once(':') else {
            return AuthOutcome::Challenge(Self::reject());
        };

        let valid = self.username.as_deref() == Some(username)
            && self.password.as_deref() == Some(password);
        if !valid {
            return AuthOutcome::Challenge(Self::reject());
        }

        state.authenticated_username = Some(username.to_string());
        AuthOutcome::Granted
    }
}

// =============================================================================
// Tests
// =============================================================================
