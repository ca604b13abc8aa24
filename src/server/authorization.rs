//! Authorization policy: readers/writers principal sets.
//!
//! Principals are identity strings. Two sentinels widen a set beyond
//! explicit usernames: `(anon)` grants access without any identity at all,
//! and `(authenticated)` grants access to every successfully authenticated
//! identity. Both sets are fixed at server construction.

use http::Method;

use crate::config::ServerConfig;

/// Sentinel granting anonymous access.
pub const ANON_PRINCIPAL: &str = "(anon)";

/// Sentinel granting access to any authenticated identity.
pub const AUTHENTICATED_PRINCIPAL: &str = "(authenticated)";

/// The permission class a request must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionClass {
    /// GET/HEAD/OPTIONS (and, deliberately, any unlisted method)
    Readers,

    /// PUT/POST/DELETE
    Writers,
}

/// Immutable readers/writers principal sets plus the evaluation rule.
#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    readers: Vec<String>,
    writers: Vec<String>,
}

impl AuthorizationPolicy {
    /// Build the policy from explicit principal lists.
    pub fn new(readers: Vec<String>, writers: Vec<String>) -> Self {
        Self { readers, writers }
    }

    /// Derive the policy from configuration.
    ///
    /// Explicit `readers`/`writers` lists win; otherwise both sets default
    /// to the configured username when credentials are present, and to
    /// `(anon)` when they are not.
    pub fn from_config(config: &ServerConfig) -> Self {
        let authorized_user = match (&config.username, &config.password) {
            (Some(username), Some(_)) => username.clone(),
            _ => ANON_PRINCIPAL.to_string(),
        };
        let parse = |list: &Option<String>| -> Vec<String> {
            list.as_deref()
                .unwrap_or(authorized_user.as_str())
                .split(',')
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect()
        };
        Self {
            readers: parse(&config.readers),
            writers: parse(&config.writers),
        }
    }

    /// The permission class required for an HTTP method.
    ///
    /// Unlisted methods fall back to `Readers`.
    pub fn required_permission(method: &Method) -> PermissionClass {
        match *method {
            Method::PUT | Method::POST | Method::DELETE => PermissionClass::Writers,
            _ => PermissionClass::Readers,
        }
    }

    /// Whether the given identity holds the permission class.
    ///
    /// Pass `None` as the username to test anonymous access.
    pub fn is_authorized(&self, class: PermissionClass, username: Option<&str>) -> bool {
        let principals = match class {
            PermissionClass::Readers => &self.readers,
            PermissionClass::Writers => &self.writers,
        };
        if principals.iter().any(|p| p == ANON_PRINCIPAL) {
            return true;
        }
        match username {
            Some(name) if !name.is_empty() => principals
                .iter()
                .any(|p| p == AUTHENTICATED_PRINCIPAL || p == name),
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
