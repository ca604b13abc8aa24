//! Response finalization: conditional-request caching and compression.
//!
//! Handlers produce their bytes through a per-request [`Responder`], which
//! applies the two outgoing transforms in order:
//!
//! 1. **Conditional caching** - 200 responses get a content fingerprint as a
//!    quoted `Etag`; when the request's `If-None-Match` already carries that
//!    fingerprint, a 304 with the same headers and an empty body is sent
//!    instead and compression never runs.
//! 2. **Compression** - bodies over 2 KiB are deflate- or gzip-compressed
//!    when the client accepts it, preferring deflate.
//!
//! The fingerprint only needs to be deterministic over (body, headers); the
//! exact algorithm is not part of the wire contract, but the `Etag`,
//! `Cache-Control` and `Content-Encoding` headers and the empty 304 body
//! are.

use std::collections::BTreeMap;
use std::io::Write;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use http::{HeaderMap, StatusCode};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Bodies at or under this many bytes are never compressed; compressing
/// tiny payloads costs more than it saves.
pub const COMPRESSION_THRESHOLD: usize = 2048;

/// Per-request response finalizer, bound to the request's conditional and
/// encoding headers at dispatch time.
#[derive(Debug, Clone)]
pub struct Responder {
    enable_browser_cache: bool,
    enable_gzip: bool,
    if_none_match: Option<String>,
    accept_encoding: Option<String>,
}

impl Responder {
    /// Capture the relevant request headers and the server's transform
    /// flags.
    pub fn new(enable_browser_cache: bool, enable_gzip: bool, request_headers: &HeaderMap) -> Self {
        let header_string = |name: http::header::HeaderName| {
            request_headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self {
            enable_browser_cache,
            enable_gzip,
            if_none_match: header_string(http::header::IF_NONE_MATCH),
            accept_encoding: header_string(http::header::ACCEPT_ENCODING),
        }
    }

    /// A responder with both transforms off, for direct responses.
    pub fn disabled() -> Self {
        Self {
            enable_browser_cache: false,
            enable_gzip: false,
            if_none_match: None,
            accept_encoding: None,
        }
    }

    /// Finalize a response.
    ///
    /// `headers` are (name, value) pairs. Invalid header names or values
    /// are skipped with a warning rather than failing the response.
    pub async fn send(
        &self,
        status: StatusCode,
        headers: &[(&str, String)],
        body: impl Into<Bytes>,
    ) -> Response {
        let body: Bytes = body.into();
        let mut headers: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        // Conditional caching applies to 200 responses only
        if self.enable_browser_cache && status == StatusCode::OK {
            let fingerprint = content_fingerprint(&body, &headers);
            headers.push(("Etag".to_string(), format!("\"{fingerprint}\"")));
            headers.push((
                "Cache-Control".to_string(),
                "max-age=0, must-revalidate".to_string(),
            ));
            if let Some(if_none_match) = &self.if_none_match {
                let revalidated = if_none_match
                    .split(',')
                    .map(|etag| etag.trim_matches(|c| c == ' ' || c == '"'))
                    .any(|etag| etag == fingerprint);
                if revalidated {
                    return build_response(StatusCode::NOT_MODIFIED, &headers, Bytes::new());
                }
            }
        }

        // Whole-body compression above the threshold
        let body = if self.enable_gzip && body.len() > COMPRESSION_THRESHOLD {
            match self.negotiated_encoding() {
                Some(encoding) => match compress_body(encoding, body.clone()).await {
                    Ok(compressed) => {
                        headers.push(("Content-Encoding".to_string(), encoding.label().to_string()));
                        compressed
                    }
                    Err(err) => {
                        warn!(error = %err, "compression failed, sending identity body");
                        body
                    }
                },
                None => body,
            }
        } else {
            body
        };

        build_response(status, &headers, body)
    }

    /// The content coding to apply, if any. Deflate is preferred when the
    /// client accepts both.
    fn negotiated_encoding(&self) -> Option<ContentEncoding> {
        let accept = self.accept_encoding.as_deref()?;
        if accepts_token(accept, "deflate") {
            Some(ContentEncoding::Deflate)
        } else if accepts_token(accept, "gzip") {
            Some(ContentEncoding::Gzip)
        } else {
            None
        }
    }
}

// =============================================================================
// Content Encodings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentEncoding {
    Deflate,
    Gzip,
}

impl ContentEncoding {
    fn label(self) -> &'static str {
        match self {
            ContentEncoding::Deflate => "deflate",
            ContentEncoding::Gzip => "gzip",
        }
    }
}

/// Whether an `Accept-Encoding` header lists the coding. Q-values are
/// tolerated but not weighed.
fn accepts_token(accept_encoding: &str, coding: &str) -> bool {
    accept_encoding
        .split(',')
        .map(|entry| entry.split(';').next().unwrap_or("").trim())
        .any(|token| token.eq_ignore_ascii_case(coding))
}

async fn compress_body(encoding: ContentEncoding, body: Bytes) -> std::io::Result<Bytes> {
    // Compression is synchronous whole-body work; keep it off the async
    // workers.
    let compressed = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        match encoding {
            ContentEncoding::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&body)?;
                encoder.finish()
            }
            ContentEncoding::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&body)?;
                encoder.finish()
            }
        }
    })
    .await
    .map_err(|join_error| std::io::Error::other(join_error.to_string()))??;
    Ok(Bytes::from(compressed))
}

// =============================================================================
// Fingerprint and Assembly
// =============================================================================

/// Deterministic digest over the body bytes and the sorted, JSON-serialized
/// header map.
fn content_fingerprint(body: &Bytes, headers: &[(String, String)]) -> String {
    let header_map: BTreeMap<&str, &str> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    let serialized_headers =
        serde_json::to_vec(&header_map).expect("string map serialization cannot fail");

    let mut hasher = Sha256::new();
    hasher.update(body);
    hasher.update(&serialized_headers);
    hex::encode(hasher.finalize())
}

fn build_response(status: StatusCode, headers: &[(String, String)], body: Bytes) -> Response {
    let mut builder = Response::builder().status(status);
    if let Some(header_map) = builder.headers_mut() {
        for (name, value) in headers {
            let Ok(name) = http::header::HeaderName::from_bytes(name.as_bytes()) else {
                warn!(header = %name, "skipping invalid response header name");
                continue;
            };
            let Ok(value) = http::header::HeaderValue::from_str(value) else {
                warn!(header = %name, "skipping invalid response header value");
                continue;
            };
            header_map.append(name, value);
        }
    }
    builder
        .body(Body::from(body))
        .expect("status and body are always valid")
}

// =============================================================================
// Tests
// =============================================================================
