//! Built-in route handlers for the wiki API.
//!
//! These implement the TiddlyWeb-style surface the server exposes by
//! default:
//!
//! - `GET /` - render the root tiddler
//! - `GET /status` - identity and capability report
//! - `GET /recipes/default/tiddlers.json` - list non-system tiddlers
//! - `GET /recipes/default/tiddlers/{title}` - single tiddler as JSON
//! - `PUT /recipes/default/tiddlers/{title}` - upsert from JSON fields
//! - `DELETE /bags/default/tiddlers/{title}` - remove a tiddler
//!
//! Handlers are ordinary [`RouteHandler`] implementations; embedders can
//! mix them with their own.

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::HandlerError;
use crate::wiki::Tiddler;

use super::dispatcher::RequestState;
use super::route::RouteHandler;

// =============================================================================
// Status
// =============================================================================

/// Response body for `GET /status`.
#[derive(Debug, Serialize)]
struct StatusResponse {
    username: String,
    anonymous: bool,
    read_only: bool,
    space: SpaceResponse,
}

#[derive(Debug, Serialize)]
struct SpaceResponse {
    recipe: &'static str,
}

/// `GET /status` - who am I and what may I do.
pub struct StatusHandler;

#[async_trait]
impl RouteHandler for StatusHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let anonymous = state.authenticated_username.is_none();
        let status = StatusResponse {
            username: state
                .authenticated_username
                .clone()
                .unwrap_or_else(|| "GUEST".to_string()),
            anonymous,
            read_only: state.is_read_only(),
            space: SpaceResponse { recipe: "default" },
        };
        let body = serde_json::to_vec(&status)?;
        Ok(state
            .responder
            .send(
                StatusCode::OK,
                &[("Content-Type", "application/json".to_string())],
                body,
            )
            .await)
    }
}

// =============================================================================
// Root Index
// =============================================================================

/// `GET /` - the root tiddler rendered per configuration.
pub struct IndexHandler;

#[async_trait]
impl RouteHandler for IndexHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let rendered = state
            .wiki
            .render_tiddler(&state.config.root_tiddler, &state.config.root_render_type);
        match rendered {
            Some(text) => Ok(state
                .responder
                .send(
                    StatusCode::OK,
                    &[("Content-Type", state.config.root_serve_type.clone())],
                    text.into_bytes(),
                )
                .await),
            None => Ok(StatusCode::NOT_FOUND.into_response()),
        }
    }
}

// =============================================================================
// Tiddler Collection
// =============================================================================

/// `GET /recipes/default/tiddlers.json` - all non-system tiddlers, sorted by
/// title, without their `text` field (the skinny list clients sync against).
pub struct ListTiddlersHandler;

#[async_trait]
impl RouteHandler for ListTiddlersHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let mut entries: Vec<Value> = Vec::new();
        for title in state.wiki.tiddler_titles() {
            let Some(tiddler) = state.wiki.get_tiddler(&title) else {
                continue;
            };
            if tiddler.is_system() {
                continue;
            }
            let revision = state.wiki.change_count(&title);
            let mut value = tiddler.to_json(revision);
            if let Some(fields) = value.as_object_mut() {
                fields.remove("text");
            }
            entries.push(value);
        }
        let body = serde_json::to_vec(&entries)?;
        Ok(state
            .responder
            .send(
                StatusCode::OK,
                &[("Content-Type", "application/json".to_string())],
                body,
            )
            .await)
    }
}

// =============================================================================
// Single Tiddler
// =============================================================================

/// `GET /recipes/default/tiddlers/{title}` - one tiddler as JSON.
pub struct GetTiddlerHandler;

#[async_trait]
impl RouteHandler for GetTiddlerHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let title = decoded_title(state)?;
        match state.wiki.get_tiddler(&title) {
            Some(tiddler) => {
                let revision = state.wiki.change_count(&title);
                let body = serde_json::to_vec(&tiddler.to_json(revision))?;
                Ok(state
                    .responder
                    .send(
                        StatusCode::OK,
                        &[("Content-Type", "application/json".to_string())],
                        body,
                    )
                    .await)
            }
            None => Ok(StatusCode::NOT_FOUND.into_response()),
        }
    }
}

/// `PUT /recipes/default/tiddlers/{title}` - create or replace a tiddler
/// from a flat JSON field object. Responds 204 with a revision `Etag`.
pub struct PutTiddlerHandler;

#[async_trait]
impl RouteHandler for PutTiddlerHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let title = decoded_title(state)?;
        let text = state
            .body
            .as_text()
            .ok_or_else(|| HandlerError::InvalidBody("expected a text body".to_string()))?;
        let value: Value = serde_json::from_str(text)
            .map_err(|err| HandlerError::InvalidBody(err.to_string()))?;
        let tiddler = Tiddler::from_json(&title, &value)?;
        let revision = state.wiki.put_tiddler(tiddler);

        let etag = format!(
            "\"default/{}/{}:\"",
            urlencoding::encode(&title),
            revision
        );
        Ok((
            StatusCode::NO_CONTENT,
            [("Etag", etag)],
            "",
        )
            .into_response())
    }
}

/// `DELETE /bags/default/tiddlers/{title}` - remove a tiddler.
pub struct DeleteTiddlerHandler;

#[async_trait]
impl RouteHandler for DeleteTiddlerHandler {
    async fn handle(&self, state: &mut RequestState) -> Result<Response, HandlerError> {
        let title = decoded_title(state)?;
        if state.wiki.delete_tiddler(&title) {
            Ok(StatusCode::NO_CONTENT.into_response())
        } else {
            Ok(StatusCode::NOT_FOUND.into_response())
        }
    }
}

/// The percent-decoded title capture shared by the single-tiddler routes.
fn decoded_title(state: &RequestState) -> Result<String, HandlerError> {
    let raw = state
        .param(0)
        .ok_or_else(|| HandlerError::Other("route pattern captured no title".to_string()))?;
    Ok(urlencoding::decode(raw)
        .map_err(|err| HandlerError::InvalidBody(format!("title is not valid UTF-8: {err}")))?
        .into_owned())
}

// =============================================================================
// Tests
// =============================================================================
