//! Default route set for the wiki API.
//!
//! This is the composition step: it builds the ordered route list the
//! server is handed at construction time. Registration order is match
//! precedence, so the exact root route precedes the capture-everything
//! tiddler routes.

use std::sync::Arc;

use http::Method;
use regex::Regex;

use super::handlers::{
    DeleteTiddlerHandler, GetTiddlerHandler, IndexHandler, ListTiddlersHandler, PutTiddlerHandler,
    StatusHandler,
};
use super::route::Route;

/// The ordered default routes serving the wiki content and editing API.
pub fn wiki_routes() -> Vec<Route> {
    let pattern = |p: &str| Regex::new(p).expect("route pattern is a valid regex");
    vec![
        Route::new(Method::GET, pattern(r"^/$"), Arc::new(IndexHandler)),
        Route::new(Method::GET, pattern(r"^/status$"), Arc::new(StatusHandler)),
        Route::new(
            Method::GET,
            pattern(r"^/recipes/default/tiddlers\.json$"),
            Arc::new(ListTiddlersHandler),
        ),
        Route::new(
            Method::GET,
            pattern(r"^/recipes/default/tiddlers/(.+)$"),
            Arc::new(GetTiddlerHandler),
        ),
        Route::new(
            Method::PUT,
            pattern(r"^/recipes/default/tiddlers/(.+)$"),
            Arc::new(PutTiddlerHandler),
        ),
        Route::new(
            Method::DELETE,
            pattern(r"^/bags/default/tiddlers/(.+)$"),
            Arc::new(DeleteTiddlerHandler),
        ),
    ]
}

// =============================================================================
// Tests
// =============================================================================
