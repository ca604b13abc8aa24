//! Wikiserve - an embeddable HTTP server for TiddlyWiki-style wikis.
//!
//! This binary wires the pieces together: configuration, the tiddler store,
//! the default route set and the built-in Basic authenticator.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wikiserve::{
    config::ServerConfig,
    server::{wiki_routes, BasicAuthenticator, WikiServer},
    wiki::{MemoryStore, Tiddler, WikiStore, SITE_TITLE_TIDDLER},
};

/// Command-line interface: the server configuration plus composition-only
/// options that never reach the core.
#[derive(Parser, Debug)]
#[command(name = "wikiserve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ServerConfig,

    /// Load tiddlers at startup from a JSON export (an array of flat field
    /// objects).
    #[arg(long, env = "WIKISERVE_WIKI_FILE")]
    wiki_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli.config.debug_level);

    if let Err(message) = cli.config.validate() {
        error!("Configuration error: {message}");
        return ExitCode::FAILURE;
    }

    // Build the content store
    let store = MemoryStore::new();
    if let Some(path) = &cli.wiki_file {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) => {
                error!("Failed to read {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        };
        match store.load_json(&json) {
            Ok(count) => info!("Loaded {count} tiddler(s) from {}", path.display()),
            Err(err) => {
                error!("Failed to load {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }
    if store.get_tiddler(SITE_TITLE_TIDDLER).is_none() {
        store.put_tiddler(Tiddler::new(SITE_TITLE_TIDDLER).with_field("text", "TiddlyWiki"));
    }

    // Compose the server: ordered routes first, then the authenticator
    let config = cli.config;
    let mut server = WikiServer::new(Arc::new(store), config.clone());
    server.add_routes(wiki_routes());
    let realm = server.server_name().to_string();
    server.add_authenticator(Arc::new(BasicAuthenticator::new(&config, realm)));

    if let Err(err) = server.listen(None, None, None).await {
        error!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(debug_level: &str) {
    let env_filter = if debug_level == "none" {
        "wikiserve=info,tower_http=info"
    } else {
        "wikiserve=debug,tower_http=debug"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
