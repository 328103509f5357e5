//! Vidler
//!
//! A small web server that finds media on a page and hands it out through
//! signed, proxied downloads:
//!
//! 1. **Discovery**: crawl a source page for files of one extension
//!    (`POST /extrict/:extension`) and render a preview plus a download link
//!    for every hit.
//!
//! 2. **Signed links**: every download link carries the resource URI, an
//!    Ed25519 signature over it and the server's public key. Only URIs the
//!    server itself signed can be fetched through it.
//!
//! 3. **Relay**: `GET|POST /download` verifies the link, then streams the
//!    origin resource to the client with its headers and a
//!    `Content-Disposition: attachment` header. `GET /head` relays only the
//!    headers.
//!
//! The key pair comes from `VIDLER_PUB_KEY` / `VIDLER_PRIV_KEY`. Without both
//! the server refuses to start.

mod crypto;
mod discovery;
mod pages;
mod relay;
mod state;
mod token;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::Method, response::IntoResponse, routing::get, Json, Router};
use clap::{Parser, Subcommand};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crypto::{KeySet, PRIV_KEY_ENV, PUB_KEY_ENV};
use discovery::HttpCrawler;
use relay::{OriginClient, OriginConfig};
use state::{AppState, ServerConfig};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vidler", version, about = "Signed media download relay")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "VIDLER_PORT")]
    port: u16,

    /// Public key (hex) embedded in issued links
    #[arg(long, env = PUB_KEY_ENV)]
    pub_key: Option<String>,

    /// Private key (hex Ed25519 seed) used to sign links
    #[arg(long, env = PRIV_KEY_ENV, hide_env_values = true)]
    priv_key: Option<String>,

    /// Seconds allowed for connecting to an origin
    #[arg(long, default_value_t = 10, env = "VIDLER_CONNECT_TIMEOUT_SECS")]
    connect_timeout_secs: u64,

    /// Seconds allowed for an origin to send its response headers
    #[arg(long, default_value_t = 30, env = "VIDLER_RESPONSE_TIMEOUT_SECS")]
    response_timeout_secs: u64,

    /// Seconds an origin body may stall between chunks
    #[arg(long, default_value_t = 60, env = "VIDLER_READ_TIMEOUT_SECS")]
    read_timeout_secs: u64,

    /// How many levels of linked pages to crawl below the source page
    #[arg(long, default_value_t = 1, env = "VIDLER_CRAWL_DEPTH")]
    crawl_depth: usize,

    /// Lifetime of issued download links in seconds. Links never expire when
    /// unset.
    #[arg(long, env = "VIDLER_LINK_TTL_SECS")]
    link_ttl_secs: Option<u64>,

    /// Answer with the origin's status when it is 4xx/5xx (false: always 200)
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "VIDLER_PRESERVE_ORIGIN_ERRORS"
    )]
    preserve_origin_errors: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "VIDLER_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print a new key pair as environment variable assignments
    Keygen,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            crawl_depth: self.crawl_depth,
            link_ttl: self.link_ttl_secs.map(Duration::from_secs),
            preserve_origin_errors: self.preserve_origin_errors,
            origin: OriginConfig {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                response_timeout: Duration::from_secs(self.response_timeout_secs),
                read_timeout: Duration::from_secs(self.read_timeout_secs),
                ..OriginConfig::default()
            },
        }
    }
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing (stderr carries diagnostics, stdout stays clean for keygen)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vidler=info,tower_http=info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if args.command == Some(Command::Keygen) {
        let keys = KeySet::generate();
        println!("{}={}", PUB_KEY_ENV, keys.public_key());
        println!("{}={}", PRIV_KEY_ENV, keys.private_key_hex());
        return ExitCode::SUCCESS;
    }

    // Key material is required before anything binds.
    let keys = match KeySet::from_hex(args.pub_key.as_deref(), args.priv_key.as_deref()) {
        Ok(keys) => keys,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = args.server_config();

    let origin = match OriginClient::new(config.origin.clone()) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create origin client");
            return ExitCode::FAILURE;
        }
    };

    let crawler = match HttpCrawler::new(origin.clone()) {
        Ok(crawler) => crawler,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create crawler");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(config, keys, origin, Arc::new(crawler));

    tracing::info!(
        public_key = state.keys.public_key(),
        crawl_depth = state.config.crawl_depth,
        link_ttl_secs = state.config.link_ttl.map(|ttl| ttl.as_secs()),
        preserve_origin_errors = state.config.preserve_origin_errors,
        "Configuration loaded"
    );

    let app = build_router(&state);

    let addr = format!("0.0.0.0:{}", state.config.port);
    tracing::info!("Vidler server starting on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = addr.as_str(), error = %e, "Failed to bind address");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Assemble every route with the shared layers.
fn build_router(state: &AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .merge(pages::router())
        .merge(relay::api::router(state.relay.clone()))
        .merge(discovery::api::router(state.discovery_state()))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ── Route Handlers ────────────────────────────────────────────────────────────

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "vidler",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
