//! Server configuration and shared state.
//!
//! Everything here is built once in `main` and is read-only afterwards.
//! Handlers receive it through axum `State`; nothing is looked up globally.

use std::sync::Arc;
use std::time::Duration;

use crate::crypto::KeySet;
use crate::discovery::api::DiscoveryState;
use crate::discovery::Discovery;
use crate::relay::{OriginClient, OriginConfig, Relay};
use crate::token::LinkIssuer;

/// Default crawl depth (source page plus the pages it links to).
const DEFAULT_CRAWL_DEPTH: usize = 1;

/// Server configuration. Key material lives in [`KeySet`], not here.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub crawl_depth: usize,
    /// Lifetime of issued links. `None` issues links that never expire.
    pub link_ttl: Option<Duration>,
    /// Answer with the origin's 4xx/5xx status instead of a 200.
    pub preserve_origin_errors: bool,
    pub origin: OriginConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            crawl_depth: DEFAULT_CRAWL_DEPTH,
            link_ttl: None,
            preserve_origin_errors: true,
            origin: OriginConfig::default(),
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub keys: Arc<KeySet>,
    pub relay: Relay,
    pub issuer: LinkIssuer,
    pub discovery: Arc<dyn Discovery>,
}

impl AppState {
    /// Wire the components together around one key set and one origin client.
    pub fn new(
        config: ServerConfig,
        keys: KeySet,
        origin: OriginClient,
        discovery: Arc<dyn Discovery>,
    ) -> Self {
        let keys = Arc::new(keys);
        let relay = Relay::new(keys.clone(), origin, config.preserve_origin_errors);
        let issuer = LinkIssuer::new(keys.clone(), config.link_ttl);

        Self {
            config: Arc::new(config),
            keys,
            relay,
            issuer,
            discovery,
        }
    }

    /// State handed to the discovery routes.
    pub fn discovery_state(&self) -> DiscoveryState {
        DiscoveryState {
            discovery: self.discovery.clone(),
            issuer: self.issuer.clone(),
            depth: self.config.crawl_depth,
        }
    }
}
