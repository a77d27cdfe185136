use crate::bridge::BridgeSession;
use crate::config::Config;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Engine configuration (read-only while running)
    pub config: Arc<Config>,

    /// The active bridge session, at most one
    pub bridge: Arc<RwLock<Option<Arc<BridgeSession>>>>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            bridge: Arc::new(RwLock::new(None)),
        }
    }
}
