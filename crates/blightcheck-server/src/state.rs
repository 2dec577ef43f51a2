use crate::config::ServerConfig;
use blightcheck_classifiers::ModelHost;
use std::sync::Arc;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// The one model, loaded at startup and never replaced
    pub host: Arc<ModelHost>,
}

impl AppState {
    pub fn new(config: ServerConfig, host: ModelHost) -> Self {
        Self {
            config: Arc::new(config),
            host: Arc::new(host),
        }
    }
}
