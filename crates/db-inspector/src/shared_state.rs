//! Shared state for the HTTP handlers
//!
//! One `AppState` is built at startup and cloned into every handler. The
//! inspector inside it carries the process-wide database session.

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::lifecycle::Inspector;

/// Application state used by the Axum router.
#[derive(Clone)]
pub struct AppState {
    pub inspector: Arc<Inspector>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        info!("Initializing shared application state");
        let inspector = Inspector::from_config(&config)?;
        Ok(Self::with_inspector(config, inspector))
    }

    pub fn with_inspector(config: Config, inspector: Inspector) -> Self {
        Self {
            inspector: Arc::new(inspector),
            config: Arc::new(config),
        }
    }
}
