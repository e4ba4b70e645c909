//! Application state management

use std::sync::Arc;

use crate::artifacts::ArtifactStore;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    artifacts: ArtifactStore,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, artifacts: ArtifactStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, artifacts }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the artifact store
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.inner.artifacts
    }
}
