//! Shared application state for the agent server.

use std::sync::Arc;

use patchloop::controller::RunConfig;
use patchloop::io::model::Model;
use patchloop::io::search::ContextSearch;

/// Shared state accessible from all request handlers.
///
/// Each request gets its own run; only the collaborators and limits are shared.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn Model + Send + Sync>,
    pub search: Arc<dyn ContextSearch + Send + Sync>,
    pub config: Arc<RunConfig>,
}

impl AppState {
    pub fn new(
        model: impl Model + Send + Sync + 'static,
        search: impl ContextSearch + Send + Sync + 'static,
        config: RunConfig,
    ) -> Self {
        Self {
            model: Arc::new(model),
            search: Arc::new(search),
            config: Arc::new(config),
        }
    }
}
