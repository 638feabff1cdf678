use std::sync::Arc;

use relaycast_core::{
    history::HistoryStore, ConcurrencyGuard, Config, JobOrchestrator, JobStore, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<JobOrchestrator>,
    job_store: Arc<dyn JobStore>,
    history_store: Arc<dyn HistoryStore>,
    upload_guard: ConcurrencyGuard,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<JobOrchestrator>,
        job_store: Arc<dyn JobStore>,
        history_store: Arc<dyn HistoryStore>,
        upload_guard: ConcurrencyGuard,
    ) -> Self {
        Self {
            config,
            orchestrator,
            job_store,
            history_store,
            upload_guard,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    pub fn job_store(&self) -> &dyn JobStore {
        self.job_store.as_ref()
    }

    pub fn history_store(&self) -> &dyn HistoryStore {
        self.history_store.as_ref()
    }

    pub fn upload_guard(&self) -> &ConcurrencyGuard {
        &self.upload_guard
    }
}
