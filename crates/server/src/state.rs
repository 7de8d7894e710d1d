use std::sync::Arc;

use db::Repositories;
use events::EventBus;
use orchestrator::{ProjectService, StageSet};
use sqlx::SqlitePool;
use websocket::WsState;

use crate::config::StudioConfig;

#[derive(Clone)]
pub struct AppState {
    pub service: ProjectService,
    pub event_bus: EventBus,
    pub ws: Arc<WsState>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &StudioConfig) -> Self {
        let event_bus = EventBus::with_config(config.events.bus_config());
        let service = ProjectService::new(
            Repositories::new(pool),
            event_bus.clone(),
            config.executor.clone(),
        );

        Self {
            ws: Arc::new(WsState::new(event_bus.clone())),
            service,
            event_bus,
        }
    }

    /// Swap the pipeline stages, e.g. for scripted stages in tests.
    pub fn with_stages(mut self, stages: StageSet) -> Self {
        self.service = self.service.with_stages(stages);
        self
    }
}
