//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::RoomRegistry;
use crate::lobby::RoomService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub rooms: Arc<RoomService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(RoomRegistry::new());
        let rooms = Arc::new(RoomService::new(registry.clone(), &config));

        Self {
            config,
            registry,
            rooms,
        }
    }
}
