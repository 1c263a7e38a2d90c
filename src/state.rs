use std::sync::Arc;

use crate::config::Config;
use crate::store::Store;
use crate::websocket::ConnectionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: ConnectionRegistry,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = ConnectionRegistry::new(config.subscriber_buffer);
        Self {
            store: Store::new(),
            registry,
            config: Arc::new(config),
        }
    }
}
