use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::config::Config;
use crate::websocket::typing::TypingTracker;
use crate::websocket::ConnectionRegistry;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub registry: ConnectionRegistry,
    pub typing: TypingTracker,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Pool<Postgres>, config: Config) -> Self {
        let typing = TypingTracker::new(std::time::Duration::from_millis(config.typing_ttl_ms));
        Self {
            db,
            registry: ConnectionRegistry::new(),
            typing,
            config: Arc::new(config),
        }
    }
}
