//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use slotswap_engine::SwapEngine;
use slotswap_storage::SwapStore;

/// The swap engine over whichever store the server was started with.
pub type ApiEngine = SwapEngine<dyn SwapStore>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: ApiEngine,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn SwapStore>) -> Self {
        Self::from_engine(SwapEngine::from_shared(store))
    }

    pub fn from_engine(engine: ApiEngine) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(ApiEngine, engine);
crate::impl_from_ref!(Instant, start_time);
