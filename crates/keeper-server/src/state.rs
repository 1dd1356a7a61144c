use std::sync::Arc;

use keeper_core::backend::Backend;
use keeper_core::ingest::Dispatcher;

use crate::stats::ServerStats;

/// Shared application state, wrapped in Arc for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    /// Storage engine, used directly for queries and reads.
    pub backend: Arc<dyn Backend>,
    /// Submission side of the write queues.
    pub dispatcher: Dispatcher,
    /// Request and volume counters served by `/Stats.json`.
    pub stats: ServerStats,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                backend,
                dispatcher,
                stats: ServerStats::default(),
            }),
        }
    }
}
