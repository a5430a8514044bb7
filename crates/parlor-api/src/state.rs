//! Shared application state.

use std::sync::Arc;

use parlor_core::clock::Clock;
use parlor_core::store::Store;
use parlor_runtime::SessionRegistry;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live session coordinators.
    pub registry: Arc<SessionRegistry>,
    /// Store access for the administration routes.
    pub store: Arc<dyn Store>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            store,
            clock,
        }
    }
}
