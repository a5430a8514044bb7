//! Route modules and the composed application router.

use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod health;
pub mod sessions;

/// The full application router. Shared by `main.rs` and the integration
/// tests so both serve the same routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/sessions", sessions::router())
        .nest("/api/v1/admin", admin::router())
        .with_state(state)
}
