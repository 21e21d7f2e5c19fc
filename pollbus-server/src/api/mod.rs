//! HTTP API surface.
//!
//! - `/bus/poll`   – the long-poll endpoint (authenticated or anonymous)
//! - `/admin/send` – secret-guarded publish endpoint

use axum::Router;

use crate::state::AppState;

mod admin;
mod bus;
pub mod extractors;

/// Build the API router (everything except the health route).
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/bus", bus::router())
        .nest("/admin", admin::router())
}
