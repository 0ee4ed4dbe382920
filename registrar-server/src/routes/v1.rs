use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::{devices, discovery},
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(devices::list_devices_handler))
        .route(
            "/devices/{guid}/registration",
            post(devices::register_device_handler),
        )
        .route(
            "/discovery/refresh",
            post(discovery::refresh_discovery_handler),
        )
}
