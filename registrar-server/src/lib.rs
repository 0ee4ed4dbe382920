//! # Registrar Server
//!
//! HTTP gateway in front of [`registrar_core`]. Devices finishing owner
//! onboarding call `GET /device/{guid}`; the server checks the GUID against
//! the voucher directory and registers a matching host in the automation
//! platform's inventory.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use handlers::{devices, service};

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(service::banner_handler))
        .route("/health", get(service::health_handler))
        .route(
            "/device/{guid}",
            get(devices::register_device_legacy_handler),
        )
        .merge(routes::create_api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
