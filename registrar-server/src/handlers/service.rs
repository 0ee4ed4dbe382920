use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

/// GET /
pub async fn banner_handler() -> &'static str {
    "Device registrar: bridges owner onboarding to the automation inventory\n"
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "known_devices": state.discovery().len(),
    }))
}
