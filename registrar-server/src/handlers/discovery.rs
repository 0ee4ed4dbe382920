use axum::{Json, extract::State};
use registrar_core::DeviceGuid;
use serde::Serialize;
use tracing::info;

use crate::{AppState, infra::errors::AppResult};

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// GUIDs present in the voucher directory right now.
    pub found: usize,
    /// GUIDs that were not known before this refresh.
    pub added: Vec<DeviceGuid>,
    /// Size of the known-device set after the refresh.
    pub known: usize,
}

/// POST /api/v1/discovery/refresh
pub async fn refresh_discovery_handler(
    State(state): State<AppState>,
) -> AppResult<Json<RefreshResponse>> {
    let scan = state.discovery().refresh().await?;
    info!(
        found = scan.found.len(),
        added = scan.added.len(),
        known = scan.known,
        "on-demand voucher refresh"
    );

    Ok(Json(RefreshResponse {
        found: scan.found.len(),
        added: scan.added,
        known: scan.known,
    }))
}
