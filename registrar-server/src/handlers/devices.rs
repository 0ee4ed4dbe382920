use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use registrar_core::{DeviceGuid, ReconcileOutcome};
use serde::Serialize;
use std::path::PathBuf;

use crate::{
    AppState,
    infra::errors::{AppError, AppResult},
};

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub guid: DeviceGuid,
    pub outcome: ReconcileOutcome,
}

#[derive(Debug, Serialize)]
pub struct DeviceSummary {
    pub guid: DeviceGuid,
    pub first_seen: DateTime<Utc>,
    pub voucher_path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub count: usize,
    pub devices: Vec<DeviceSummary>,
}

/// Turn the failing outcomes into gateway errors.
fn settle(guid: &DeviceGuid, outcome: ReconcileOutcome) -> AppResult<ReconcileOutcome> {
    match outcome {
        ReconcileOutcome::Registered | ReconcileOutcome::AlreadyRegistered => {
            Ok(outcome)
        }
        ReconcileOutcome::NotFound => {
            Err(AppError::not_found(format!("device {guid} not found")))
        }
        ReconcileOutcome::CheckFailed => Err(AppError::internal(format!(
            "could not determine whether device {guid} is registered"
        ))),
        ReconcileOutcome::RegisterFailed => {
            Err(AppError::internal(format!("could not register device {guid}")))
        }
    }
}

/// GET /device/{guid}
/// Trigger used by devices at the end of onboarding. Plain-text reply.
pub async fn register_device_legacy_handler(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> AppResult<String> {
    let guid = DeviceGuid::from(guid);
    let outcome = state.engine().reconcile(&guid).await;

    match settle(&guid, outcome)? {
        ReconcileOutcome::AlreadyRegistered => {
            Ok(format!("{guid} registered already\n"))
        }
        _ => Ok(format!("{guid} registered\n")),
    }
}

/// POST /api/v1/devices/{guid}/registration
pub async fn register_device_handler(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> AppResult<Json<RegistrationResponse>> {
    let guid = DeviceGuid::from(guid);
    let outcome = state.engine().reconcile(&guid).await;
    let outcome = settle(&guid, outcome)?;

    Ok(Json(RegistrationResponse { guid, outcome }))
}

/// GET /api/v1/devices
pub async fn list_devices_handler(
    State(state): State<AppState>,
) -> Json<DeviceListResponse> {
    let devices: Vec<DeviceSummary> = state
        .discovery()
        .snapshot()
        .sorted()
        .into_iter()
        .map(|device| DeviceSummary {
            guid: device.guid,
            first_seen: device.first_seen,
            voucher_path: device.voucher_path,
        })
        .collect();

    Json(DeviceListResponse {
        count: devices.len(),
        devices,
    })
}
