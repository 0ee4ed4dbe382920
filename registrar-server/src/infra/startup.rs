use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use registrar_core::DeviceDiscovery;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::infra::app_state::AppState;

#[async_trait]
pub trait StartupHooks: Send + Sync {
    async fn run(&self, state: &AppState) -> Result<()>;
}

/// Initial voucher scan plus the periodic rescan task.
///
/// Neither fails startup: an unreadable voucher directory is logged and the
/// next rescan (or an on-demand refresh) tries again.
#[derive(Debug, Default)]
pub struct ProdStartupHooks;

#[async_trait]
impl StartupHooks for ProdStartupHooks {
    async fn run(&self, state: &AppState) -> Result<()> {
        let discovery = Arc::clone(state.discovery());

        match discovery.refresh().await {
            Ok(scan) => info!(
                known = scan.known,
                voucher_dir = %discovery.voucher_dir().display(),
                "initial voucher scan complete"
            ),
            Err(err) => warn!(
                error = %err,
                "initial voucher scan failed; continuing with an empty device set"
            ),
        }

        if let Some(every) = state.config().discovery.rescan_interval {
            spawn_rescan(discovery, every);
            info!(interval = ?every, "periodic voucher rescan enabled");
        }

        Ok(())
    }
}

/// Refresh `discovery` every `every`, starting one period from now.
pub fn spawn_rescan(
    discovery: Arc<DeviceDiscovery>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut interval = tokio::time::interval_at(start, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match discovery.refresh().await {
                Ok(scan) if !scan.added.is_empty() => info!(
                    added = scan.added.len(),
                    known = scan.known,
                    "voucher rescan found new devices"
                ),
                Ok(scan) => debug!(known = scan.known, "voucher rescan complete"),
                Err(err) => warn!(error = %err, "voucher rescan failed"),
            }
        }
    })
}

#[derive(Debug, Default)]
pub struct NoopStartupHooks;

#[async_trait]
impl StartupHooks for NoopStartupHooks {
    async fn run(&self, _state: &AppState) -> Result<()> {
        Ok(())
    }
}
