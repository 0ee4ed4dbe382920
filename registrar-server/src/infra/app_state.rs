use std::{fmt, sync::Arc};

use registrar_core::{DeviceDiscovery, InventoryClient, ReconciliationEngine};

use crate::infra::config::Config;

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub discovery: Arc<DeviceDiscovery>,
    pub engine: ReconciliationEngine,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("voucher_dir", &self.discovery.voucher_dir())
            .field("known_devices", &self.discovery.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire discovery and the engine from configuration. The known-device
    /// set starts empty; the startup hooks perform the first refresh.
    pub fn new(config: Arc<Config>, inventory: Arc<dyn InventoryClient>) -> Self {
        let discovery = Arc::new(
            DeviceDiscovery::new(&config.discovery.voucher_dir)
                .with_walk_timeout(config.discovery.walk_timeout),
        );
        let engine = ReconciliationEngine::new(
            Arc::clone(&discovery),
            inventory,
            config.inventory.inventory_id,
        );

        Self {
            config,
            discovery,
            engine,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn discovery(&self) -> &Arc<DeviceDiscovery> {
        &self.discovery
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }
}
