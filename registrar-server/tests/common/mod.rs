use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use axum_test::TestServer;
use registrar_core::{InventoryClient, inventory::InMemoryInventory};
use registrar_server::{
    AppState, create_app,
    infra::{
        config::{
            Config, ConfigMetadata, DiscoveryConfig, InventoryConfig,
            InventoryTransport, LoggingConfig, ServerConfig,
        },
        startup::StartupHooks,
    },
};
use tempfile::TempDir;

// Code is used by test modules, but not in this scope
#[allow(unused)]
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub inventory: Arc<InMemoryInventory>,
    pub vouchers: TempDir,
}

#[allow(unused)]
impl TestApp {
    pub fn add_voucher(&self, name: &str) {
        std::fs::write(self.vouchers.path().join(name), b"voucher")
            .expect("write voucher");
    }
}

#[allow(unused)]
pub fn test_config(voucher_dir: PathBuf) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
        discovery: DiscoveryConfig {
            voucher_dir,
            rescan_interval: None,
            walk_timeout: Duration::from_secs(5),
        },
        inventory: InventoryConfig {
            transport: InventoryTransport::Cli,
            awx_path: PathBuf::from("/nonexistent/awx"),
            endpoint: None,
            token: None,
            insecure: false,
            inventory_id: 1,
            timeout: Duration::from_secs(5),
        },
        logging: LoggingConfig {
            filter: "info".into(),
        },
        metadata: ConfigMetadata::default(),
    }
}

#[allow(unused)]
pub async fn build_test_app_with_hooks<H: StartupHooks>(
    vouchers: &[&str],
    inventory: InMemoryInventory,
    hooks: &H,
) -> Result<TestApp> {
    let tempdir = TempDir::new().context("failed to create voucher directory")?;
    for name in vouchers {
        std::fs::write(tempdir.path().join(name), b"voucher")
            .context("failed to write voucher")?;
    }

    let config = Arc::new(test_config(tempdir.path().to_path_buf()));
    let inventory = Arc::new(inventory);
    let state = AppState::new(
        config,
        Arc::clone(&inventory) as Arc<dyn InventoryClient>,
    );

    hooks.run(&state).await?;

    let server = TestServer::new(create_app(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(TestApp {
        server,
        state,
        inventory,
        vouchers: tempdir,
    })
}
