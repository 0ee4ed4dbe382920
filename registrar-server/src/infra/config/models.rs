use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_VOUCHER_DIR: &str =
    "/data/owner_onboarding_server/owner_vouchers";
pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_AWX_PATH: &str = "/usr/local/bin/awx";
pub const DEFAULT_INVENTORY_ID: u64 = 1;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=warn";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub discovery: DiscoveryConfig,
    pub inventory: InventoryConfig,
    pub logging: LoggingConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub voucher_dir: PathBuf,
    /// `None` disables the periodic rescan.
    pub rescan_interval: Option<Duration>,
    pub walk_timeout: Duration,
}

/// How the registrar talks to the automation platform.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InventoryTransport {
    /// Shell out to the platform's CLI binary.
    #[default]
    Cli,
    /// Call the REST API directly.
    Api,
}

impl InventoryTransport {
    pub fn as_str(self) -> &'static str {
        match self {
            InventoryTransport::Cli => "cli",
            InventoryTransport::Api => "api",
        }
    }
}

impl fmt::Display for InventoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryTransport {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cli" => Ok(InventoryTransport::Cli),
            "api" | "rest" => Ok(InventoryTransport::Api),
            other => Err(format!("unknown inventory transport '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct InventoryConfig {
    pub transport: InventoryTransport,
    pub awx_path: PathBuf,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub insecure: bool,
    pub inventory_id: u64,
    pub timeout: Duration,
}

// Hand-written so the access token never reaches logs.
impl fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryConfig")
            .field("transport", &self.transport)
            .field("awx_path", &self.awx_path)
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "********"))
            .field("insecure", &self.insecure)
            .field("inventory_id", &self.inventory_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
