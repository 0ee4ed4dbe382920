use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::models::InventoryTransport;

/// Raw configuration as defined in a TOML file.
///
/// Durations are humantime strings (`"60s"`, `"2m"`) and are parsed by the
/// loader so a bad value can name its key.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub discovery: FileDiscoveryConfig,
    #[serde(default)]
    pub inventory: FileInventoryConfig,
    #[serde(default)]
    pub logging: FileLoggingConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileDiscoveryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescan_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walk_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileInventoryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<InventoryTransport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awx_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileLoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Environment-derived configuration values.
///
/// Values that need validation (durations, the transport, the inventory id)
/// are kept raw so the loader can reject them with the variable's name.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub voucher_dir: Option<PathBuf>,
    pub rescan_interval: Option<String>,
    pub walk_timeout: Option<String>,
    pub inventory_transport: Option<String>,
    pub awx_path: Option<PathBuf>,
    pub awx_endpoint: Option<String>,
    pub awx_token: Option<String>,
    pub awx_insecure: Option<bool>,
    pub awx_inventory_id: Option<String>,
    pub inventory_timeout: Option<String>,
    pub log_level: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };

        let mut env_config = Self::default();

        env_config.config_path = var("REGISTRAR_CONFIG").map(PathBuf::from);
        env_config.server_host = var("SERVER_HOST");
        env_config.server_port =
            var("SERVER_PORT").and_then(|s| s.trim().parse().ok());
        env_config.voucher_dir = var("OWNER_VOUCHERS_DIR").map(PathBuf::from);
        env_config.rescan_interval = var("RESCAN_INTERVAL");
        env_config.walk_timeout = var("WALK_TIMEOUT");
        env_config.inventory_transport = var("INVENTORY_TRANSPORT");
        env_config.awx_path = var("AWX_PATH").map(PathBuf::from);
        env_config.awx_endpoint = var("AWX_ENDPOINT");
        env_config.awx_token = var("AWX_TOKEN");
        env_config.awx_insecure = var("AWX_INSECURE").and_then(|raw| parse_bool(&raw));
        env_config.awx_inventory_id = var("AWX_INVENTORY_ID");
        env_config.inventory_timeout = var("INVENTORY_TIMEOUT");
        env_config.log_level = var("LOG_LEVEL");

        env_config
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
