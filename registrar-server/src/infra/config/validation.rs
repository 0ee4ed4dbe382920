use thiserror::Error;
use url::Url;

use super::models::{Config, InventoryTransport};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("inventory transport 'api' requires {field}")]
    MissingApiSetting { field: &'static str },
    #[error("inventory endpoint '{endpoint}' is not a valid URL: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("inventory id must be a positive integer")]
    InvalidInventoryId,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.items.iter().any(|item| item.message.contains(needle))
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let inventory = &config.inventory;

    if inventory.inventory_id == 0 {
        return Err(ConfigGuardRailError::InvalidInventoryId);
    }

    if let Some(endpoint) = inventory.endpoint.as_deref() {
        validate_endpoint(endpoint)?;
    }

    match inventory.transport {
        InventoryTransport::Api => {
            if inventory.endpoint.is_none() {
                return Err(ConfigGuardRailError::MissingApiSetting {
                    field: "AWX_ENDPOINT",
                });
            }
            if inventory.token.is_none() {
                return Err(ConfigGuardRailError::MissingApiSetting {
                    field: "AWX_TOKEN",
                });
            }
        }
        InventoryTransport::Cli => {
            if inventory.endpoint.is_none() || inventory.token.is_none() {
                warnings.push_with_hint(
                    "AWX_ENDPOINT or AWX_TOKEN not set; the CLI will fall back to its own configuration",
                    "Set both to pin the platform the registrar talks to",
                );
            }
        }
    }

    if inventory.insecure {
        warnings.push_with_hint(
            "AWX_INSECURE is enabled; TLS certificates of the platform are not verified",
            "Install the platform's CA certificate and disable AWX_INSECURE",
        );
    }

    if !config.discovery.voucher_dir.is_dir() {
        warnings.push_with_hint(
            format!(
                "voucher directory {} does not exist yet",
                config.discovery.voucher_dir.display()
            ),
            "Devices cannot be registered until onboarding writes vouchers there",
        );
    }

    if config.discovery.rescan_interval.is_none() {
        warnings.push(
            "periodic voucher rescan disabled; new devices are only picked up by POST /api/v1/discovery/refresh",
        );
    }

    Ok(warnings)
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigGuardRailError> {
    let invalid = |reason: String| ConfigGuardRailError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::infra::config::models::{
        ConfigMetadata, DiscoveryConfig, InventoryConfig, LoggingConfig,
        ServerConfig,
    };

    fn config(transport: InventoryTransport) -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            discovery: DiscoveryConfig {
                voucher_dir: std::env::temp_dir(),
                rescan_interval: Some(Duration::from_secs(60)),
                walk_timeout: Duration::from_secs(10),
            },
            inventory: InventoryConfig {
                transport,
                awx_path: PathBuf::from("/usr/local/bin/awx"),
                endpoint: Some("https://awx.example.com".into()),
                token: Some("tok".into()),
                insecure: false,
                inventory_id: 1,
                timeout: Duration::from_secs(30),
            },
            logging: LoggingConfig {
                filter: "info".into(),
            },
            metadata: ConfigMetadata::default(),
        }
    }

    #[test]
    fn complete_config_has_no_warnings() {
        let warnings = apply_guard_rails(&config(InventoryTransport::Api)).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn api_transport_requires_token() {
        let mut config = config(InventoryTransport::Api);
        config.inventory.token = None;

        let err = apply_guard_rails(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigGuardRailError::MissingApiSetting { field: "AWX_TOKEN" }
        ));
    }

    #[test]
    fn api_transport_requires_endpoint() {
        let mut config = config(InventoryTransport::Api);
        config.inventory.endpoint = None;

        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigGuardRailError::MissingApiSetting {
                field: "AWX_ENDPOINT"
            })
        ));
    }

    #[test]
    fn cli_transport_without_credentials_only_warns() {
        let mut config = config(InventoryTransport::Cli);
        config.inventory.endpoint = None;
        config.inventory.token = None;

        let warnings = apply_guard_rails(&config).unwrap();
        assert!(warnings.contains("AWX_ENDPOINT or AWX_TOKEN"));
    }

    #[test]
    fn endpoint_must_be_http_url() {
        let mut config = config(InventoryTransport::Cli);
        config.inventory.endpoint = Some("awx.example.com".into());
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigGuardRailError::InvalidEndpoint { .. })
        ));

        config.inventory.endpoint = Some("ftp://awx.example.com".into());
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigGuardRailError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn zero_inventory_id_is_rejected() {
        let mut config = config(InventoryTransport::Cli);
        config.inventory.inventory_id = 0;
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigGuardRailError::InvalidInventoryId)
        ));
    }

    #[test]
    fn insecure_and_missing_voucher_dir_warn() {
        let mut config = config(InventoryTransport::Api);
        config.inventory.insecure = true;
        config.discovery.voucher_dir =
            PathBuf::from("/nonexistent/registrar/vouchers");
        config.discovery.rescan_interval = None;

        let warnings = apply_guard_rails(&config).unwrap();
        assert!(warnings.contains("AWX_INSECURE"));
        assert!(warnings.contains("does not exist yet"));
        assert!(warnings.contains("rescan disabled"));
    }
}
