use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use registrar_core::discovery::DEFAULT_WALK_TIMEOUT;
use registrar_core::inventory::DEFAULT_INVENTORY_TIMEOUT;

use super::{
    models::{
        Config, ConfigMetadata, DEFAULT_AWX_PATH, DEFAULT_HOST,
        DEFAULT_INVENTORY_ID, DEFAULT_LOG_FILTER, DEFAULT_PORT,
        DEFAULT_RESCAN_INTERVAL, DEFAULT_VOUCHER_DIR, DiscoveryConfig,
        InventoryConfig, InventoryTransport, LoggingConfig, ServerConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    let mut locations = vec![
        PathBuf::from("registrar.toml"),
        PathBuf::from("/etc/registrar/config.toml"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        locations.push(
            PathBuf::from(home)
                .join(".config")
                .join("registrar")
                .join("config.toml"),
        );
    }
    locations
});

/// Values given on the command line. They win over every other source.
#[derive(Default, Clone)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub voucher_dir: Option<PathBuf>,
    pub transport: Option<InventoryTransport>,
    pub awx_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub inventory_id: Option<u64>,
    pub insecure: bool,
    pub log_filter: Option<String>,
}

impl std::fmt::Debug for ConfigOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOverrides")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("voucher_dir", &self.voucher_dir)
            .field("transport", &self.transport)
            .field("awx_path", &self.awx_path)
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "********"))
            .field("inventory_id", &self.inventory_id)
            .field("insecure", &self.insecure)
            .field("log_filter", &self.log_filter)
            .finish()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub overrides: ConfigOverrides,
    /// Use these values instead of reading the process environment. No
    /// `.env` file is loaded in that case.
    pub env: Option<EnvConfig>,
    /// Replace the default config file search list.
    pub search_paths: Option<Vec<PathBuf>>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.options.overrides = overrides;
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env = Some(env);
        self
    }

    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.options.search_paths = Some(paths);
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let (env_config, env_file_loaded) = match &self.options.env {
            Some(env) => (env.clone(), false),
            None => {
                let loaded = self.load_env_file()?;
                (EnvConfig::gather(), loaded)
            }
        };

        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let (config, warnings) = self.compose_config(
            file_config,
            env_config,
            config_path,
            env_file_loaded,
        )?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let result = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        match result {
            Ok(()) => Ok(true),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingConfig { path });
                }
                path
            }
            None => {
                let candidates = self
                    .options
                    .search_paths
                    .as_deref()
                    .unwrap_or(DEFAULT_CONFIG_LOCATIONS.as_slice());
                match candidates.iter().find(|candidate| candidate.is_file()) {
                    Some(found) => found.clone(),
                    None => return Ok((None, None)),
                }
            }
        };

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No registrar.toml detected; using environment variables and defaults",
                "Pass --config or set REGISTRAR_CONFIG to use a configuration file",
            );
        }

        let overrides = &self.options.overrides;
        let FileConfig {
            server: file_server,
            discovery: file_discovery,
            inventory: file_inventory,
            logging: file_logging,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: overrides
                .host
                .clone()
                .or(env.server_host)
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides
                .port
                .or(env.server_port)
                .or(file_server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        let rescan_interval = pick_duration(
            "RESCAN_INTERVAL",
            env.rescan_interval,
            "discovery.rescan_interval",
            file_discovery.rescan_interval,
        )?
        .unwrap_or(DEFAULT_RESCAN_INTERVAL);
        let walk_timeout = pick_duration(
            "WALK_TIMEOUT",
            env.walk_timeout,
            "discovery.walk_timeout",
            file_discovery.walk_timeout,
        )?
        .unwrap_or(DEFAULT_WALK_TIMEOUT);
        require_positive("discovery.walk_timeout", walk_timeout)?;

        let discovery = DiscoveryConfig {
            voucher_dir: overrides
                .voucher_dir
                .clone()
                .or(env.voucher_dir)
                .or(file_discovery.voucher_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VOUCHER_DIR)),
            rescan_interval: (!rescan_interval.is_zero())
                .then_some(rescan_interval),
            walk_timeout,
        };

        let env_transport = env
            .inventory_transport
            .map(|raw| {
                raw.parse::<InventoryTransport>().map_err(|reason| {
                    ConfigLoadError::InvalidValue {
                        key: "INVENTORY_TRANSPORT",
                        value: raw.clone(),
                        reason,
                    }
                })
            })
            .transpose()?;
        let env_inventory_id = env
            .awx_inventory_id
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|err| {
                    ConfigLoadError::InvalidValue {
                        key: "AWX_INVENTORY_ID",
                        value: raw.clone(),
                        reason: err.to_string(),
                    }
                })
            })
            .transpose()?;
        let inventory_timeout = pick_duration(
            "INVENTORY_TIMEOUT",
            env.inventory_timeout,
            "inventory.timeout",
            file_inventory.timeout,
        )?
        .unwrap_or(DEFAULT_INVENTORY_TIMEOUT);
        require_positive("inventory.timeout", inventory_timeout)?;

        let inventory = InventoryConfig {
            transport: overrides
                .transport
                .or(env_transport)
                .or(file_inventory.transport)
                .unwrap_or_default(),
            awx_path: overrides
                .awx_path
                .clone()
                .or(env.awx_path)
                .or(file_inventory.awx_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AWX_PATH)),
            endpoint: overrides
                .endpoint
                .clone()
                .or(env.awx_endpoint)
                .or(file_inventory.endpoint),
            token: overrides
                .token
                .clone()
                .or(env.awx_token)
                .or(file_inventory.token),
            insecure: overrides.insecure
                || env
                    .awx_insecure
                    .or(file_inventory.insecure)
                    .unwrap_or(false),
            inventory_id: overrides
                .inventory_id
                .or(env_inventory_id)
                .or(file_inventory.inventory_id)
                .unwrap_or(DEFAULT_INVENTORY_ID),
            timeout: inventory_timeout,
        };

        let logging = LoggingConfig {
            filter: overrides
                .log_filter
                .clone()
                .or(env.log_level)
                .or(file_logging.filter)
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        };

        let config = Config {
            server,
            discovery,
            inventory,
            logging,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok((config, warnings))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Environment wins over the file; either may be absent.
fn pick_duration(
    env_key: &'static str,
    env_value: Option<String>,
    file_key: &'static str,
    file_value: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    let (key, raw) = match (env_value, file_value) {
        (Some(raw), _) => (env_key, raw),
        (None, Some(raw)) => (file_key, raw),
        (None, None) => return Ok(None),
    };
    parse_duration(&raw)
        .map(Some)
        .map_err(|reason| ConfigLoadError::InvalidValue {
            key,
            value: raw,
            reason,
        })
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(trimmed).map_err(|err| err.to_string())
}

fn require_positive(
    key: &'static str,
    value: Duration,
) -> Result<(), ConfigLoadError> {
    if value.is_zero() {
        return Err(ConfigLoadError::InvalidValue {
            key,
            value: "0s".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
