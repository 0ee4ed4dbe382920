pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
    ConfigOverrides,
};
pub use models::{
    Config, ConfigMetadata, DiscoveryConfig, InventoryConfig,
    InventoryTransport, LoggingConfig, ServerConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
