//! Host inventory of the automation platform.
//!
//! Everything fragile about the platform (process spawning, HTTP, auth,
//! payload parsing, timeouts) stays behind [`InventoryClient`], which exposes
//! exactly two operations. The engine only sees a host list or
//! [`InventoryUnavailable`](crate::error::InventoryUnavailable), and a create that either happened or did not.

pub mod awx_api;
pub mod awx_cli;
pub mod memory;
mod page;

use std::fmt;

use async_trait::async_trait;

pub use awx_api::{AwxApiConfig, AwxApiInventory, AwxApiSetupError};
pub use awx_cli::{AwxCliConfig, AwxCliInventory};
pub use memory::InMemoryInventory;

use crate::error::InventoryResult;
use crate::types::{HostRecord, NewHost};

/// Default bound on any single inventory call.
pub const DEFAULT_INVENTORY_TIMEOUT: std::time::Duration =
    std::time::Duration::from_secs(30);

#[async_trait]
pub trait InventoryClient: Send + Sync + fmt::Debug {
    /// Fetch every host the platform knows about.
    async fn list_hosts(&self) -> InventoryResult<Vec<HostRecord>>;

    /// Append a host. Returns `false` on any failure, including the platform
    /// rejecting a duplicate; the platform is the authority on conflicts.
    async fn create_host(&self, host: &NewHost) -> bool;
}
