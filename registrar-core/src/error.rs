use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to enumerate the voucher directory.
///
/// Always transient from the registrar's point of view: the known-device set
/// is left untouched and the next refresh tries again.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("voucher directory {path} is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("voucher directory {path} walk timed out after {after:?}")]
    Timeout { path: PathBuf, after: Duration },
}

/// The inventory could not produce a trustworthy host list.
///
/// Transport errors, authentication failures, timeouts and unparseable
/// responses all collapse into this one kind. Callers must treat it as
/// "registration state unknown", never as "not registered".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("inventory unavailable: {reason}")]
pub struct InventoryUnavailable {
    pub reason: String,
}

impl InventoryUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::new(format!("{operation} timed out after {after:?}"))
    }
}

pub type InventoryResult<T> = std::result::Result<T, InventoryUnavailable>;
