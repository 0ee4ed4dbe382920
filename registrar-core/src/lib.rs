//! Core library for the device registrar.
//!
//! The registrar bridges a device onboarding server and an automation
//! platform's host inventory. Onboarding leaves one voucher file per device
//! in a directory; the file name is the device GUID. When a device asks to be
//! registered, the [`ReconciliationEngine`] checks that the GUID belongs to a
//! discovered voucher, asks the inventory whether a host already carries that
//! GUID in its variables, and creates the host record if it does not.
//!
//! The pieces, leaf first:
//!
//! - [`discovery`]: walks the voucher directory and keeps the additive
//!   known-device set.
//! - [`inventory`]: the two-operation [`InventoryClient`] seam with CLI, REST
//!   and in-memory implementations.
//! - [`registration`]: the tri-state "is this GUID registered" check.
//! - [`reconcile`]: the engine that ties them together and serializes
//!   check-then-create per GUID.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod discovery;
pub mod error;
pub mod inventory;
pub mod reconcile;
pub mod registration;
pub mod types;

pub use discovery::{DeviceDiscovery, DiscoveryScan, KnownDevice, KnownDevices};
pub use error::{DiscoveryError, InventoryUnavailable};
pub use inventory::InventoryClient;
pub use reconcile::ReconciliationEngine;
pub use registration::RegistrationResolver;
pub use types::{
    DeviceGuid, HostRecord, HostVariables, NewHost, ReconcileOutcome,
    RegistrationState,
};
