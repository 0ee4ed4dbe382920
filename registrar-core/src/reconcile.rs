use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::discovery::DeviceDiscovery;
use crate::inventory::InventoryClient;
use crate::registration::RegistrationResolver;
use crate::types::{DeviceGuid, NewHost, ReconcileOutcome, RegistrationState};

/// Drives a registration request from "is this a device we onboarded?" to a
/// host record in the inventory.
///
/// The inventory offers no transactions, so the engine closes the
/// check-then-create race itself: every GUID has its own async mutex, held
/// from the registration check until the create call returns. Different GUIDs
/// never wait on each other.
///
/// The locked section runs on its own task. If the caller goes away mid-way
/// the create still finishes and the lock is released only afterwards, so the
/// next caller sees the host instead of racing an unfinished create.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    discovery: Arc<DeviceDiscovery>,
    resolver: RegistrationResolver,
    inventory: Arc<dyn InventoryClient>,
    inventory_id: u64,
    // Only known GUIDs get an entry, so this is bounded by the voucher count.
    in_flight: Arc<DashMap<DeviceGuid, Arc<Mutex<()>>>>,
}

impl ReconciliationEngine {
    pub fn new(
        discovery: Arc<DeviceDiscovery>,
        inventory: Arc<dyn InventoryClient>,
        inventory_id: u64,
    ) -> Self {
        Self {
            discovery,
            resolver: RegistrationResolver::new(Arc::clone(&inventory)),
            inventory,
            inventory_id,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn discovery(&self) -> &Arc<DeviceDiscovery> {
        &self.discovery
    }

    pub fn inventory_id(&self) -> u64 {
        self.inventory_id
    }

    /// Register `guid` unless it is unknown or already registered.
    pub async fn reconcile(&self, guid: &DeviceGuid) -> ReconcileOutcome {
        info!(guid = %guid, "received register request");

        if !self.discovery.is_known(guid) {
            warn!(guid = %guid, "device not found in known devices");
            return ReconcileOutcome::NotFound;
        }

        let engine = self.clone();
        let owned = guid.clone();
        let task =
            tokio::spawn(async move { engine.check_and_register(owned).await });

        match task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(guid = %guid, error = %err, "registration task failed");
                ReconcileOutcome::RegisterFailed
            }
        }
    }

    fn guid_lock(&self, guid: &DeviceGuid) -> Arc<Mutex<()>> {
        self.in_flight
            .entry(guid.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn check_and_register(&self, guid: DeviceGuid) -> ReconcileOutcome {
        let lock = self.guid_lock(&guid);
        let _serialized = lock.lock().await;

        match self.resolver.is_registered(&guid).await {
            RegistrationState::Unknown => {
                error!(guid = %guid, "cannot determine registration for device");
                ReconcileOutcome::CheckFailed
            }
            RegistrationState::Registered => {
                warn!(guid = %guid, "device is already registered");
                ReconcileOutcome::AlreadyRegistered
            }
            RegistrationState::NotRegistered => {
                info!(guid = %guid, inventory = self.inventory_id, "registering device");
                let host = NewHost::for_device(&guid, self.inventory_id);
                if self.inventory.create_host(&host).await {
                    info!(guid = %guid, "device added to inventory");
                    ReconcileOutcome::Registered
                } else {
                    error!(guid = %guid, "could not register device");
                    ReconcileOutcome::RegisterFailed
                }
            }
        }
    }
}
