use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::inventory::InventoryClient;
use crate::types::{DeviceGuid, RegistrationState};

/// Answers "does the inventory already hold a host for this GUID?".
///
/// A host belongs to a device when its variables carry `guid: <GUID>`; the
/// host name is not consulted. This is an existence check, not a uniqueness
/// check: if several hosts claim the GUID the first one wins.
#[derive(Debug, Clone)]
pub struct RegistrationResolver {
    inventory: Arc<dyn InventoryClient>,
}

impl RegistrationResolver {
    pub fn new(inventory: Arc<dyn InventoryClient>) -> Self {
        Self { inventory }
    }

    pub async fn is_registered(&self, guid: &DeviceGuid) -> RegistrationState {
        let hosts = match self.inventory.list_hosts().await {
            Ok(hosts) => hosts,
            Err(err) => {
                error!(guid = %guid, error = %err, "cannot determine whether device is registered");
                return RegistrationState::Unknown;
            }
        };

        for host in &hosts {
            let variables = match host.parsed_variables() {
                Ok(variables) => variables,
                Err(err) => {
                    warn!(
                        host = %host.name,
                        host_id = ?host.id,
                        error = %err,
                        "skipping host with malformed variables"
                    );
                    continue;
                }
            };
            if variables.claims(guid) {
                debug!(guid = %guid, host = %host.name, "device is already registered");
                return RegistrationState::Registered;
            }
        }

        debug!(guid = %guid, scanned = hosts.len(), "device is not registered");
        RegistrationState::NotRegistered
    }
}
