use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DEFAULT_INVENTORY_TIMEOUT, InventoryClient};
use crate::error::{InventoryResult, InventoryUnavailable};
use crate::types::{HostRecord, NewHost};

#[derive(Debug, Default, Clone)]
struct Faults {
    list_failure: Option<String>,
    create_failure: bool,
    list_delay: Option<Duration>,
    create_delay: Option<Duration>,
}

/// In-memory inventory for tests.
///
/// Behaves like the platform for the registrar's purposes: host names are
/// unique per inventory, created hosts show up in later listings, and calls
/// that take longer than the configured timeout fail like a real client's
/// would. Faults and delays can be injected at any time.
#[derive(Debug)]
pub struct InMemoryInventory {
    hosts: Mutex<Vec<HostRecord>>,
    faults: Mutex<Faults>,
    timeout: Duration,
    next_id: AtomicU64,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl Default for InMemoryInventory {
    fn default() -> Self {
        Self {
            hosts: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            timeout: DEFAULT_INVENTORY_TIMEOUT,
            next_id: AtomicU64::new(1),
            list_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a host directly, bypassing create accounting.
    pub fn seed(&self, name: &str, inventory: u64, variables: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().push(HostRecord {
            id: Some(id),
            name: name.to_owned(),
            inventory: Some(inventory),
            variables: Some(variables.to_owned()),
        });
    }

    pub fn hosts(&self) -> Vec<HostRecord> {
        self.hosts.lock().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Total calls of either kind.
    pub fn calls(&self) -> usize {
        self.list_calls() + self.create_calls()
    }

    pub fn fail_list(&self, reason: impl Into<String>) {
        self.faults.lock().list_failure = Some(reason.into());
    }

    pub fn fail_create(&self, fail: bool) {
        self.faults.lock().create_failure = fail;
    }

    pub fn set_list_delay(&self, delay: Option<Duration>) {
        self.faults.lock().list_delay = delay;
    }

    pub fn set_create_delay(&self, delay: Option<Duration>) {
        self.faults.lock().create_delay = delay;
    }

    /// Clear every injected fault and delay.
    pub fn heal(&self) {
        *self.faults.lock() = Faults::default();
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventory {
    async fn list_hosts(&self) -> InventoryResult<Vec<HostRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let faults = self.faults.lock().clone();

        if let Some(delay) = faults.list_delay
            && tokio::time::timeout(self.timeout, tokio::time::sleep(delay))
                .await
                .is_err()
        {
            return Err(InventoryUnavailable::timeout("host list", self.timeout));
        }
        if let Some(reason) = faults.list_failure {
            return Err(InventoryUnavailable::new(reason));
        }

        Ok(self.hosts())
    }

    async fn create_host(&self, host: &NewHost) -> bool {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let faults = self.faults.lock().clone();

        if let Some(delay) = faults.create_delay
            && tokio::time::timeout(self.timeout, tokio::time::sleep(delay))
                .await
                .is_err()
        {
            return false;
        }
        if faults.create_failure {
            return false;
        }

        let variables = match host.variables.to_payload() {
            Ok(variables) => variables,
            Err(_) => return false,
        };

        let mut hosts = self.hosts.lock();
        let duplicate = hosts.iter().any(|existing| {
            existing.name == host.name
                && existing.inventory == Some(host.inventory_id)
        });
        if duplicate {
            return false;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        hosts.push(HostRecord {
            id: Some(id),
            name: host.name.clone(),
            inventory: Some(host.inventory_id),
            variables: Some(variables),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceGuid;

    #[tokio::test]
    async fn created_hosts_are_listed() {
        let inventory = InMemoryInventory::new();
        let host = NewHost::for_device(&DeviceGuid::from("abc123"), 1);

        assert!(inventory.create_host(&host).await);
        let hosts = inventory.list_hosts().await.unwrap();

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].name, "abc123");
        assert_eq!(inventory.create_calls(), 1);
        assert_eq!(inventory.list_calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_name_in_same_inventory_is_rejected() {
        let inventory = InMemoryInventory::new();
        let host = NewHost::for_device(&DeviceGuid::from("abc123"), 1);

        assert!(inventory.create_host(&host).await);
        assert!(!inventory.create_host(&host).await);
        assert!(
            inventory
                .create_host(&NewHost::for_device(&DeviceGuid::from("abc123"), 2))
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_listing_times_out() {
        let inventory =
            InMemoryInventory::new().with_timeout(Duration::from_secs(5));
        inventory.set_list_delay(Some(Duration::from_secs(60)));

        let err = inventory.list_hosts().await.unwrap_err();
        assert!(err.reason.contains("timed out"));
    }
}
