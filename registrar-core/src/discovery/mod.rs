//! Voucher discovery.
//!
//! Onboarding drops one voucher per device into the voucher directory, named
//! after the device GUID. [`DeviceDiscovery::refresh`] walks that tree and
//! folds every file name it finds into the known-device set. The set only
//! grows: a voucher that later disappears keeps its GUID known until the
//! process restarts.

pub mod fs;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;
use crate::types::DeviceGuid;
use fs::{EntryKind, RealFs, VoucherFs};

pub const DEFAULT_WALK_TIMEOUT: Duration = Duration::from_secs(10);

/// Nested directories deeper than this are not descended into. Guards against
/// symlink cycles, which the walker follows.
const MAX_WALK_DEPTH: usize = 32;

/// Discovery metadata for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownDevice {
    pub guid: DeviceGuid,
    pub first_seen: DateTime<Utc>,
    /// Where the voucher was when the GUID was first discovered.
    pub voucher_path: PathBuf,
}

/// Immutable snapshot of the known-device set.
#[derive(Debug, Clone, Default)]
pub struct KnownDevices {
    devices: HashMap<DeviceGuid, KnownDevice>,
}

impl KnownDevices {
    pub fn contains(&self, guid: &DeviceGuid) -> bool {
        self.devices.contains_key(guid)
    }

    pub fn get(&self, guid: &DeviceGuid) -> Option<&KnownDevice> {
        self.devices.get(guid)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnownDevice> {
        self.devices.values()
    }

    /// Devices ordered by GUID, for stable listings.
    pub fn sorted(&self) -> Vec<KnownDevice> {
        let mut devices: Vec<_> = self.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.guid.cmp(&b.guid));
        devices
    }
}

/// Summary of one directory walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryScan {
    /// Every distinct voucher name seen by this walk.
    pub found: BTreeSet<DeviceGuid>,
    /// GUIDs that were not known before this walk.
    pub added: Vec<DeviceGuid>,
    /// Size of the known set after the walk.
    pub known: usize,
}

/// Owner of the known-device set.
///
/// Readers get cheap `Arc` snapshots; a refresh builds a new snapshot and
/// swaps it in, so nobody ever observes a half-applied walk. Refreshes are
/// serialized among themselves so concurrent walks cannot drop each other's
/// additions.
pub struct DeviceDiscovery {
    voucher_dir: PathBuf,
    fs: Arc<dyn VoucherFs>,
    walk_timeout: Duration,
    known: RwLock<Arc<KnownDevices>>,
    refresh_gate: Mutex<()>,
}

impl std::fmt::Debug for DeviceDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDiscovery")
            .field("voucher_dir", &self.voucher_dir)
            .field("walk_timeout", &self.walk_timeout)
            .field("known", &self.known.read().len())
            .finish_non_exhaustive()
    }
}

impl DeviceDiscovery {
    pub fn new(voucher_dir: impl Into<PathBuf>) -> Self {
        Self::with_filesystem(voucher_dir, Arc::new(RealFs))
    }

    pub fn with_filesystem(
        voucher_dir: impl Into<PathBuf>,
        fs: Arc<dyn VoucherFs>,
    ) -> Self {
        Self {
            voucher_dir: voucher_dir.into(),
            fs,
            walk_timeout: DEFAULT_WALK_TIMEOUT,
            known: RwLock::new(Arc::new(KnownDevices::default())),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn with_walk_timeout(mut self, walk_timeout: Duration) -> Self {
        self.walk_timeout = walk_timeout;
        self
    }

    pub fn voucher_dir(&self) -> &Path {
        &self.voucher_dir
    }

    pub fn is_known(&self, guid: &DeviceGuid) -> bool {
        self.known.read().contains(guid)
    }

    pub fn snapshot(&self) -> Arc<KnownDevices> {
        Arc::clone(&self.known.read())
    }

    pub fn len(&self) -> usize {
        self.known.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.read().is_empty()
    }

    /// Walk the voucher directory and merge what it holds into the known set.
    ///
    /// On error the known set is left exactly as it was.
    pub async fn refresh(&self) -> Result<DiscoveryScan, DiscoveryError> {
        let _gate = self.refresh_gate.lock().await;

        let vouchers =
            match tokio::time::timeout(self.walk_timeout, self.walk()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(DiscoveryError::Timeout {
                        path: self.voucher_dir.clone(),
                        after: self.walk_timeout,
                    });
                }
            };

        let current = self.snapshot();
        let now = Utc::now();
        let mut found = BTreeSet::new();
        let mut additions: Vec<KnownDevice> = Vec::new();

        for (guid, voucher_path) in vouchers {
            if !found.insert(guid.clone()) {
                continue;
            }
            if current.contains(&guid) {
                debug!(guid = %guid, "device already known, skipping");
                continue;
            }
            info!(
                guid = %guid,
                voucher = %voucher_path.display(),
                "found new device, added to known list"
            );
            additions.push(KnownDevice {
                guid,
                first_seen: now,
                voucher_path,
            });
        }

        let added: Vec<DeviceGuid> =
            additions.iter().map(|device| device.guid.clone()).collect();

        let known = if additions.is_empty() {
            current.len()
        } else {
            let mut next = (*current).clone();
            for device in additions {
                next.devices.insert(device.guid.clone(), device);
            }
            let len = next.len();
            *self.known.write() = Arc::new(next);
            len
        };

        debug!(
            found = found.len(),
            added = added.len(),
            known,
            "voucher directory refreshed"
        );

        Ok(DiscoveryScan {
            found,
            added,
            known,
        })
    }

    /// Breadth-first walk returning `(guid, voucher path)` for every regular
    /// file under the voucher root. Only the root being unreadable is an
    /// error; unreadable subdirectories are skipped.
    async fn walk(&self) -> Result<Vec<(DeviceGuid, PathBuf)>, DiscoveryError> {
        let root = self.voucher_dir.as_path();
        let mut vouchers = Vec::new();
        let mut pending = VecDeque::from([(root.to_path_buf(), 0usize)]);

        while let Some((dir, depth)) = pending.pop_front() {
            let entries = match self.fs.list_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if dir.as_path() == root => {
                    return Err(DiscoveryError::Unreadable {
                        path: root.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "skipping unreadable voucher subdirectory");
                    continue;
                }
            };

            for entry in entries {
                match entry.kind {
                    EntryKind::Dir if depth < MAX_WALK_DEPTH => {
                        pending.push_back((entry.path, depth + 1));
                    }
                    EntryKind::Dir => {
                        warn!(dir = %entry.path.display(), "voucher tree too deep, not descending");
                    }
                    EntryKind::File => {
                        match entry.path.file_name().and_then(|name| name.to_str()) {
                            Some(name) => {
                                vouchers.push((DeviceGuid::from(name), entry.path.clone()))
                            }
                            None => {
                                warn!(path = %entry.path.display(), "skipping voucher with non UTF-8 file name")
                            }
                        }
                    }
                    EntryKind::Other => {}
                }
            }
        }

        Ok(vouchers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs::InMemoryFs;

    fn discovery_over(fs: InMemoryFs) -> DeviceDiscovery {
        DeviceDiscovery::with_filesystem("/vouchers", Arc::new(fs))
    }

    #[tokio::test]
    async fn refresh_collects_files_from_nested_directories() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/vouchers/abc123");
        fs.add_file("/vouchers/batch-7/def456");
        fs.add_dir("/vouchers/empty");

        let discovery = discovery_over(fs);
        let scan = discovery.refresh().await.unwrap();

        assert_eq!(scan.found.len(), 2);
        assert_eq!(scan.added.len(), 2);
        assert_eq!(scan.known, 2);
        assert!(discovery.is_known(&DeviceGuid::from("abc123")));
        assert!(discovery.is_known(&DeviceGuid::from("def456")));
        assert!(!discovery.is_known(&DeviceGuid::from("empty")));
        assert!(!discovery.is_known(&DeviceGuid::from("batch-7")));
    }

    #[tokio::test]
    async fn same_name_in_two_directories_is_one_device() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/vouchers/a/abc123");
        fs.add_file("/vouchers/b/abc123");

        let discovery = discovery_over(fs);
        let scan = discovery.refresh().await.unwrap();

        assert_eq!(scan.found.len(), 1);
        assert_eq!(scan.added, vec![DeviceGuid::from("abc123")]);
        assert_eq!(discovery.len(), 1);
    }

    #[tokio::test]
    async fn rediscovery_is_a_no_op() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/vouchers/abc123");

        let discovery = discovery_over(fs);
        discovery.refresh().await.unwrap();
        let first_seen = discovery
            .snapshot()
            .get(&DeviceGuid::from("abc123"))
            .unwrap()
            .first_seen;

        let scan = discovery.refresh().await.unwrap();
        assert!(scan.added.is_empty());
        assert_eq!(scan.found.len(), 1);
        assert_eq!(
            discovery
                .snapshot()
                .get(&DeviceGuid::from("abc123"))
                .unwrap()
                .first_seen,
            first_seen
        );
    }

    #[tokio::test]
    async fn unreadable_root_fails_and_keeps_known_set() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/vouchers/abc123");
        let discovery = discovery_over(fs.clone());
        discovery.refresh().await.unwrap();

        let mut broken = fs;
        broken.deny_read("/vouchers");
        let discovery = DeviceDiscovery {
            fs: Arc::new(broken),
            ..discovery
        };

        let err = discovery.refresh().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Unreadable { .. }));
        assert!(discovery.is_known(&DeviceGuid::from("abc123")));
    }

    struct StallingFs;

    #[async_trait::async_trait]
    impl VoucherFs for StallingFs {
        async fn list_dir(
            &self,
            _dir: &Path,
        ) -> std::io::Result<Vec<fs::DirEntry>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_walk_times_out_and_keeps_known_set() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/vouchers/abc123");
        let discovery = discovery_over(fs)
            .with_walk_timeout(Duration::from_secs(2));
        discovery.refresh().await.unwrap();

        let discovery = DeviceDiscovery {
            fs: Arc::new(StallingFs),
            ..discovery
        };

        let err = discovery.refresh().await.unwrap_err();
        match err {
            DiscoveryError::Timeout { path, after } => {
                assert_eq!(path, PathBuf::from("/vouchers"));
                assert_eq!(after, Duration::from_secs(2));
            }
            other => panic!("expected a walk timeout, got {other}"),
        }
        assert!(discovery.is_known(&DeviceGuid::from("abc123")));
        assert_eq!(discovery.len(), 1);
    }

    #[tokio::test]
    async fn missing_root_is_a_discovery_error() {
        let discovery = discovery_over(InMemoryFs::new());
        let err = discovery.refresh().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Unreadable { .. }));
        assert!(discovery.is_empty());
    }

    #[tokio::test]
    async fn unreadable_subdirectory_is_skipped() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/vouchers/abc123");
        fs.add_file("/vouchers/locked/def456");
        fs.deny_read("/vouchers/locked");

        let discovery = discovery_over(fs);
        let scan = discovery.refresh().await.unwrap();

        assert_eq!(scan.added, vec![DeviceGuid::from("abc123")]);
        assert!(!discovery.is_known(&DeviceGuid::from("def456")));
    }

    #[tokio::test]
    async fn snapshots_taken_before_refresh_are_unchanged() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/vouchers/abc123");
        let discovery = discovery_over(fs);

        let before = discovery.snapshot();
        discovery.refresh().await.unwrap();

        assert!(before.is_empty());
        assert_eq!(discovery.snapshot().len(), 1);
    }
}
