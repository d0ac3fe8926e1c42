//! Device representation, address normalization and the paired-device cache.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{CoordinatorError, GatewayError};
use crate::traits::AdapterGateway;

/// Marker preceding the address segment of a BlueZ device object path.
pub const DEVICE_PATH_MARKER: &str = "dev_";

/// Bluetooth device address in canonical `AA:BB:CC:DD:EE:FF` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create from a MAC address string (e.g., "00:11:22:33:44:55").
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into().to_uppercase())
    }

    /// Parse and validate a colon-separated address.
    pub fn parse(s: &str) -> Option<Self> {
        let addr = Self::new(s.trim());
        addr.is_valid().then_some(addr)
    }

    /// Six colon-separated hex octets.
    pub fn is_valid(&self) -> bool {
        let parts: Vec<&str> = self.0.split(':').collect();
        parts.len() == 6
            && parts
                .iter()
                .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
    }

    /// Derive the address from a daemon device reference.
    ///
    /// The segment following [`DEVICE_PATH_MARKER`] has its `_` separators
    /// replaced with `:`, so `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF` becomes
    /// `AA:BB:CC:DD:EE:FF`.
    pub fn from_device_path(path: &str) -> Result<Self, CoordinatorError> {
        let malformed = || CoordinatorError::MalformedDeviceRef(path.to_string());

        let (_, tail) = path.rsplit_once(DEVICE_PATH_MARKER).ok_or_else(malformed)?;
        let segment = tail.split('/').next().unwrap_or_default();
        Self::parse(&segment.replace('_', ":")).ok_or_else(malformed)
    }

    /// Build the BlueZ object path for this address under `adapter`.
    pub fn to_device_path(&self, adapter: &str) -> String {
        format!(
            "/org/bluez/{}/{}{}",
            adapter,
            DEVICE_PATH_MARKER,
            self.0.replace(':', "_")
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoordinatorError::MalformedDeviceRef(s.to_string()))
    }
}

/// A2DP role advertised by a remote device.
///
/// `Sink` devices receive audio from us; `Source` devices send audio to us
/// and accept media control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum A2dpRole {
    Source,
    Sink,
    #[default]
    None,
}

impl fmt::Display for A2dpRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            A2dpRole::Source => "source",
            A2dpRole::Sink => "sink",
            A2dpRole::None => "none",
        };
        f.write_str(s)
    }
}

/// A device reported by the daemon during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: Address,
    pub alias: String,
    pub path: String,
}

/// Cached view of a remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub address: Address,
    /// User-friendly name.
    pub alias: String,
    /// Daemon object path.
    pub path: String,
    pub paired: bool,
    pub connected: bool,
    pub a2dp_role: A2dpRole,
    /// Seen in the most recent discovery snapshot.
    pub discovered: bool,
}

impl DeviceRecord {
    pub fn new(address: Address) -> Self {
        Self {
            alias: address.to_string(),
            path: String::new(),
            address,
            paired: false,
            connected: false,
            a2dp_role: A2dpRole::None,
            discovered: false,
        }
    }

    /// Alias if set, otherwise the address.
    pub fn display_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.address.0
        } else {
            &self.alias
        }
    }
}

impl From<DiscoveredDevice> for DeviceRecord {
    fn from(device: DiscoveredDevice) -> Self {
        Self {
            alias: device.alias,
            path: device.path,
            discovered: true,
            ..Self::new(device.address)
        }
    }
}

/// Read-refresh mirror of the daemon's paired devices.
///
/// Readers take snapshots. The cache is only refreshed through
/// [`DeviceCache::invalidate`] (device actions and successful pairing) or an
/// explicit [`DeviceCache::reload`].
pub struct DeviceCache {
    gateway: Arc<dyn AdapterGateway>,
    paired: RwLock<HashMap<Address, DeviceRecord>>,
    generation: AtomicU64,
}

impl DeviceCache {
    pub fn new(gateway: Arc<dyn AdapterGateway>) -> Self {
        Self {
            gateway,
            paired: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Query the gateway for paired devices without touching the cache.
    pub async fn query(&self) -> Result<Vec<DeviceRecord>, GatewayError> {
        let devices = self.gateway.get_paired_devices().await?;
        Ok(sorted(devices.into_values()))
    }

    /// Replace the cached set with a fresh query.
    pub async fn reload(&self) -> Result<Vec<DeviceRecord>, GatewayError> {
        let devices = self.gateway.get_paired_devices().await?;
        let snapshot = sorted(devices.values().cloned());
        *self.paired.write().await = devices;
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!("Paired device cache reloaded ({} devices)", snapshot.len());
        Ok(snapshot)
    }

    /// Refresh after an action touching `address`.
    ///
    /// If the gateway cannot be queried the entry for `address` is dropped
    /// rather than left stale.
    pub(crate) async fn invalidate(&self, address: &Address) {
        if let Err(e) = self.reload().await {
            warn!("Failed to refresh device cache after change to {}: {}", address, e);
            self.paired.write().await.remove(address);
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Snapshot of the cached paired devices, ordered by address.
    pub async fn snapshot(&self) -> Vec<DeviceRecord> {
        sorted(self.paired.read().await.values().cloned())
    }

    pub async fn get(&self, address: &Address) -> Option<DeviceRecord> {
        self.paired.read().await.get(address).cloned()
    }

    pub async fn contains(&self, address: &Address) -> bool {
        self.paired.read().await.contains_key(address)
    }

    /// Incremented on every refresh.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

fn sorted(devices: impl Iterator<Item = DeviceRecord>) -> Vec<DeviceRecord> {
    let mut devices: Vec<DeviceRecord> = devices.collect();
    devices.sort_by(|a, b| a.address.cmp(&b.address));
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockAdapterGateway;

    fn paired_record(addr: &str) -> DeviceRecord {
        DeviceRecord {
            paired: true,
            ..DeviceRecord::new(Address::new(addr))
        }
    }

    mod address {
        use super::*;

        #[test]
        fn normalizes_to_uppercase() {
            let addr = Address::new("aa:bb:cc:dd:ee:ff");
            assert_eq!(addr.0, "AA:BB:CC:DD:EE:FF");
        }

        #[test]
        fn parse_rejects_bad_shapes() {
            assert!(Address::parse("AA:BB:CC:DD:EE").is_none());
            assert!(Address::parse("AA:BB:CC:DD:EE:GG").is_none());
            assert!(Address::parse("AABBCCDDEEFF").is_none());
            assert!(Address::parse(" 00:11:22:33:44:55 ").is_some());
        }

        #[test]
        fn from_device_path_normalizes() {
            let addr = Address::from_device_path("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF").unwrap();
            assert_eq!(addr, Address::new("AA:BB:CC:DD:EE:FF"));
        }

        #[test]
        fn from_device_path_ignores_trailing_segments() {
            let addr =
                Address::from_device_path("/org/bluez/hci1/dev_00_1a_7d_da_71_13/sep1/fd0").unwrap();
            assert_eq!(addr.0, "00:1A:7D:DA:71:13");
        }

        #[test]
        fn from_device_path_rejects_malformed() {
            for path in ["/org/bluez/hci0", "/org/bluez/hci0/dev_AA_BB", "dev_", ""] {
                let err = Address::from_device_path(path).unwrap_err();
                assert!(matches!(err, CoordinatorError::MalformedDeviceRef(_)), "{}", path);
            }
        }

        #[test]
        fn device_path_round_trip() {
            let addr = Address::new("00:11:22:33:44:55");
            let path = addr.to_device_path("hci0");
            assert_eq!(path, "/org/bluez/hci0/dev_00_11_22_33_44_55");
            assert_eq!(Address::from_device_path(&path).unwrap(), addr);
        }
    }

    mod device_record {
        use super::*;

        #[test]
        fn discovered_device_is_tagged() {
            let record: DeviceRecord = DiscoveredDevice {
                address: Address::new("00:11:22:33:44:55"),
                alias: "Speaker".to_string(),
                path: "/org/bluez/hci0/dev_00_11_22_33_44_55".to_string(),
            }
            .into();
            assert!(record.discovered);
            assert!(!record.paired);
            assert_eq!(record.display_name(), "Speaker");
        }

        #[test]
        fn display_name_falls_back_to_address() {
            let mut record = DeviceRecord::new(Address::new("00:11:22:33:44:55"));
            record.alias.clear();
            assert_eq!(record.display_name(), "00:11:22:33:44:55");
        }
    }

    mod cache {
        use super::*;

        #[tokio::test]
        async fn reload_replaces_snapshot() {
            let mut gateway = MockAdapterGateway::new();
            gateway.expect_get_paired_devices().returning(|| {
                let mut map = HashMap::new();
                for addr in ["11:11:11:11:11:11", "00:00:00:00:00:01"] {
                    map.insert(Address::new(addr), paired_record(addr));
                }
                Ok(map)
            });

            let cache = DeviceCache::new(Arc::new(gateway));
            assert!(cache.snapshot().await.is_empty());

            let devices = cache.reload().await.unwrap();
            assert_eq!(devices.len(), 2);
            assert_eq!(devices[0].address.0, "00:00:00:00:00:01");
            assert!(cache.contains(&Address::new("11:11:11:11:11:11")).await);
            assert_eq!(cache.generation(), 1);
        }

        #[tokio::test]
        async fn query_does_not_touch_cache() {
            let mut gateway = MockAdapterGateway::new();
            gateway.expect_get_paired_devices().returning(|| {
                let mut map = HashMap::new();
                map.insert(Address::new("00:11:22:33:44:55"), paired_record("00:11:22:33:44:55"));
                Ok(map)
            });

            let cache = DeviceCache::new(Arc::new(gateway));
            assert_eq!(cache.query().await.unwrap().len(), 1);
            assert!(cache.snapshot().await.is_empty());
            assert_eq!(cache.generation(), 0);
        }

        #[tokio::test]
        async fn invalidate_drops_entry_when_gateway_fails() {
            let mut gateway = MockAdapterGateway::new();
            let mut calls = 0;
            gateway.expect_get_paired_devices().returning(move || {
                calls += 1;
                if calls == 1 {
                    let mut map = HashMap::new();
                    map.insert(Address::new("00:11:22:33:44:55"), paired_record("00:11:22:33:44:55"));
                    Ok(map)
                } else {
                    Err(GatewayError::BlueZ("org.bluez.Error.Failed".to_string()))
                }
            });

            let cache = DeviceCache::new(Arc::new(gateway));
            cache.reload().await.unwrap();
            let addr = Address::new("00:11:22:33:44:55");
            cache.invalidate(&addr).await;
            assert!(!cache.contains(&addr).await);
            assert_eq!(cache.generation(), 2);
        }
    }
}
