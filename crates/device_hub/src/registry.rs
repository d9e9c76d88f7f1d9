//! Registry of connected devices keyed by `<platform>:<address>`

use crate::adapter::DeviceAdapter;
use crate::connector::VendorConnector;
use crate::error::{DeviceError, Result};
use crate::platform::{DeviceId, Platform};
use crate::session::DeviceConnector;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Construction lock for one id
type BuildLock = Arc<Mutex<()>>;

/// Keyed cache of live device adapters
///
/// Entries are never evicted. `get` on an unknown id connects lazily.
/// Construction for an id is serialized by a per-id lock, so concurrent
/// callers for the same id never open two vendor sessions; different ids
/// connect in parallel. Adapters land in the cache only once construction
/// succeeds, and lookups of the cache never wait on a connect in flight.
pub struct DeviceRegistry {
    connector: Arc<dyn DeviceConnector>,
    devices: Mutex<HashMap<DeviceId, Arc<DeviceAdapter>>>,
    building: Mutex<HashMap<DeviceId, BuildLock>>,
}

impl DeviceRegistry {
    /// Create an empty registry opening sessions through `connector`
    pub fn new(connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            connector,
            devices: Mutex::new(HashMap::new()),
            building: Mutex::new(HashMap::new()),
        }
    }

    async fn cached(&self, id: &DeviceId) -> Option<Arc<DeviceAdapter>> {
        self.devices.lock().await.get(id).cloned()
    }

    async fn build_lock(&self, id: &DeviceId) -> BuildLock {
        let mut building = self.building.lock().await;
        building.entry(id.clone()).or_default().clone()
    }

    /// Drop the id's build lock once no other caller is waiting on it
    async fn release(&self, id: &DeviceId, lock: BuildLock) {
        let mut building = self.building.lock().await;
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            building.remove(id);
        }
    }

    async fn open(&self, tag: &str, address: &str) -> Result<Arc<DeviceAdapter>> {
        let adapter =
            DeviceAdapter::connect(self.connector.as_ref(), Platform::from_tag(tag), address)
                .await?;
        Ok(Arc::new(adapter))
    }

    /// Connect a device and cache it, replacing any adapter under the same id
    ///
    /// The replaced adapter is dropped without a disconnect. If the new
    /// connection fails, the previous entry stays in place.
    pub async fn connect(&self, platform: &str, address: &str) -> Result<DeviceId> {
        let id = DeviceId::new(platform, address);

        let lock = self.build_lock(&id).await;
        let opened = async {
            let _building = lock.lock().await;
            let adapter = self.open(platform, address).await?;
            if self.devices.lock().await.insert(id.clone(), adapter).is_some() {
                warn!("replaced cached adapter for {}", id);
            }
            Ok::<(), DeviceError>(())
        }
        .await;
        self.release(&id, lock).await;

        if let Err(e) = opened {
            warn!("connect {} failed: {}", id, e);
            return Err(e);
        }
        info!("connected {}", id);
        Ok(id)
    }

    /// Cached adapter for `id`, connecting first if the id is unknown
    ///
    /// The id is split on its first `:` into platform tag and address.
    pub async fn get(&self, id: impl Into<DeviceId>) -> Result<Arc<DeviceAdapter>> {
        let id = id.into();
        let (tag, address) = id.parts()?;

        if let Some(adapter) = self.cached(&id).await {
            return Ok(adapter);
        }

        let lock = self.build_lock(&id).await;
        let adapter = async {
            let _building = lock.lock().await;
            // Another caller may have finished while we waited
            if let Some(adapter) = self.cached(&id).await {
                return Ok(adapter);
            }
            info!("{} not connected yet, connecting", id);
            let adapter = self.open(tag, address).await?;
            self.devices.lock().await.insert(id.clone(), adapter.clone());
            Ok::<_, DeviceError>(adapter)
        }
        .await;
        self.release(&id, lock).await;
        adapter
    }

    /// Whether an adapter is cached under `id`
    pub async fn contains(&self, id: &str) -> bool {
        self.devices.lock().await.contains_key(&DeviceId::from(id))
    }

    /// Ids with a cached adapter, sorted
    pub async fn ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.devices.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.devices.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(Arc::new(VendorConnector::new()))
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry").finish_non_exhaustive()
    }
}

/// Process-wide registry instance
static DEVICE_REGISTRY: OnceLock<DeviceRegistry> = OnceLock::new();

/// Get the process-wide registry, backed by [`VendorConnector`]
pub fn global_registry() -> &'static DeviceRegistry {
    DEVICE_REGISTRY.get_or_init(DeviceRegistry::default)
}

/// Connect a device in the process-wide registry and return its id
pub async fn connect_device(platform: &str, device_url: &str) -> Result<DeviceId> {
    global_registry().connect(platform, device_url).await
}

/// Get a device from the process-wide registry, connecting on first use
pub async fn get_device(device_id: &str) -> Result<Arc<DeviceAdapter>> {
    global_registry().get(device_id).await
}
