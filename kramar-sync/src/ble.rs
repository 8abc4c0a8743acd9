//! Native Bluetooth Low Energy central backed by btleplug.
//!
//! Only built with the `native-ble` feature.

use crate::error::{SyncError, SyncResult};
use crate::transport::{
    BleCentral, Channel, DeviceHandle, GattLink, PlatformCapabilities, ServiceFilter,
};
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long discovery scans before giving up.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Conservative write size for links that did not negotiate a larger MTU.
pub const DEFAULT_MAX_WRITE_LEN: usize = 182;

const SCAN_POLL: Duration = Duration::from_millis(250);

impl From<btleplug::Error> for SyncError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::NotConnected => SyncError::Disconnected,
            btleplug::Error::TimedOut(_) => SyncError::Timeout,
            btleplug::Error::DeviceNotFound => {
                SyncError::DiscoveryCancelled("device not found".into())
            }
            btleplug::Error::PermissionDenied | btleplug::Error::NotSupported(_) => {
                SyncError::Unsupported(err.to_string())
            }
            other => SyncError::ConnectionFailed(other.to_string()),
        }
    }
}

/// Checks whether the host has a usable Bluetooth adapter.
pub async fn detect_capabilities(touch_input: bool) -> PlatformCapabilities {
    let native_bluetooth = match Manager::new().await {
        Ok(manager) => manager
            .adapters()
            .await
            .map(|adapters| !adapters.is_empty())
            .unwrap_or(false),
        Err(e) => {
            debug!(error = %e, "no bluetooth manager");
            false
        }
    };
    PlatformCapabilities {
        native_bluetooth,
        touch_input,
    }
}

/// A central on the host's first Bluetooth adapter.
pub struct BtleplugCentral {
    adapter: Adapter,
    scan_timeout: Duration,
    max_write_len: usize,
    peripherals: Mutex<HashMap<String, Peripheral>>,
}

impl BtleplugCentral {
    /// Opens the first adapter.
    pub async fn new() -> SyncResult<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Unsupported("no bluetooth adapter found".into()))?;
        Ok(Self {
            adapter,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            max_write_len: DEFAULT_MAX_WRITE_LEN,
            peripherals: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_max_write_len(mut self, len: usize) -> Self {
        self.max_write_len = len;
        self
    }

    async fn find_advertiser(&self, services: &[Uuid]) -> SyncResult<Option<Peripheral>> {
        for peripheral in self.adapter.peripherals().await? {
            let Some(props) = peripheral.properties().await? else {
                continue;
            };
            if props.services.iter().any(|s| services.contains(s)) {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl BleCentral for BtleplugCentral {
    async fn request_device(&self, filter: &ServiceFilter) -> SyncResult<DeviceHandle> {
        self.adapter
            .start_scan(ScanFilter {
                services: filter.services.clone(),
            })
            .await?;
        info!(services = ?filter.services, "scanning for peers");

        let found = tokio::time::timeout(self.scan_timeout, async {
            loop {
                if let Some(p) = self.find_advertiser(&filter.services).await? {
                    return Ok::<_, SyncError>(p);
                }
                tokio::time::sleep(SCAN_POLL).await;
            }
        })
        .await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!(error = %e, "failed to stop scan");
        }

        let peripheral = match found {
            Ok(result) => result?,
            Err(_) => {
                return Err(SyncError::DiscoveryCancelled(
                    "no advertising peer found".into(),
                ));
            }
        };

        let name = peripheral
            .properties()
            .await?
            .and_then(|props| props.local_name);
        let id = format!("{:?}", peripheral.id());
        debug!(%id, ?name, "peer found");

        if let Ok(mut known) = self.peripherals.lock() {
            known.insert(id.clone(), peripheral);
        }
        Ok(DeviceHandle::new(id, name))
    }

    async fn connect(&self, device: &DeviceHandle) -> SyncResult<Arc<dyn GattLink>> {
        let peripheral = self
            .peripherals
            .lock()
            .ok()
            .and_then(|known| known.get(&device.id).cloned())
            .ok_or_else(|| SyncError::ConnectionFailed(format!("unknown device {}", device.id)))?;

        let events = self.adapter.events().await?;
        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let link = BtleplugLink::new(device.clone(), peripheral, events, self.max_write_len);
        Ok(Arc::new(link))
    }
}

/// A GATT connection to one peripheral.
pub struct BtleplugLink {
    device: DeviceHandle,
    peripheral: Peripheral,
    max_write_len: usize,
    state: Arc<watch::Sender<bool>>,
    watcher: JoinHandle<()>,
    notifications: AsyncMutex<Option<BoxStream<'static, btleplug::api::ValueNotification>>>,
}

impl BtleplugLink {
    fn new(
        device: DeviceHandle,
        peripheral: Peripheral,
        mut events: std::pin::Pin<Box<dyn futures::Stream<Item = CentralEvent> + Send>>,
        max_write_len: usize,
    ) -> Self {
        let (state, _) = watch::channel(false);
        let state = Arc::new(state);
        let id: PeripheralId = peripheral.id();

        let watch_state = state.clone();
        let watcher = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(gone) = event {
                    if gone == id {
                        debug!(peer = ?gone, "adapter reported disconnect");
                        watch_state.send_replace(true);
                        return;
                    }
                }
            }
        });

        Self {
            device,
            peripheral,
            max_write_len,
            state,
            watcher,
            notifications: AsyncMutex::new(None),
        }
    }

    fn find(&self, service: Uuid, characteristic: Uuid) -> Option<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == characteristic)
    }
}

#[async_trait]
impl GattLink for BtleplugLink {
    fn device(&self) -> &DeviceHandle {
        &self.device
    }

    fn is_connected(&self) -> bool {
        !*self.state.borrow()
    }

    fn max_write_len(&self) -> usize {
        self.max_write_len
    }

    fn disconnected(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    async fn get_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> SyncResult<Channel> {
        if self.find(service, characteristic).is_none() {
            return Err(SyncError::Protocol(format!(
                "peer lacks characteristic {characteristic}"
            )));
        }
        Ok(Channel {
            service,
            characteristic,
        })
    }

    async fn write_value(&self, channel: &Channel, bytes: &[u8]) -> SyncResult<()> {
        if !self.is_connected() {
            return Err(SyncError::Disconnected);
        }
        let target = self
            .find(channel.service, channel.characteristic)
            .ok_or(SyncError::Disconnected)?;
        self.peripheral
            .write(&target, bytes, WriteType::WithResponse)
            .await
            .map_err(|e| match SyncError::from(e) {
                SyncError::Disconnected => SyncError::Disconnected,
                other => SyncError::Transmission(other.to_string()),
            })
    }

    async fn read_value(&self, channel: &Channel) -> SyncResult<Vec<u8>> {
        let mut guard = self.notifications.lock().await;
        if guard.is_none() {
            let target = self
                .find(channel.service, channel.characteristic)
                .ok_or(SyncError::Disconnected)?;
            self.peripheral.subscribe(&target).await?;
            *guard = Some(self.peripheral.notifications().await?);
        }
        let stream = guard.as_mut().ok_or(SyncError::Disconnected)?;

        let mut down = self.disconnected();
        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(n) if n.uuid == channel.characteristic => return Ok(n.value),
                    Some(_) => continue,
                    None => return Err(SyncError::Disconnected),
                },
                changed = down.changed() => {
                    if changed.is_err() || *down.borrow() {
                        return Err(SyncError::Disconnected);
                    }
                }
            }
        }
    }

    async fn disconnect(&self) -> SyncResult<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let result = self.peripheral.disconnect().await;
        self.state.send_replace(true);
        result.map_err(Into::into)
    }
}

impl Drop for BtleplugLink {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}
