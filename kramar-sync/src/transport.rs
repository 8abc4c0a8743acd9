//! Proximity transport abstraction.
//!
//! Defines the traits a Bluetooth Low Energy central backend implements,
//! allowing the session and negotiation layers to work with any backend
//! (btleplug, the in-memory mock, or a platform bridge).

use crate::error::SyncResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Which transport tier a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    /// A real BLE central with GATT access.
    NativeBle,
    /// No Bluetooth API; pairing is simulated and no bytes are exchanged.
    SimulatedFallback,
}

/// What the platform can do, checked once before a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformCapabilities {
    /// A Bluetooth central API is available.
    pub native_bluetooth: bool,
    /// The device has touch input (mobile form factor).
    pub touch_input: bool,
}

impl PlatformCapabilities {
    /// Selects the transport tier, or `None` when proximity sync is unsupported.
    pub fn tier(&self) -> Option<TransportKind> {
        if self.native_bluetooth {
            Some(TransportKind::NativeBle)
        } else if self.touch_input {
            Some(TransportKind::SimulatedFallback)
        } else {
            None
        }
    }
}

/// Opaque reference to a remote device chosen during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Backend-specific identifier.
    pub id: String,
    /// Advertised name, if any.
    pub name: Option<String>,
}

impl DeviceHandle {
    /// Creates a device handle.
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }
}

/// Services a discovered peer must advertise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFilter {
    pub services: Vec<Uuid>,
}

/// A resolved GATT characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// The central role: discovery and connection.
#[async_trait]
pub trait BleCentral: Send + Sync {
    /// Picks a nearby peer advertising one of `filter.services`.
    async fn request_device(&self, filter: &ServiceFilter) -> SyncResult<DeviceHandle>;

    /// Opens a GATT connection to `device`.
    ///
    /// Returns [`SyncError::Disconnected`](crate::SyncError::Disconnected) if
    /// the link drops while connecting, and `ConnectionFailed` if the peer is
    /// unreachable or rejects.
    async fn connect(&self, device: &DeviceHandle) -> SyncResult<Arc<dyn GattLink>>;
}

/// An open GATT connection.
#[async_trait]
pub trait GattLink: Send + Sync {
    /// The remote device.
    fn device(&self) -> &DeviceHandle;

    /// Whether the link is still up.
    fn is_connected(&self) -> bool;

    /// Largest single characteristic write the link accepts.
    fn max_write_len(&self) -> usize;

    /// Flips to `true` once, when the link goes down for any reason.
    fn disconnected(&self) -> watch::Receiver<bool>;

    /// Resolves a characteristic on the connected peer.
    async fn get_characteristic(&self, service: Uuid, characteristic: Uuid)
        -> SyncResult<Channel>;

    /// Writes one chunk. Fails if the link has dropped.
    async fn write_value(&self, channel: &Channel, bytes: &[u8]) -> SyncResult<()>;

    /// Waits for the next inbound chunk on `channel`.
    async fn read_value(&self, channel: &Channel) -> SyncResult<Vec<u8>>;

    /// Closes the link. Closing twice is a no-op.
    async fn disconnect(&self) -> SyncResult<()>;
}

/// Resolves once `rx` reports the link down (or its sender is gone).
pub async fn wait_for_disconnect(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// A mock transport for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Default write limit of mock links (a typical BLE 4.2 payload).
    pub const MOCK_MAX_WRITE_LEN: usize = 182;

    /// A recorded central operation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TransportOp {
        /// Discovery started while `open_links` earlier links were still up.
        RequestDevice { open_links: usize },
        /// Connect attempted to the device with this id.
        Connect(String),
    }

    /// A failure to inject into the next matching operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockFailure {
        /// The user dismisses the picker.
        DiscoveryCancelled,
        /// The peer rejects the connection.
        ConnectRefused,
        /// The link drops before the connection completes.
        DropDuringConnect,
    }

    /// A mock central that hands out [`MockLink`]s.
    pub struct MockCentral {
        device: DeviceHandle,
        queued: Mutex<VecDeque<Arc<MockLink>>>,
        issued: Mutex<Vec<Arc<MockLink>>>,
        ops: Mutex<Vec<TransportOp>>,
        next_failure: Mutex<Option<MockFailure>>,
        connect_gate: Mutex<Option<Arc<tokio::sync::Notify>>>,
        peak_open: AtomicUsize,
    }

    impl MockCentral {
        /// Creates a central whose picker always returns `device`.
        pub fn new(device: DeviceHandle) -> Self {
            Self {
                device,
                queued: Mutex::new(VecDeque::new()),
                issued: Mutex::new(Vec::new()),
                ops: Mutex::new(Vec::new()),
                next_failure: Mutex::new(None),
                connect_gate: Mutex::new(None),
                peak_open: AtomicUsize::new(0),
            }
        }

        /// Creates a central whose first connect returns `link`.
        pub fn with_link(device: DeviceHandle, link: Arc<MockLink>) -> Self {
            let central = Self::new(device);
            central.queue_link(link);
            central
        }

        /// Queues a link for a later connect.
        pub fn queue_link(&self, link: Arc<MockLink>) {
            self.queued.lock().unwrap().push_back(link);
        }

        /// Makes the next matching operation fail.
        pub fn fail_next(&self, failure: MockFailure) {
            *self.next_failure.lock().unwrap() = Some(failure);
        }

        /// Holds the next connect until the returned gate is notified.
        pub fn pause_connect(&self) -> Arc<tokio::sync::Notify> {
            let gate = Arc::new(tokio::sync::Notify::new());
            *self.connect_gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        /// Operations recorded so far.
        pub fn ops(&self) -> Vec<TransportOp> {
            self.ops.lock().unwrap().clone()
        }

        /// Links handed out so far.
        pub fn issued_links(&self) -> Vec<Arc<MockLink>> {
            self.issued.lock().unwrap().clone()
        }

        /// Number of handed-out links still up.
        pub fn open_links(&self) -> usize {
            self.issued
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.is_connected())
                .count()
        }

        /// Highest number of simultaneously open links observed.
        pub fn peak_open_links(&self) -> usize {
            self.peak_open.load(Ordering::SeqCst)
        }

        fn take_failure(&self, matches: impl Fn(MockFailure) -> bool) -> Option<MockFailure> {
            let mut slot = self.next_failure.lock().unwrap();
            match *slot {
                Some(f) if matches(f) => slot.take(),
                _ => None,
            }
        }
    }

    #[async_trait]
    impl BleCentral for MockCentral {
        async fn request_device(&self, _filter: &ServiceFilter) -> SyncResult<DeviceHandle> {
            let open_links = self.open_links();
            self.ops
                .lock()
                .unwrap()
                .push(TransportOp::RequestDevice { open_links });
            if self
                .take_failure(|f| f == MockFailure::DiscoveryCancelled)
                .is_some()
            {
                return Err(SyncError::DiscoveryCancelled("picker dismissed".into()));
            }
            Ok(self.device.clone())
        }

        async fn connect(&self, device: &DeviceHandle) -> SyncResult<Arc<dyn GattLink>> {
            self.ops
                .lock()
                .unwrap()
                .push(TransportOp::Connect(device.id.clone()));
            let gate = self.connect_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match self.take_failure(|f| f != MockFailure::DiscoveryCancelled) {
                Some(MockFailure::ConnectRefused) => {
                    return Err(SyncError::ConnectionFailed("peer rejected".into()));
                }
                Some(MockFailure::DropDuringConnect) => return Err(SyncError::Disconnected),
                _ => {}
            }

            let link = self
                .queued
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| MockLink::standalone(device.clone(), MOCK_MAX_WRITE_LEN));
            self.issued.lock().unwrap().push(link.clone());
            self.peak_open.fetch_max(self.open_links(), Ordering::SeqCst);
            Ok(link)
        }
    }

    /// An in-memory GATT link.
    ///
    /// Links created with [`MockLink::pair`] deliver each other's writes and
    /// share one link state, so dropping either end disconnects both.
    pub struct MockLink {
        device: DeviceHandle,
        inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
        inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
        outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
        written: Mutex<Vec<Vec<u8>>>,
        state: Arc<watch::Sender<bool>>,
        max_write_len: usize,
        fail_writes: AtomicBool,
        drop_after_writes: Mutex<Option<usize>>,
    }

    impl std::fmt::Debug for MockLink {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockLink")
                .field("device", &self.device)
                .field("connected", &self.is_connected())
                .field("max_write_len", &self.max_write_len)
                .finish()
        }
    }

    impl MockLink {
        fn build(
            device: DeviceHandle,
            inbound: (mpsc::UnboundedSender<Vec<u8>>, mpsc::UnboundedReceiver<Vec<u8>>),
            outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
            state: Arc<watch::Sender<bool>>,
            max_write_len: usize,
        ) -> Self {
            Self {
                device,
                inbound_tx: inbound.0,
                inbound_rx: tokio::sync::Mutex::new(inbound.1),
                outbound,
                written: Mutex::new(Vec::new()),
                state,
                max_write_len,
                fail_writes: AtomicBool::new(false),
                drop_after_writes: Mutex::new(None),
            }
        }

        /// A link with no peer; writes are recorded, reads wait for
        /// [`MockLink::push_inbound`].
        pub fn standalone(device: DeviceHandle, max_write_len: usize) -> Arc<Self> {
            let (state, _) = watch::channel(false);
            Arc::new(Self::build(
                device,
                mpsc::unbounded_channel(),
                None,
                Arc::new(state),
                max_write_len,
            ))
        }

        /// Two connected ends. `a` sees `b_device` as its peer and vice versa.
        pub fn pair(
            a_device: DeviceHandle,
            b_device: DeviceHandle,
            max_write_len: usize,
        ) -> (Arc<Self>, Arc<Self>) {
            let (state, _) = watch::channel(false);
            let state = Arc::new(state);
            let a_inbound = mpsc::unbounded_channel();
            let b_inbound = mpsc::unbounded_channel();
            let a_to_b = b_inbound.0.clone();
            let b_to_a = a_inbound.0.clone();

            let a = Self::build(b_device, a_inbound, Some(a_to_b), state.clone(), max_write_len);
            let b = Self::build(a_device, b_inbound, Some(b_to_a), state, max_write_len);
            (Arc::new(a), Arc::new(b))
        }

        /// Delivers a chunk as if the peer had notified it.
        pub fn push_inbound(&self, bytes: Vec<u8>) {
            let _ = self.inbound_tx.send(bytes);
        }

        /// Chunks written so far.
        pub fn written(&self) -> Vec<Vec<u8>> {
            self.written.lock().unwrap().clone()
        }

        /// Makes every following write fail.
        pub fn fail_writes(&self) {
            self.fail_writes.store(true, Ordering::SeqCst);
        }

        /// Drops the link after `n` more successful writes.
        pub fn drop_after_writes(&self, n: usize) {
            *self.drop_after_writes.lock().unwrap() = Some(n);
        }

        /// Simulates the peer going out of range.
        pub fn drop_link(&self) {
            self.state.send_replace(true);
        }
    }

    #[async_trait]
    impl GattLink for MockLink {
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
            if !self.is_connected() {
                return Err(SyncError::Disconnected);
            }
            Ok(Channel {
                service,
                characteristic,
            })
        }

        async fn write_value(&self, _channel: &Channel, bytes: &[u8]) -> SyncResult<()> {
            if !self.is_connected() {
                return Err(SyncError::Disconnected);
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(SyncError::Transmission("characteristic write rejected".into()));
            }
            if bytes.len() > self.max_write_len {
                return Err(SyncError::Transmission(format!(
                    "write of {} bytes exceeds limit of {}",
                    bytes.len(),
                    self.max_write_len
                )));
            }

            self.written.lock().unwrap().push(bytes.to_vec());
            if let Some(tx) = &self.outbound {
                tx.send(bytes.to_vec()).map_err(|_| SyncError::Disconnected)?;
            }

            let mut remaining = self.drop_after_writes.lock().unwrap();
            if let Some(n) = remaining.as_mut() {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    *remaining = None;
                    self.drop_link();
                }
            }
            Ok(())
        }

        async fn read_value(&self, _channel: &Channel) -> SyncResult<Vec<u8>> {
            let down = self.disconnected();
            if *down.borrow() {
                return Err(SyncError::Disconnected);
            }
            let mut rx = self.inbound_rx.lock().await;
            tokio::select! {
                chunk = rx.recv() => chunk.ok_or(SyncError::Disconnected),
                _ = wait_for_disconnect(down) => Err(SyncError::Disconnected),
            }
        }

        async fn disconnect(&self) -> SyncResult<()> {
            self.drop_link();
            Ok(())
        }
    }
}
