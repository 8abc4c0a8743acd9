//! The hugging-mode connection lifecycle.
//!
//! A [`HuggingSession`] owns at most one transport link at a time. Entering
//! hugging mode always tears down whatever the previous attempt left open
//! before discovery starts again, and a disconnect reported by the link
//! forces `Disconnected` from any live state.

use crate::error::{SyncError, SyncResult};
use crate::exchange::GattExchange;
use crate::protocol::ProtocolIds;
use crate::transport::{
    wait_for_disconnect, BleCentral, DeviceHandle, GattLink, PlatformCapabilities, TransportKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delay before the fallback tier reports a simulated connection.
pub const FALLBACK_CONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Configuration for hugging sessions.
#[derive(Debug, Clone)]
pub struct HuggingConfig {
    /// Name advertised to the peer in the handshake.
    pub device_name: String,
    /// Service and characteristic identifiers.
    pub protocol: ProtocolIds,
    /// How long the fallback tier takes to "connect".
    pub fallback_delay: Duration,
    /// Upper bound on GATT connect. `None` leaves it to the platform.
    pub connect_timeout: Option<Duration>,
}

impl Default for HuggingConfig {
    fn default() -> Self {
        Self {
            device_name: "Kramar".to_string(),
            protocol: ProtocolIds::DEFAULT,
            fallback_delay: FALLBACK_CONNECT_DELAY,
            connect_timeout: None,
        }
    }
}

/// Lifecycle state of a hugging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Discovering,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl SessionState {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Discovering)
                | (Discovering, Connecting)
                | (Discovering, Connected)
                | (Discovering, Idle)
                | (Discovering, Failed)
                | (Discovering, Disconnected)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Disconnected, Idle)
                | (Disconnected, Discovering)
                | (Failed, Idle)
                | (Failed, Discovering)
        )
    }

    /// Whether a peer handle belongs to this state.
    pub fn holds_peer(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Connected)
    }

    /// States a link-level disconnect applies to.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Discovering | SessionState::Connecting | SessionState::Connected
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Observable view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub kind: Option<TransportKind>,
    pub peer: Option<DeviceHandle>,
    /// Bumped every time an attempt is torn down.
    pub generation: u64,
}

struct Inner {
    state: SessionState,
    kind: Option<TransportKind>,
    peer: Option<DeviceHandle>,
    link: Option<Arc<dyn GattLink>>,
    generation: u64,
    listener: Option<JoinHandle<()>>,
    history: Vec<SessionState>,
}

impl Inner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            kind: self.kind,
            peer: self.peer.clone(),
            generation: self.generation,
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    tx: watch::Sender<SessionSnapshot>,
    /// The live generation; pending work of older attempts watches it.
    live: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> SyncResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| SyncError::InvalidState("session lock poisoned".into()))
    }

    /// Moves to `next`, keeping the peer handle consistent with the state.
    fn transition(&self, inner: &mut Inner, next: SessionState) -> SyncResult<()> {
        if inner.state == next {
            return Ok(());
        }
        if !inner.state.can_transition_to(next) {
            warn!(from = %inner.state, to = %next, "rejected session transition");
            return Err(SyncError::InvalidState(format!(
                "cannot move from {} to {}",
                inner.state, next
            )));
        }
        debug!(from = %inner.state, to = %next, generation = inner.generation, "session transition");
        inner.state = next;
        if !next.holds_peer() {
            inner.peer = None;
            inner.link = None;
        }
        inner.history.push(next);
        self.tx.send_replace(inner.snapshot());
        Ok(())
    }

    /// Invalidates the current attempt and wakes anything it is waiting on.
    fn bump(&self, inner: &mut Inner) {
        inner.generation += 1;
        self.live.send_replace(inner.generation);
    }

    /// Forces `Disconnected` if `generation` is still the live attempt.
    fn link_down(&self, generation: u64) {
        let Ok(mut inner) = self.lock() else {
            return;
        };
        if inner.generation != generation || !inner.state.is_live() {
            debug!(generation, "ignoring stale disconnect");
            return;
        }
        info!(generation, "peer disconnected");
        inner.listener = None;
        let _ = self.transition(&mut inner, SessionState::Disconnected);
    }
}

/// One hugging-mode attempt at a time, with explicit teardown.
pub struct HuggingSession {
    capabilities: PlatformCapabilities,
    central: Option<Arc<dyn BleCentral>>,
    config: HuggingConfig,
    shared: Arc<Shared>,
    /// Held by `enter` and `exit` for as long as they run.
    attempt: AsyncMutex<()>,
}

impl HuggingSession {
    /// Creates an idle session.
    ///
    /// `central` is only consulted when `capabilities` report native
    /// Bluetooth.
    pub fn new(
        capabilities: PlatformCapabilities,
        central: Option<Arc<dyn BleCentral>>,
        config: HuggingConfig,
    ) -> Self {
        let inner = Inner {
            state: SessionState::Idle,
            kind: None,
            peer: None,
            link: None,
            generation: 0,
            listener: None,
            history: vec![SessionState::Idle],
        };
        let (tx, _) = watch::channel(inner.snapshot());
        let (live, _) = watch::channel(inner.generation);
        Self {
            capabilities,
            central,
            config,
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                tx,
                live,
            }),
            attempt: AsyncMutex::new(()),
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &HuggingConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.snapshot().state
    }

    /// Current state, tier and peer.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.tx.borrow().clone()
    }

    /// Receives every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.tx.subscribe()
    }

    /// The connected peer, if any.
    pub fn peer(&self) -> Option<DeviceHandle> {
        self.snapshot().peer
    }

    /// The open link, present only while connected natively.
    pub fn link(&self) -> Option<Arc<dyn GattLink>> {
        self.shared.lock().ok().and_then(|inner| inner.link.clone())
    }

    /// Every state entered since creation, in order.
    pub fn history(&self) -> Vec<SessionState> {
        self.shared
            .lock()
            .map(|inner| inner.history.clone())
            .unwrap_or_default()
    }

    /// Enters hugging mode.
    ///
    /// Any previous attempt is torn down first: a discovery or connect still
    /// pending is abandoned, and an open link is closed, before discovery
    /// starts again. Resolves with the tier once the session is `Connected`.
    pub async fn enter(&self) -> SyncResult<TransportKind> {
        let _attempt = self.supersede().await?;
        self.teardown().await?;

        let Some(tier) = self.capabilities.tier() else {
            warn!("no bluetooth and no touch fallback");
            return Err(SyncError::Unsupported(
                "no bluetooth central and no touch input".into(),
            ));
        };

        match tier {
            TransportKind::SimulatedFallback => self.enter_fallback().await,
            TransportKind::NativeBle => self.enter_native().await,
        }
    }

    async fn enter_fallback(&self) -> SyncResult<TransportKind> {
        let generation = self.begin(TransportKind::SimulatedFallback)?;
        info!(delay_ms = self.config.fallback_delay.as_millis() as u64, "simulating pairing");
        self.unless_superseded(generation, async {
            tokio::time::sleep(self.config.fallback_delay).await;
            Ok(())
        })
        .await?;

        let mut inner = self.current(generation, SessionState::Discovering)?;
        self.shared.transition(&mut inner, SessionState::Connected)?;
        Ok(TransportKind::SimulatedFallback)
    }

    async fn enter_native(&self) -> SyncResult<TransportKind> {
        let Some(central) = self.central.clone() else {
            return Err(SyncError::Unsupported("no bluetooth backend available".into()));
        };
        let generation = self.begin(TransportKind::NativeBle)?;

        let filter = self.config.protocol.service_filter();
        let device = match self
            .unless_superseded(generation, central.request_device(&filter))
            .await
        {
            Ok(device) => device,
            Err(e) => {
                warn!(error = %e, "device discovery failed");
                if let Ok(mut inner) = self.current(generation, SessionState::Discovering) {
                    self.shared.transition(&mut inner, SessionState::Idle)?;
                }
                return Err(e);
            }
        };

        {
            let mut inner = self.current(generation, SessionState::Discovering)?;
            inner.peer = Some(device.clone());
            self.shared.transition(&mut inner, SessionState::Connecting)?;
        }
        info!(device = %device.id, name = ?device.name, "connecting");

        let connect = async {
            match self.config.connect_timeout {
                Some(limit) => tokio::time::timeout(limit, central.connect(&device))
                    .await
                    .unwrap_or(Err(SyncError::Timeout)),
                None => central.connect(&device).await,
            }
        };
        let connected = self.unless_superseded(generation, connect).await;

        let link = match connected {
            Ok(link) => link,
            Err(e) => {
                warn!(error = %e, "connect failed");
                if let Ok(mut inner) = self.current(generation, SessionState::Connecting) {
                    let next = if e.is_disconnect() {
                        SessionState::Disconnected
                    } else {
                        SessionState::Failed
                    };
                    self.shared.transition(&mut inner, next)?;
                }
                return Err(match e {
                    SyncError::Disconnected | SyncError::Timeout | SyncError::Cancelled => e,
                    SyncError::ConnectionFailed(_) => e,
                    other => SyncError::ConnectionFailed(other.to_string()),
                });
            }
        };

        if let Err(e) = self.attach(generation, &link) {
            // Superseded or dropped while connecting; the link is ours to close.
            let _ = link.disconnect().await;
            return Err(e);
        }
        info!(device = %device.id, "connected");
        Ok(TransportKind::NativeBle)
    }

    /// Reports a transport-level disconnect.
    ///
    /// Forces `Disconnected` from any live state and releases the peer.
    /// Ignored in `Idle`, `Failed` and `Disconnected`.
    pub async fn notify_disconnected(&self) -> SyncResult<()> {
        let (link, listener) = {
            let mut inner = self.shared.lock()?;
            if !inner.state.is_live() {
                return Ok(());
            }
            let link = inner.link.take();
            let listener = inner.listener.take();
            self.shared.transition(&mut inner, SessionState::Disconnected)?;
            (link, listener)
        };
        if let Some(listener) = listener {
            listener.abort();
        }
        if let Some(link) = link {
            let _ = link.disconnect().await;
        }
        Ok(())
    }

    /// Leaves hugging mode: closes any open link, then returns to `Idle`.
    pub async fn exit(&self) -> SyncResult<()> {
        let _attempt = self.supersede().await?;
        self.teardown().await
    }

    /// Opens a payload exchange over the connected native link.
    pub async fn gatt_exchange(&self) -> SyncResult<GattExchange> {
        let snapshot = self.snapshot();
        if snapshot.state != SessionState::Connected {
            return Err(SyncError::InvalidState(format!(
                "exchange needs a connected session, state is {}",
                snapshot.state
            )));
        }
        let link = self
            .link()
            .ok_or_else(|| SyncError::InvalidState("session has no native link".into()))?;
        GattExchange::open(link, &self.config.protocol).await
    }

    /// Invalidates the running attempt and waits for it to unwind.
    async fn supersede(&self) -> SyncResult<AsyncMutexGuard<'_, ()>> {
        {
            let mut inner = self.shared.lock()?;
            self.shared.bump(&mut inner);
        }
        Ok(self.attempt.lock().await)
    }

    /// Runs `work` unless attempt `generation` is superseded first.
    ///
    /// Dropping `work` abandons it, so a connect that would have completed
    /// after a newer attempt started never hands out its link.
    async fn unless_superseded<T>(
        &self,
        generation: u64,
        work: impl Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        let mut live = self.shared.live.subscribe();
        tokio::select! {
            result = work => result,
            _ = live.wait_for(|current| *current != generation) => {
                debug!(generation, "attempt superseded");
                Err(SyncError::Cancelled)
            }
        }
    }

    /// Moves to `Discovering` under a fresh tier.
    fn begin(&self, kind: TransportKind) -> SyncResult<u64> {
        let mut inner = self.shared.lock()?;
        inner.kind = Some(kind);
        self.shared.transition(&mut inner, SessionState::Discovering)?;
        Ok(inner.generation)
    }

    /// Registers the disconnect listener, then moves to `Connected`.
    ///
    /// Both happen under the session lock so a disconnect firing right away
    /// is applied after the transition, never before it.
    fn attach(&self, generation: u64, link: &Arc<dyn GattLink>) -> SyncResult<()> {
        let mut inner = self.current(generation, SessionState::Connecting)?;
        let shared = self.shared.clone();
        let down = link.disconnected();
        inner.listener = Some(tokio::spawn(async move {
            wait_for_disconnect(down).await;
            shared.link_down(generation);
        }));
        inner.link = Some(link.clone());
        self.shared.transition(&mut inner, SessionState::Connected)
    }

    /// Locks the session if `generation` is still live and in `expected`.
    fn current(
        &self,
        generation: u64,
        expected: SessionState,
    ) -> SyncResult<MutexGuard<'_, Inner>> {
        let inner = self.shared.lock()?;
        if inner.generation != generation {
            return Err(SyncError::Cancelled);
        }
        if inner.state != expected {
            return Err(if inner.state == SessionState::Disconnected {
                SyncError::Disconnected
            } else {
                SyncError::InvalidState(format!("expected {expected}, state is {}", inner.state))
            });
        }
        Ok(inner)
    }

    /// Closes the link, invalidates pending work and returns to `Idle`.
    async fn teardown(&self) -> SyncResult<()> {
        let (link, listener, was) = {
            let mut inner = self.shared.lock()?;
            self.shared.bump(&mut inner);
            (inner.link.take(), inner.listener.take(), inner.state)
        };
        if let Some(listener) = listener {
            listener.abort();
        }
        if let Some(link) = link {
            debug!(device = %link.device().id, "closing previous link");
            if let Err(e) = link.disconnect().await {
                warn!(error = %e, "closing link failed");
            }
        }

        let mut inner = self.shared.lock()?;
        if was.holds_peer() && inner.state.holds_peer() {
            self.shared.transition(&mut inner, SessionState::Disconnected)?;
        }
        if inner.state != SessionState::Idle {
            self.shared.transition(&mut inner, SessionState::Idle)?;
        }
        inner.kind = None;
        self.shared.tx.send_replace(inner.snapshot());
        Ok(())
    }
}

impl Drop for HuggingSession {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.shared.inner.lock() {
            if let Some(listener) = inner.listener.take() {
                listener.abort();
            }
        }
    }
}
