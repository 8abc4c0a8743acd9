//! Payload exchange over a connected session.
//!
//! [`PayloadExchange`] is the seam between the negotiation protocol and the
//! transport tier: [`GattExchange`] moves framed messages over a real link,
//! [`SimulatedExchange`] stands in for the peer when no Bluetooth API exists.

use crate::codec::{encode_frames, FrameAssembler};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{ProtocolIds, SyncMessage};
use crate::transport::{Channel, GattLink, TransportKind};
use async_trait::async_trait;
use kramar_types::{SyncPayload, SyncSelection};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, trace};

/// Sends and receives whole protocol messages.
#[async_trait]
pub trait PayloadExchange: Send + Sync {
    /// The tier this exchange runs on.
    fn kind(&self) -> TransportKind;

    /// Sends one message.
    async fn send(&self, message: &SyncMessage) -> SyncResult<()>;

    /// Waits for the next message from the peer.
    async fn recv(&self) -> SyncResult<SyncMessage>;
}

/// Exchange over a GATT link.
pub struct GattExchange {
    link: Arc<dyn GattLink>,
    write: Channel,
    notify: Channel,
    assembler: AsyncMutex<FrameAssembler>,
}

impl GattExchange {
    /// Resolves the sync and notify characteristics on `link`.
    pub async fn open(link: Arc<dyn GattLink>, ids: &ProtocolIds) -> SyncResult<Self> {
        let write = link
            .get_characteristic(ids.service, ids.sync_characteristic)
            .await?;
        let notify = link
            .get_characteristic(ids.service, ids.notify_characteristic)
            .await?;
        Ok(Self {
            link,
            write,
            notify,
            assembler: AsyncMutex::new(FrameAssembler::new()),
        })
    }
}

#[async_trait]
impl PayloadExchange for GattExchange {
    fn kind(&self) -> TransportKind {
        TransportKind::NativeBle
    }

    async fn send(&self, message: &SyncMessage) -> SyncResult<()> {
        let frames = encode_frames(message, self.link.max_write_len())?;
        debug!(kind = message.kind(), chunks = frames.len(), "sending message");
        for chunk in &frames {
            self.link.write_value(&self.write, chunk).await?;
        }
        Ok(())
    }

    async fn recv(&self) -> SyncResult<SyncMessage> {
        let mut assembler = self.assembler.lock().await;
        loop {
            let chunk = self.link.read_value(&self.notify).await?;
            trace!(len = chunk.len(), "received chunk");
            if let Some(message) = assembler.push(&chunk)? {
                debug!(kind = message.kind(), "received message");
                return Ok(message);
            }
        }
    }
}

/// Stand-in exchange for the fallback tier.
///
/// Nothing is transmitted. The scripted partner answers our hello with its
/// own (wanting everything) and then sends its scripted payload, cut down to
/// what we asked for.
pub struct SimulatedExchange {
    partner_name: String,
    partner_payload: SyncPayload,
    wants: Mutex<SyncSelection>,
    sent: Mutex<Vec<SyncMessage>>,
    replies: Mutex<usize>,
}

impl SimulatedExchange {
    /// A partner that offers nothing.
    pub fn new(partner_name: impl Into<String>) -> Self {
        Self {
            partner_name: partner_name.into(),
            partner_payload: SyncPayload::default(),
            wants: Mutex::new(SyncSelection::none()),
            sent: Mutex::new(Vec::new()),
            replies: Mutex::new(0),
        }
    }

    /// Scripts the payload the partner will offer.
    pub fn with_partner_payload(mut self, payload: SyncPayload) -> Self {
        self.partner_payload = payload;
        self
    }

    /// Messages handed to [`PayloadExchange::send`].
    pub fn sent(&self) -> Vec<SyncMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PayloadExchange for SimulatedExchange {
    fn kind(&self) -> TransportKind {
        TransportKind::SimulatedFallback
    }

    async fn send(&self, message: &SyncMessage) -> SyncResult<()> {
        if let SyncMessage::Hello(hello) = message {
            if let Ok(mut wants) = self.wants.lock() {
                *wants = hello.wants.clone();
            }
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        debug!(kind = message.kind(), "simulated send skipped");
        Ok(())
    }

    async fn recv(&self) -> SyncResult<SyncMessage> {
        let step = {
            let mut replies = self
                .replies
                .lock()
                .map_err(|_| SyncError::InvalidState("simulated exchange poisoned".into()))?;
            *replies += 1;
            *replies
        };

        match step {
            1 => Ok(SyncMessage::Hello(crate::protocol::HelloMessage::new(
                self.partner_name.clone(),
                SyncSelection::all(),
                self.partner_payload.categories(),
            ))),
            2 => {
                let wants = self
                    .wants
                    .lock()
                    .map(|w| w.clone())
                    .unwrap_or_default();
                Ok(SyncMessage::Payload(self.partner_payload.filtered(&wants)))
            }
            _ => Err(SyncError::Protocol("simulated partner has nothing more to send".into())),
        }
    }
}
