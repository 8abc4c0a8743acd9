//! The sync negotiation between two connected peers.
//!
//! A negotiation moves strictly forward:
//!
//! `Selection → Exchanging → Complete → Confirmed`
//!
//! Selections may only change during `Selection`. Any failure while
//! exchanging drops back to `Selection` with nothing merged; received data
//! reaches storage only through [`SyncNegotiation::confirm`].

use crate::error::{SyncError, SyncResult};
use crate::exchange::PayloadExchange;
use crate::local::LocalData;
use crate::merge::{MergeReport, PartnerMerge};
use crate::protocol::{ErrorMessage, HelloMessage, SyncMessage};
use crate::session::{HuggingSession, SessionState};
use crate::transport::TransportKind;
use kramar_storage::PersistentStore;
use kramar_types::{Category, PartnerIdentity, SyncPayload, SyncSelection, UserId};
use tracing::{debug, info, warn};

/// Where a negotiation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    Selection,
    Exchanging,
    Complete,
    Confirmed,
}

/// What an exchange moved in each direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSummary {
    pub partner: PartnerIdentity,
    pub kind: TransportKind,
    /// Categories actually sent (ours, cut down to what the peer wanted).
    pub sent: SyncSelection,
    /// Categories received and accepted.
    pub received: SyncSelection,
}

/// Result of a confirmed negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub partner: PartnerIdentity,
    pub received: SyncPayload,
    pub report: MergeReport,
}

/// One negotiation within a connected session.
#[derive(Debug)]
pub struct SyncNegotiation {
    user_id: UserId,
    device_name: String,
    local: LocalData,
    outgoing: SyncSelection,
    incoming: SyncSelection,
    step: NegotiationStep,
    summary: Option<ExchangeSummary>,
    received: Option<SyncPayload>,
}

impl SyncNegotiation {
    /// Starts a negotiation over already loaded local data.
    pub fn new(user_id: UserId, device_name: impl Into<String>, local: LocalData) -> Self {
        Self {
            user_id,
            device_name: device_name.into(),
            local,
            outgoing: SyncSelection::none(),
            incoming: SyncSelection::none(),
            step: NegotiationStep::Selection,
            summary: None,
            received: None,
        }
    }

    /// Loads the user's data and starts a negotiation.
    pub async fn prepare(
        store: &dyn PersistentStore,
        user_id: UserId,
        device_name: impl Into<String>,
    ) -> SyncResult<Self> {
        let local = LocalData::load(store, &user_id).await?;
        Ok(Self::new(user_id, device_name, local))
    }

    pub fn step(&self) -> NegotiationStep {
        self.step
    }

    /// Local data and what it can offer.
    pub fn local(&self) -> &LocalData {
        &self.local
    }

    pub fn outgoing(&self) -> &SyncSelection {
        &self.outgoing
    }

    pub fn incoming(&self) -> &SyncSelection {
        &self.incoming
    }

    /// Flips an outgoing category. Returns whether it is now selected.
    ///
    /// A category with no local data cannot be selected.
    pub fn toggle_outgoing(&mut self, category: Category) -> SyncResult<bool> {
        self.ensure_step(NegotiationStep::Selection)?;
        if !self.outgoing.contains(category) && !self.local.has(category) {
            return Err(SyncError::CategoryUnavailable(category));
        }
        Ok(self.outgoing.toggle(category))
    }

    /// Flips an incoming category. Returns whether it is now selected.
    pub fn toggle_incoming(&mut self, category: Category) -> SyncResult<bool> {
        self.ensure_step(NegotiationStep::Selection)?;
        Ok(self.incoming.toggle(category))
    }

    /// Replaces the outgoing selection.
    pub fn select_outgoing(&mut self, selection: SyncSelection) -> SyncResult<()> {
        self.ensure_step(NegotiationStep::Selection)?;
        if let Some(missing) = selection.iter().find(|c| !self.local.has(*c)) {
            return Err(SyncError::CategoryUnavailable(missing));
        }
        self.outgoing = selection;
        Ok(())
    }

    /// Replaces the incoming selection.
    pub fn select_incoming(&mut self, selection: SyncSelection) -> SyncResult<()> {
        self.ensure_step(NegotiationStep::Selection)?;
        self.incoming = selection;
        Ok(())
    }

    /// Whether at least one category is selected in either direction.
    pub fn can_start(&self) -> bool {
        !(self.outgoing.is_empty() && self.incoming.is_empty())
    }

    /// Runs the exchange over a connected session.
    ///
    /// On success the negotiation is `Complete` and the summary is
    /// available. On any failure it returns to `Selection` and nothing
    /// received is kept.
    pub async fn exchange(
        &mut self,
        session: &HuggingSession,
        exchange: &dyn PayloadExchange,
    ) -> SyncResult<&ExchangeSummary> {
        self.ensure_step(NegotiationStep::Selection)?;
        if !self.can_start() {
            return Err(SyncError::EmptySelection);
        }
        if session.state() != SessionState::Connected {
            return Err(SyncError::InvalidState(format!(
                "session must be connected to exchange, state is {}",
                session.state()
            )));
        }

        self.step = NegotiationStep::Exchanging;
        info!(outgoing = %self.outgoing, incoming = %self.incoming, "exchange started");

        let mut peer_informed = false;
        let result = match self.run(exchange, &mut peer_informed).await {
            Ok(_) if session.state() != SessionState::Connected => Err(SyncError::Disconnected),
            other => other,
        };

        match result {
            Ok((summary, received)) => {
                info!(
                    partner = summary.partner.id(),
                    sent = %summary.sent,
                    received = %summary.received,
                    "exchange complete"
                );
                self.received = Some(received);
                self.step = NegotiationStep::Complete;
                Ok(self.summary.insert(summary))
            }
            Err(e) => {
                warn!(error = %e, "exchange aborted");
                if !peer_informed && !e.is_disconnect() {
                    let notice = SyncMessage::Error(ErrorMessage::internal(e.to_string()));
                    if let Err(send_err) = exchange.send(&notice).await {
                        debug!(error = %send_err, "could not tell peer about the abort");
                    }
                }
                self.step = NegotiationStep::Selection;
                Err(e)
            }
        }
    }

    /// Runs the hello and payload round. `peer_informed` is set once the
    /// peer already knows the exchange is off.
    async fn run(
        &self,
        exchange: &dyn PayloadExchange,
        peer_informed: &mut bool,
    ) -> SyncResult<(ExchangeSummary, SyncPayload)> {
        let hello = HelloMessage::new(
            self.device_name.clone(),
            self.incoming.clone(),
            self.outgoing.clone(),
        );
        exchange.send(&SyncMessage::Hello(hello)).await?;

        let peer = match exchange.recv().await? {
            SyncMessage::Hello(peer) if peer.is_compatible() => peer,
            SyncMessage::Hello(peer) => {
                *peer_informed = true;
                let reply = SyncMessage::Error(ErrorMessage::version_mismatch(peer.version));
                let _ = exchange.send(&reply).await;
                return Err(SyncError::Protocol(format!(
                    "peer speaks protocol version {}",
                    peer.version
                )));
            }
            other => return Err(unexpected("hello", other, peer_informed)),
        };
        debug!(peer = %peer.device_name, wants = %peer.wants, offers = %peer.offers, "peer hello");

        let outgoing = self.local.payload_for(&self.outgoing.intersection(&peer.wants));
        exchange.send(&SyncMessage::Payload(outgoing.clone())).await?;

        let received = match exchange.recv().await? {
            SyncMessage::Payload(payload) => payload.filtered(&self.incoming),
            other => return Err(unexpected("payload", other, peer_informed)),
        };

        let summary = ExchangeSummary {
            partner: PartnerIdentity::derive(Some(&peer.device_name), &self.user_id),
            kind: exchange.kind(),
            sent: outgoing.categories(),
            received: received.categories(),
        };
        Ok((summary, received))
    }

    /// What was exchanged. Only present once the exchange completed.
    pub fn summary(&self) -> Option<&ExchangeSummary> {
        self.summary.as_ref()
    }

    /// The accepted payload. Only present once the exchange completed.
    pub fn received(&self) -> Option<&SyncPayload> {
        self.received.as_ref()
    }

    /// Persists the received data under the partner's identity.
    pub async fn confirm(&mut self, merge: &PartnerMerge) -> SyncResult<SyncOutcome> {
        self.ensure_step(NegotiationStep::Complete)?;
        let (Some(summary), Some(received)) = (&self.summary, &self.received) else {
            return Err(SyncError::InvalidState("exchange has no result".into()));
        };

        let report = merge.merge(&summary.partner, received).await?;
        self.step = NegotiationStep::Confirmed;
        Ok(SyncOutcome {
            partner: summary.partner.clone(),
            received: received.clone(),
            report,
        })
    }

    /// Returns to `Selection`, keeping the current selections.
    pub fn reset(&mut self) {
        self.step = NegotiationStep::Selection;
        self.summary = None;
        self.received = None;
    }

    fn ensure_step(&self, expected: NegotiationStep) -> SyncResult<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(SyncError::InvalidState(format!(
                "negotiation is at {:?}, expected {:?}",
                self.step, expected
            )))
        }
    }
}

fn unexpected(expected: &str, got: SyncMessage, peer_informed: &mut bool) -> SyncError {
    match got {
        SyncMessage::Error(e) => {
            *peer_informed = true;
            SyncError::Protocol(format!("peer aborted ({}): {}", e.code, e.message))
        }
        other => SyncError::Protocol(format!("expected {expected}, got {}", other.kind())),
    }
}
