//! Hugging protocol messages and identifiers.
//!
//! Once linked, each peer:
//! 1. Sends a `Hello` naming its device, the categories it wants and the
//!    categories it can offer
//! 2. Sends a `Payload` holding its outgoing categories that the peer wants
//! 3. Reads the peer's `Payload` and keeps only its own incoming categories
//!
//! Both sides write before reading, so the exchange is symmetric and
//! either side may start it.

use crate::transport::ServiceFilter;
use kramar_types::{SyncPayload, SyncSelection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u32 = 1;

/// Error code sent when the peer speaks another protocol version.
pub const ERR_VERSION_MISMATCH: u32 = 1;

/// Error code for failures on the sending side.
pub const ERR_INTERNAL: u32 = 2;

/// Service and characteristic identifiers shared by both peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolIds {
    /// Advertised service used for discovery.
    pub service: Uuid,
    /// Characteristic written with outgoing frames.
    pub sync_characteristic: Uuid,
    /// Characteristic notifying inbound frames.
    pub notify_characteristic: Uuid,
}

impl ProtocolIds {
    pub const DEFAULT: ProtocolIds = ProtocolIds {
        service: Uuid::from_u128(0x12345678_1234_5678_9abc_def123456789),
        sync_characteristic: Uuid::from_u128(0x87654321_4321_8765_cba9_fed987654321),
        notify_characteristic: Uuid::from_u128(0x87654321_4321_8765_cba9_fed987654322),
    };

    /// Discovery filter matching this service.
    pub fn service_filter(&self) -> ServiceFilter {
        ServiceFilter {
            services: vec![self.service],
        }
    }
}

impl Default for ProtocolIds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A hugging protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum SyncMessage {
    /// Handshake, sent first by both sides.
    Hello(HelloMessage),
    /// The sender's data, already cut down to what the receiver wants.
    Payload(SyncPayload),
    /// The sender gave up on the exchange.
    Error(ErrorMessage),
}

impl SyncMessage {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Hello(_) => "hello",
            SyncMessage::Payload(_) => "payload",
            SyncMessage::Error(_) => "error",
        }
    }
}

/// Initial handshake message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloMessage {
    /// Protocol version.
    pub version: u32,
    /// Human-readable device name.
    pub device_name: String,
    /// Categories the sender will accept.
    pub wants: SyncSelection,
    /// Categories the sender will send.
    pub offers: SyncSelection,
}

impl HelloMessage {
    /// Creates a Hello for the current protocol version.
    pub fn new(device_name: impl Into<String>, wants: SyncSelection, offers: SyncSelection) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            device_name: device_name.into(),
            wants,
            offers,
        }
    }

    /// Whether the peer speaks our version.
    pub fn is_compatible(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: u32,
    pub message: String,
}

impl ErrorMessage {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn version_mismatch(theirs: u32) -> Self {
        Self::new(
            ERR_VERSION_MISMATCH,
            format!("protocol version {theirs} is not supported (expected {PROTOCOL_VERSION})"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ERR_INTERNAL, message)
    }
}
