//! Hugging mode: proximity sync between two partners' devices.
//!
//! Two nearby devices pair over Bluetooth Low Energy, agree on which data
//! categories to send and receive, exchange them, and store what arrived
//! under partner-namespaced keys.
//!
//! # Architecture
//!
//! - **Transport**: [`BleCentral`] and [`GattLink`] abstract the platform's
//!   central role. [`ble`] wraps btleplug (feature `native-ble`),
//!   [`transport::mock`] backs tests.
//! - **Session**: [`HuggingSession`] owns the connection lifecycle, one link
//!   at a time, with a simulated fallback for touch devices without
//!   Bluetooth.
//! - **Negotiation**: [`SyncNegotiation`] collects selections, runs the
//!   exchange over a [`PayloadExchange`] and holds the result until the
//!   user confirms.
//! - **Merge**: [`PartnerMerge`] writes received records into partner
//!   collections only.
//!
//! ## Sync process
//!
//! 1. **Enter**: tear down any previous session, pick the transport tier
//! 2. **Discover/connect**: pick a peer advertising the service, open GATT
//! 3. **Select**: choose outgoing and incoming categories
//! 4. **Exchange**: hello, then payload, in both directions
//! 5. **Confirm**: merge the accepted payload under the partner's identity
//!
//! # Example
//!
//! ```
//! use kramar_sync::{HuggingConfig, HuggingSession, PlatformCapabilities};
//!
//! let config = HuggingConfig {
//!     device_name: "Anna".to_string(),
//!     ..Default::default()
//! };
//! let caps = PlatformCapabilities { native_bluetooth: false, touch_input: true };
//! let session = HuggingSession::new(caps, None, config);
//! assert_eq!(session.state(), kramar_sync::SessionState::Idle);
//! ```

#[cfg(feature = "native-ble")]
pub mod ble;
pub mod codec;
mod error;
pub mod exchange;
mod local;
pub mod merge;
mod negotiation;
pub mod protocol;
mod session;
pub mod transport;

pub use codec::{encode_frames, FrameAssembler, MAX_MESSAGE_SIZE};
pub use error::{SyncError, SyncResult};
pub use exchange::{GattExchange, PayloadExchange, SimulatedExchange};
pub use local::LocalData;
pub use merge::{MergeReport, PartnerCollection, PartnerMerge};
pub use negotiation::{ExchangeSummary, NegotiationStep, SyncNegotiation, SyncOutcome};
pub use protocol::{
    ErrorMessage, HelloMessage, ProtocolIds, SyncMessage, ERR_INTERNAL, ERR_VERSION_MISMATCH,
    PROTOCOL_VERSION,
};
pub use session::{
    HuggingConfig, HuggingSession, SessionSnapshot, SessionState, FALLBACK_CONNECT_DELAY,
};
pub use transport::{
    BleCentral, Channel, DeviceHandle, GattLink, PlatformCapabilities, ServiceFilter,
    TransportKind,
};
