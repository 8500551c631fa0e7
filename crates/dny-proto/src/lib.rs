//! DNY wire protocol for charging-pile device gateways.
//!
//! Devices speak a compact binary framing over long-lived cleartext TCP
//! connections: a 20-byte ICCID prelude at connect, then a stream of
//! `"DNY"`-tagged frames interleaved with the out-of-band `"link"`
//! keep-alive token. This crate owns everything at the byte level:
//!
//! - [`FrameHeader`] / [`DnyFrame`]: fixed header layout, length
//!   reconciliation and the additive 16-bit checksum
//! - [`Framer`]: incremental splitter turning an append-only byte feed into
//!   [`Unit`]s without ever blocking on malformed input
//! - [`Payload`]: length-tolerant per-command record decoders and the
//!   server-to-device command encoders
//! - identifier formats: [`PhysicalId`], [`CardId`], [`Iccid`], [`OrderNo`]
//!
//! No I/O and no async anywhere in this crate; the gateway core drives it
//! with bytes it read elsewhere.

mod command;
mod errors;
mod frame;
mod framer;
mod header;
mod ids;
pub mod payloads;

pub use command::Command;
pub use errors::{PayloadError, ProtocolError, Result};
pub use frame::{DnyFrame, checksum};
pub use framer::{Framer, Unit};
pub use header::FrameHeader;
pub use ids::{CardId, IdError, Iccid, OrderNo, PhysicalId};
pub use payloads::Payload;

/// Correlation token carried in every frame header.
///
/// Zero is reserved: server-originated commands never allocate it, and the
/// known firmware bug of pinning every command to id 1 is what the
/// correlator's rolling allocation exists to avoid.
pub type MessageId = u16;
