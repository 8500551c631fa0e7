//! Per-command payload records.
//!
//! Frame payloads are fixed little-endian layouts defined by the device
//! firmware, decoded by hand with [`bytes::Buf`] cursors. Every decoder is
//! length-tolerant: it names a minimum length to attempt parsing, accepts
//! any longer payload, and fills optional trailing fields only when the
//! bytes are present. [`Payload::decode`] is total - a recognized command
//! whose bytes fail the minimum gate still routes, as
//! [`Payload::Undecoded`] with the reason attached, and unrecognized
//! opcodes are carried verbatim as [`Payload::Extended`].

mod control;
mod heartbeat;
mod register;
mod settlement;
mod status;
mod swipe;

use bytes::Bytes;

pub use control::{
    ChargeAction, ChargeControl, ChargeControlAck, Locate, ModifyCharge, ModifyKind, ParamSet,
    TimeResponse,
};
pub use heartbeat::{DeviceHeartbeat, PowerHeartbeat, PowerReading, PowerSummary};
pub use register::Register;
pub use settlement::Settlement;
pub use status::{FullStatus, HostStatus};
pub use swipe::SwipeCard;

use crate::{Command, errors::PayloadError};

/// Decoded payload of an inbound frame.
///
/// One arm per decodable device-to-server command, plus the two catch-all
/// arms that keep routing total: `Extended` for opcodes outside the table
/// and `Undecoded` for recognized opcodes whose bytes did not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// 0x01 / 0x21 - device heartbeat with per-port status
    DeviceHeartbeat(DeviceHeartbeat),
    /// 0x02 - swipe card request
    SwipeCard(SwipeCard),
    /// 0x03 - settlement upload
    Settlement(Settlement),
    /// 0x04 - order confirmation, carried verbatim
    OrderConfirm(Bytes),
    /// 0x06 - per-port power-draw heartbeat
    PowerHeartbeat(PowerHeartbeat),
    /// 0x11 - host status heartbeat (short form)
    HostStatus(HostStatus),
    /// 0x11 with the fixed 71-byte layout - full identity/status report
    FullStatus(FullStatus),
    /// 0x12 / 0x22 - server-time request, empty payload
    TimeRequest,
    /// 0x20 - device registration
    Register(Register),
    /// 0x35 - slave firmware version report, carried verbatim
    SlaveVersion(Bytes),
    /// 0x82 - device acknowledgement of a charge-control command
    ChargeControlAck(ChargeControlAck),
    /// Opcode outside the recognized table; bytes stored verbatim
    Extended(Bytes),
    /// Recognized opcode whose payload failed its record decoder
    Undecoded {
        /// The raw payload bytes, kept for diagnosis
        bytes: Bytes,
        /// Why the record decoder refused them
        reason: PayloadError,
    },
}

impl Payload {
    /// Decode the payload of a frame with the given command opcode.
    ///
    /// Total: never fails, never panics. Commands the server originates
    /// (other than charge control, whose acknowledgement has a known
    /// layout) arrive here only as responses and stay opaque.
    #[must_use]
    pub fn decode(command: u8, bytes: &Bytes) -> Self {
        let result = match Command::from_u8(command) {
            Some(Command::LegacyHeartbeat | Command::Heartbeat) => {
                DeviceHeartbeat::decode(command, bytes).map(Self::DeviceHeartbeat)
            },
            Some(Command::SwipeCard) => SwipeCard::decode(bytes).map(Self::SwipeCard),
            Some(Command::Settlement) => Settlement::decode(bytes).map(Self::Settlement),
            Some(Command::OrderConfirm) => Ok(Self::OrderConfirm(bytes.clone())),
            Some(Command::PowerHeartbeat) => {
                PowerHeartbeat::decode(bytes).map(Self::PowerHeartbeat)
            },
            Some(Command::HostStatus) => {
                if bytes.len() == FullStatus::LEN {
                    FullStatus::decode(bytes).map(Self::FullStatus)
                } else {
                    HostStatus::decode(bytes).map(Self::HostStatus)
                }
            },
            Some(Command::HostTimeRequest | Command::TimeRequest) => Ok(Self::TimeRequest),
            Some(Command::Register) => Register::decode(bytes).map(Self::Register),
            Some(Command::SlaveVersion) => Ok(Self::SlaveVersion(bytes.clone())),
            Some(Command::ChargeControl) => {
                ChargeControlAck::decode(bytes).map(Self::ChargeControlAck)
            },
            Some(_) | None => Ok(Self::Extended(bytes.clone())),
        };

        match result {
            Ok(payload) => payload,
            Err(reason) => Self::Undecoded { bytes: bytes.clone(), reason },
        }
    }

    /// True for the catch-all arms that carry undecoded bytes.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::Extended(_) | Self::Undecoded { .. })
    }
}

/// Read a `u16` LE at `offset` if both bytes are present.
pub(crate) fn opt_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let b = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

/// Read a `u32` LE at `offset` if all four bytes are present.
pub(crate) fn opt_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Read a 16-byte order number at `offset` if fully present.
pub(crate) fn opt_order_no(bytes: &[u8], offset: usize) -> Option<crate::OrderNo> {
    let b = bytes.get(offset..offset + crate::OrderNo::LEN)?;
    let mut arr = [0u8; crate::OrderNo::LEN];
    arr.copy_from_slice(b);
    Some(crate::OrderNo::from_bytes(arr))
}
