//! Device registration record (0x20).

use bytes::Bytes;

use super::opt_u16;
use crate::errors::PayloadError;

/// Registration announcement sent after the ICCID prelude.
///
/// The consolidated 6-8-byte layout. A retired firmware line sent a
/// 40-byte registration repeating the ICCID inline; production traffic
/// never carries it any more, so those payloads are refused here and
/// surface as undecoded (the ICCID always comes from the prelude, never
/// from this record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    /// Firmware version, raw 16-bit
    pub firmware: u16,
    /// Number of charge ports on the pile
    pub port_count: u8,
    /// Virtual sub-device id behind a shared modem
    pub virtual_id: u8,
    /// Hardware family
    pub device_type: u8,
    /// Operating mode the pile booted into
    pub work_mode: u8,
    /// Power-board firmware version, newer firmware only
    pub power_board_version: Option<u16>,
}

impl Register {
    /// Minimum decodable length.
    pub const MIN_LEN: usize = 6;

    /// Length of the retired inline-ICCID layout.
    pub const LEGACY_LEN: usize = 40;

    pub(crate) fn decode(bytes: &Bytes) -> Result<Self, PayloadError> {
        if bytes.len() >= Self::LEGACY_LEN {
            return Err(PayloadError::UnsupportedLayout {
                command: 0x20,
                reason: "retired inline-ICCID registration layout",
            });
        }
        if bytes.len() < Self::MIN_LEN {
            return Err(PayloadError::TooShort {
                command: 0x20,
                needed: Self::MIN_LEN,
                got: bytes.len(),
            });
        }

        Ok(Self {
            firmware: u16::from_le_bytes([bytes[0], bytes[1]]),
            port_count: bytes[2],
            virtual_id: bytes[3],
            device_type: bytes[4],
            work_mode: bytes[5],
            power_board_version: opt_u16(bytes, 6),
        })
    }
}
