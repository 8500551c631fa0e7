//! Host status records (0x11): the short heartbeat and the fixed 71-byte
//! full identity/status report.

use bytes::Bytes;

use crate::errors::PayloadError;

/// Host status heartbeat, short form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStatus {
    /// Overall device status byte
    pub device_status: u8,
    /// Per-gun status bytes, one per declared gun (may be truncated)
    pub gun_status: Vec<u8>,
    /// Cabinet temperature, signed
    pub temperature: Option<i16>,
    /// Modem signal strength
    pub signal: Option<u8>,
}

impl HostStatus {
    /// Minimum decodable length.
    pub const MIN_LEN: usize = 5;

    pub(crate) fn decode(bytes: &Bytes) -> Result<Self, PayloadError> {
        if bytes.len() < Self::MIN_LEN {
            return Err(PayloadError::TooShort {
                command: 0x11,
                needed: Self::MIN_LEN,
                got: bytes.len(),
            });
        }

        let gun_count = usize::from(bytes[1]);
        let status_end = (2 + gun_count).min(bytes.len());
        let gun_status = bytes[2..status_end].to_vec();

        let (temperature, signal) = if gun_status.len() == gun_count {
            let temperature = bytes
                .get(status_end..status_end + 2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]));
            (temperature, bytes.get(status_end + 2).copied())
        } else {
            (None, None)
        };

        Ok(Self { device_status: bytes[0], gun_status, temperature, signal })
    }
}

/// Full identity/status report: fixed 71-byte layout some hosts emit in
/// place of the short heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullStatus {
    /// Firmware version, raw 16-bit
    pub firmware: u16,
    /// Whether the host carries a battery-backed RTC
    pub has_rtc: bool,
    /// Host clock, Unix epoch seconds
    pub timestamp: u32,
    /// Modem signal strength
    pub signal: u8,
    /// Communication module type
    pub comm_module: u8,
    /// SIM identifier, NUL padding stripped
    pub sim: String,
    /// Host hardware type
    pub host_type: u8,
    /// Mains frequency in 0.1 Hz
    pub frequency: u16,
    /// Modem IMEI, NUL padding stripped
    pub imei: String,
    /// Module firmware version string, NUL padding stripped
    pub module_version: String,
}

impl FullStatus {
    /// The layout is selected by this exact payload length.
    pub const LEN: usize = 71;

    pub(crate) fn decode(bytes: &Bytes) -> Result<Self, PayloadError> {
        if bytes.len() < Self::LEN {
            return Err(PayloadError::TooShort {
                command: 0x11,
                needed: Self::LEN,
                got: bytes.len(),
            });
        }

        Ok(Self {
            firmware: u16::from_le_bytes([bytes[0], bytes[1]]),
            has_rtc: bytes[2] != 0,
            timestamp: u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
            signal: bytes[7],
            comm_module: bytes[8],
            sim: padded_ascii(&bytes[9..29]),
            host_type: bytes[29],
            frequency: u16::from_le_bytes([bytes[30], bytes[31]]),
            imei: padded_ascii(&bytes[32..47]),
            module_version: padded_ascii(&bytes[47..71]),
        })
    }
}

/// Decode a NUL-padded ASCII run, dropping padding and any non-ASCII junk.
fn padded_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .filter(|b| b.is_ascii_graphic())
        .map(|&b| char::from(b))
        .collect()
}
