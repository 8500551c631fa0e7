//! Heartbeat records: device heartbeats (0x01, 0x21) and the per-port
//! power-draw heartbeat (0x06).

use bytes::Bytes;

use super::opt_u16;
use crate::errors::PayloadError;

/// Device heartbeat (opcodes 0x01 and 0x21 share the layout).
///
/// Minimum 3 bytes: supply voltage and the port count. Per-port statuses,
/// signal strength and board temperature follow when the firmware sends
/// them; older builds truncate anywhere after the port count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHeartbeat {
    /// Supply voltage in 0.1 V
    pub voltage: u16,
    /// Per-port status bytes, one per declared port (may be truncated)
    pub port_status: Vec<u8>,
    /// Modem signal strength
    pub signal: Option<u8>,
    /// Board temperature
    pub temperature: Option<u8>,
}

impl DeviceHeartbeat {
    /// Minimum decodable length.
    pub const MIN_LEN: usize = 3;

    /// Decode a heartbeat payload; `command` only labels the error.
    pub(crate) fn decode(command: u8, bytes: &Bytes) -> Result<Self, PayloadError> {
        if bytes.len() < Self::MIN_LEN {
            return Err(PayloadError::TooShort {
                command,
                needed: Self::MIN_LEN,
                got: bytes.len(),
            });
        }

        let voltage = u16::from_le_bytes([bytes[0], bytes[1]]);
        let port_count = usize::from(bytes[2]);

        let status_end = (3 + port_count).min(bytes.len());
        let port_status = bytes[3..status_end].to_vec();

        // Signal and temperature only exist after a full status run.
        let (signal, temperature) = if port_status.len() == port_count {
            (bytes.get(status_end).copied(), bytes.get(status_end + 1).copied())
        } else {
            (None, None)
        };

        Ok(Self { voltage, port_status, signal, temperature })
    }
}

/// Per-port power-draw heartbeat (opcode 0x06).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerHeartbeat {
    /// Short form: charging summary for one port
    Summary(PowerSummary),
    /// Full form (16 bytes and up): instantaneous electrical readings
    Electrical(PowerReading),
}

impl PowerHeartbeat {
    /// Minimum decodable length of the short form.
    pub const MIN_LEN: usize = 3;

    /// Length at which the electrical layout takes over.
    pub const ELECTRICAL_LEN: usize = 16;

    pub(crate) fn decode(bytes: &Bytes) -> Result<Self, PayloadError> {
        if bytes.len() >= Self::ELECTRICAL_LEN {
            return Ok(Self::Electrical(PowerReading::decode(bytes)));
        }
        if bytes.len() < Self::MIN_LEN {
            return Err(PayloadError::TooShort {
                command: 0x06,
                needed: Self::MIN_LEN,
                got: bytes.len(),
            });
        }

        Ok(Self::Summary(PowerSummary {
            port: bytes[0],
            status: bytes[1],
            charge_minutes: opt_u16(bytes, 2),
            energy: opt_u16(bytes, 4),
            start_mode: bytes.get(6).copied(),
            real_power: opt_u16(bytes, 7),
        }))
    }
}

/// Short-form charging summary for one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerSummary {
    /// Port index (protocol 0-based)
    pub port: u8,
    /// Charging status byte
    pub status: u8,
    /// Elapsed charge time in minutes
    pub charge_minutes: Option<u16>,
    /// Delivered energy in 0.01 kWh
    pub energy: Option<u16>,
    /// How the charge was started (card, remote, free)
    pub start_mode: Option<u8>,
    /// Instantaneous power draw in watts
    pub real_power: Option<u16>,
}

/// Full electrical reading, fixed 16-byte layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerReading {
    /// Port index (protocol 0-based)
    pub port: u8,
    /// Supply voltage in 0.1 V
    pub voltage: u16,
    /// Current draw in 0.01 A
    pub current: u16,
    /// Instantaneous power in watts
    pub power: u16,
    /// Accumulated energy in 0.01 kWh
    pub energy: u32,
    /// Board temperature
    pub temperature: u8,
    /// Charging status byte
    pub status: u8,
    /// Elapsed charge time in minutes
    pub charge_minutes: u16,
    /// How the charge was started
    pub start_mode: u8,
}

impl PowerReading {
    /// Caller guarantees at least [`PowerHeartbeat::ELECTRICAL_LEN`] bytes;
    /// anything past the fixed layout is ignored.
    fn decode(bytes: &[u8]) -> Self {
        Self {
            port: bytes[0],
            voltage: u16::from_le_bytes([bytes[1], bytes[2]]),
            current: u16::from_le_bytes([bytes[3], bytes[4]]),
            power: u16::from_le_bytes([bytes[5], bytes[6]]),
            energy: u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]),
            temperature: bytes[11],
            status: bytes[12],
            charge_minutes: u16::from_le_bytes([bytes[13], bytes[14]]),
            start_mode: bytes[15],
        }
    }
}
