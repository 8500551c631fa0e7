//! Server-to-device command payloads and their acknowledgements.
//!
//! These records are encoded by the gateway on behalf of business callers
//! and decoded on the device; the decoders here exist for the device
//! acknowledgements and for exercising the encoders in tests.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{OrderNo, errors::PayloadError};

/// Start or stop action inside a charge-control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChargeAction {
    /// Stop the running charge
    Stop = 0x00,
    /// Start a new charge
    Start = 0x01,
}

impl ChargeAction {
    /// Map the wire byte; anything non-zero is a start per firmware.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        if raw == 0 { Self::Stop } else { Self::Start }
    }
}

/// Charge start/stop command (0x82), canonical 37-byte layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeControl {
    /// Billing rate mode
    pub rate_mode: u8,
    /// Account balance in 0.01 currency units
    pub balance: u32,
    /// Target port (protocol 0-based)
    pub port: u8,
    /// Start or stop
    pub action: ChargeAction,
    /// Purchased amount: minutes or 0.01 kWh depending on rate mode
    pub value: u16,
    /// Order number binding the session to the business side
    pub order_no: OrderNo,
    /// Hard ceiling on charge duration, minutes
    pub max_minutes: u16,
    /// Overload power cutoff, watts
    pub over_power: u16,
    /// Whether to light the QR lamp during the session
    pub qr_lamp: u8,
    /// Long-charge mode flag
    pub long_charge: u8,
    /// Extra float-charge time after full, minutes
    pub extra_float_minutes: u16,
    /// Skip the short-circuit pre-check
    pub skip_short_check: u8,
    /// Keep charging through brief unplug glitches
    pub ignore_unplug: u8,
    /// Force a full stop instead of trickle on completion
    pub force_full_stop: u8,
    /// Power threshold regarded as battery-full
    pub full_power: u8,
}

impl ChargeControl {
    /// Canonical wire length.
    pub const LEN: usize = 37;

    /// Encode to the canonical 37-byte payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN);
        buf.put_u8(self.rate_mode);
        buf.put_u32_le(self.balance);
        buf.put_u8(self.port);
        buf.put_u8(self.action as u8);
        buf.put_u16_le(self.value);
        buf.put_slice(self.order_no.as_bytes());
        buf.put_u16_le(self.max_minutes);
        buf.put_u16_le(self.over_power);
        buf.put_u8(self.qr_lamp);
        buf.put_u8(self.long_charge);
        buf.put_u16_le(self.extra_float_minutes);
        buf.put_u8(self.skip_short_check);
        buf.put_u8(self.ignore_unplug);
        buf.put_u8(self.force_full_stop);
        buf.put_u8(self.full_power);
        buf.freeze()
    }

    /// Decode the canonical layout (trailing bytes ignored).
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() < Self::LEN {
            return Err(PayloadError::TooShort {
                command: 0x82,
                needed: Self::LEN,
                got: bytes.len(),
            });
        }
        let mut order = [0u8; OrderNo::LEN];
        order.copy_from_slice(&bytes[9..25]);

        Ok(Self {
            rate_mode: bytes[0],
            balance: u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
            port: bytes[5],
            action: ChargeAction::from_u8(bytes[6]),
            value: u16::from_le_bytes([bytes[7], bytes[8]]),
            order_no: OrderNo::from_bytes(order),
            max_minutes: u16::from_le_bytes([bytes[25], bytes[26]]),
            over_power: u16::from_le_bytes([bytes[27], bytes[28]]),
            qr_lamp: bytes[29],
            long_charge: bytes[30],
            extra_float_minutes: u16::from_le_bytes([bytes[31], bytes[32]]),
            skip_short_check: bytes[33],
            ignore_unplug: bytes[34],
            force_full_stop: bytes[35],
            full_power: bytes[36],
        })
    }
}

/// Device acknowledgement of a charge-control command: `{port, result}`,
/// result zero meaning accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeControlAck {
    /// Port the command addressed (protocol 0-based)
    pub port: u8,
    /// Result code, zero on success
    pub result: u8,
}

impl ChargeControlAck {
    /// Minimum decodable length.
    pub const MIN_LEN: usize = 2;

    /// Whether the device accepted the command.
    #[must_use]
    pub const fn success(self) -> bool {
        self.result == 0
    }

    /// Port as humans number them, 1-based.
    #[must_use]
    pub const fn display_port(self) -> u8 {
        self.port + 1
    }

    /// Decode the acknowledgement payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() < Self::MIN_LEN {
            return Err(PayloadError::TooShort {
                command: 0x82,
                needed: Self::MIN_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self { port: bytes[0], result: bytes[1] })
    }
}

/// What a modify-charge command changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModifyKind {
    /// Extend or shorten the remaining time
    Time = 0x01,
    /// Adjust the purchased energy
    Energy = 0x02,
}

/// Modify a running charge (0x8A), 22-byte layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyCharge {
    /// Target port (protocol 0-based)
    pub port: u8,
    /// Whether time or energy is modified
    pub kind: ModifyKind,
    /// New value: minutes or 0.01 kWh
    pub new_value: u32,
    /// Order number of the running session
    pub order_no: OrderNo,
}

impl ModifyCharge {
    /// Canonical wire length.
    pub const LEN: usize = 22;

    /// Encode to the 22-byte payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN);
        buf.put_u8(self.port);
        buf.put_u8(self.kind as u8);
        buf.put_u32_le(self.new_value);
        buf.put_slice(self.order_no.as_bytes());
        buf.freeze()
    }

    /// Decode the canonical layout (trailing bytes ignored).
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() < Self::LEN {
            return Err(PayloadError::TooShort {
                command: 0x8A,
                needed: Self::LEN,
                got: bytes.len(),
            });
        }
        let kind = match bytes[1] {
            0x01 => ModifyKind::Time,
            0x02 => ModifyKind::Energy,
            _ => {
                return Err(PayloadError::UnsupportedLayout {
                    command: 0x8A,
                    reason: "modify type must be 1 (time) or 2 (energy)",
                });
            },
        };
        let mut order = [0u8; OrderNo::LEN];
        order.copy_from_slice(&bytes[6..22]);

        Ok(Self {
            port: bytes[0],
            kind,
            new_value: u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
            order_no: OrderNo::from_bytes(order),
        })
    }
}

/// Runtime parameter set (0x83 / 0x84): type, id, and a value whose width
/// depends on the parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSet {
    /// Parameter family
    pub param_type: u8,
    /// Parameter identifier within the family
    pub param_id: u16,
    /// Raw value bytes, width defined per parameter
    pub value: Bytes,
}

impl ParamSet {
    /// Minimum decodable length.
    pub const MIN_LEN: usize = 3;

    /// Encode to the wire payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::MIN_LEN + self.value.len());
        buf.put_u8(self.param_type);
        buf.put_u16_le(self.param_id);
        buf.put_slice(&self.value);
        buf.freeze()
    }

    /// Decode type, id and the remaining bytes as the value.
    pub fn decode(command: u8, bytes: &Bytes) -> Result<Self, PayloadError> {
        if bytes.len() < Self::MIN_LEN {
            return Err(PayloadError::TooShort {
                command,
                needed: Self::MIN_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self {
            param_type: bytes[0],
            param_id: u16::from_le_bytes([bytes[1], bytes[2]]),
            value: bytes.slice(3..),
        })
    }
}

/// Audible/visual locate (0x96): beep and blink for the given seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locate {
    /// How long to announce, seconds
    pub seconds: u8,
}

impl Locate {
    /// Encode to the single-byte payload.
    #[must_use]
    pub fn encode(self) -> Bytes {
        Bytes::copy_from_slice(&[self.seconds])
    }
}

/// Server-time response payload: current Unix epoch as u32 LE. Sent with
/// the requesting frame's command and message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeResponse {
    /// Unix epoch seconds
    pub epoch: u32,
}

impl TimeResponse {
    /// Encode to the 4-byte payload.
    #[must_use]
    pub fn encode(self) -> Bytes {
        Bytes::copy_from_slice(&self.epoch.to_le_bytes())
    }
}
