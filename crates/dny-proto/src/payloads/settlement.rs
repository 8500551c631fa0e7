//! Settlement upload record (0x03).

use bytes::Bytes;

use super::{opt_order_no, opt_u16, opt_u32};
use crate::{CardId, OrderNo, errors::PayloadError};

/// End-of-charge settlement uploaded by the device.
///
/// The fixed prefix is 7 bytes; everything after is a greedy optional tail
/// that firmware generations extended one field at a time, so decoding
/// reads in order for as long as bytes remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Charge duration in minutes
    pub charge_minutes: u16,
    /// Peak power during the session, watts
    pub max_power: u16,
    /// Delivered energy in 0.01 kWh
    pub energy: u16,
    /// Port the session ran on (protocol 0-based)
    pub port: u8,
    /// What triggered the settlement
    pub trigger: Option<u8>,
    /// Card that paid for the session
    pub card_id: Option<CardId>,
    /// Why the charge stopped
    pub stop_reason: Option<u8>,
    /// Order number the session was started under
    pub order_no: Option<OrderNo>,
    /// Secondary peak power reading, watts
    pub second_max_power: Option<u16>,
    /// Session end, Unix epoch seconds
    pub end_timestamp: Option<u32>,
    /// Port occupancy beyond charge end, minutes
    pub occupy_minutes: Option<u16>,
}

impl Settlement {
    /// Minimum decodable length: the fixed prefix.
    pub const MIN_LEN: usize = 7;

    pub(crate) fn decode(bytes: &Bytes) -> Result<Self, PayloadError> {
        if bytes.len() < Self::MIN_LEN {
            return Err(PayloadError::TooShort {
                command: 0x03,
                needed: Self::MIN_LEN,
                got: bytes.len(),
            });
        }

        Ok(Self {
            charge_minutes: u16::from_le_bytes([bytes[0], bytes[1]]),
            max_power: u16::from_le_bytes([bytes[2], bytes[3]]),
            energy: u16::from_le_bytes([bytes[4], bytes[5]]),
            port: bytes[6],
            trigger: bytes.get(7).copied(),
            card_id: opt_u32(bytes, 8).map(CardId::new),
            stop_reason: bytes.get(12).copied(),
            order_no: opt_order_no(bytes, 13),
            second_max_power: opt_u16(bytes, 29),
            end_timestamp: opt_u32(bytes, 31),
            occupy_minutes: opt_u16(bytes, 35),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_payload() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&90u16.to_le_bytes()); // charge minutes
        bytes.extend_from_slice(&1450u16.to_le_bytes()); // max power
        bytes.extend_from_slice(&320u16.to_le_bytes()); // energy
        bytes.push(0); // port
        bytes.push(2); // trigger
        bytes.extend_from_slice(&0x0012_34ABu32.to_le_bytes());
        bytes.push(1); // stop reason
        bytes.extend_from_slice(b"ORDER_2025061909");
        bytes.extend_from_slice(&1390u16.to_le_bytes());
        bytes.extend_from_slice(&1_750_003_600u32.to_le_bytes());
        bytes.extend_from_slice(&12u16.to_le_bytes());
        bytes
    }

    #[test]
    fn minimal_prefix_only() {
        let s = Settlement::decode(&Bytes::from(full_payload()[..7].to_vec())).unwrap();
        assert_eq!(s.charge_minutes, 90);
        assert_eq!(s.max_power, 1450);
        assert_eq!(s.energy, 320);
        assert_eq!(s.port, 0);
        assert_eq!(s.trigger, None);
        assert_eq!(s.order_no, None);
        assert_eq!(s.occupy_minutes, None);
    }

    #[test]
    fn full_tail() {
        let s = Settlement::decode(&Bytes::from(full_payload())).unwrap();
        assert_eq!(s.trigger, Some(2));
        assert_eq!(s.card_id, Some(CardId::new(0x0012_34AB)));
        assert_eq!(s.stop_reason, Some(1));
        assert_eq!(s.order_no.unwrap().as_str(), "ORDER_2025061909");
        assert_eq!(s.second_max_power, Some(1390));
        assert_eq!(s.end_timestamp, Some(1_750_003_600));
        assert_eq!(s.occupy_minutes, Some(12));
    }

    #[test]
    fn partial_tail_stops_cleanly() {
        // Cut inside the order number: everything from there on is None.
        let s = Settlement::decode(&Bytes::from(full_payload()[..20].to_vec())).unwrap();
        assert_eq!(s.stop_reason, Some(1));
        assert_eq!(s.order_no, None);
        assert_eq!(s.second_max_power, None);
    }

    #[test]
    fn too_short_is_rejected() {
        assert_eq!(
            Settlement::decode(&Bytes::from_static(&[0, 0, 0])),
            Err(PayloadError::TooShort { command: 0x03, needed: 7, got: 3 })
        );
    }
}
