//! Swipe-card request record (0x02).

use bytes::Bytes;

use super::{opt_u16, opt_u32};
use crate::{CardId, errors::PayloadError};

/// A card swiped at the pile.
///
/// The canonical form opens with the 32-bit card number. Firmware older
/// than the card-reader refresh sends only `{card_type, port}` - too short
/// to carry a card number at all - so 2-5 byte payloads decode with a zero
/// card id and the business layer treats them as anonymous swipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwipeCard {
    /// Card number; zero when the short legacy form omitted it
    pub card_id: CardId,
    /// Card technology/type byte
    pub card_type: u8,
    /// Port the card was swiped at (protocol 0-based)
    pub port: u8,
    /// Remaining balance in 0.01 currency units
    pub balance: Option<u16>,
    /// Swipe timestamp, Unix epoch seconds
    pub timestamp: Option<u32>,
    /// Extended card number, length-prefixed on the wire
    pub ext_card: Option<Bytes>,
}

impl SwipeCard {
    /// Minimum decodable length (the legacy anonymous form).
    pub const MIN_LEN: usize = 2;

    /// Length of the canonical prefix: card id + type + port.
    pub const CANONICAL_LEN: usize = 6;

    pub(crate) fn decode(bytes: &Bytes) -> Result<Self, PayloadError> {
        if bytes.len() < Self::MIN_LEN {
            return Err(PayloadError::TooShort {
                command: 0x02,
                needed: Self::MIN_LEN,
                got: bytes.len(),
            });
        }

        if bytes.len() < Self::CANONICAL_LEN {
            return Ok(Self {
                card_id: CardId::new(0),
                card_type: bytes[0],
                port: bytes[1],
                balance: None,
                timestamp: None,
                ext_card: None,
            });
        }

        let card_id = CardId::new(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
        let ext_card = bytes.get(12).map(|&len| {
            let start = 13;
            let end = (start + usize::from(len)).min(bytes.len());
            bytes.slice(start..end)
        });

        Ok(Self {
            card_id,
            card_type: bytes[4],
            port: bytes[5],
            balance: opt_u16(bytes, 6),
            timestamp: opt_u32(bytes, 8),
            ext_card,
        })
    }
}
