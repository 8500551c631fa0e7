//! Decoded DNY frame and the wire codec.
//!
//! A frame is the 12-byte header, a command-specific payload and a 2-byte
//! additive checksum. The checksum is computed and reported but never
//! fatal: deployed firmware emits occasional mismatches, so decode
//! surfaces the frame with `checksum_ok = false` and the dispatcher
//! decides (it admits and counts them). Structural problems - wrong magic,
//! impossible length - ARE fatal for the frame and drop it.

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader, PhysicalId,
    errors::{ProtocolError, Result},
};

/// Additive 16-bit checksum over `bytes`, as the device MCUs compute it:
/// plain byte sum, modulo 2^16.
///
/// The covered range for a frame is everything from the first byte of the
/// length field through the last payload byte.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// A decoded DNY frame.
///
/// Holds the payload as raw bytes; per-command record decoding is a
/// separate, length-tolerant step (see [`crate::Payload`]) so that routing
/// and command correlation work even when the payload is unparseable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnyFrame {
    /// Logical device identity (non-zero once registered).
    pub physical_id: PhysicalId,
    /// Correlation token chosen by the frame originator.
    pub message_id: u16,
    /// Raw command opcode.
    pub command: u8,
    /// Command-specific payload, possibly empty.
    pub payload: Bytes,
    /// Whether the trailing checksum matched the received bytes.
    pub checksum_ok: bool,
}

impl DnyFrame {
    /// Build a frame for encoding. `checksum_ok` is trivially true; the
    /// encoder always writes a correct checksum.
    #[must_use]
    pub fn new(physical_id: PhysicalId, message_id: u16, command: u8, payload: Bytes) -> Self {
        Self { physical_id, message_id, command, payload, checksum_ok: true }
    }

    /// Decode one frame from `bytes`.
    ///
    /// `bytes` must hold the complete frame; the framer guarantees this
    /// for units it yields. Trailing bytes beyond the declared length are
    /// ignored. A checksum mismatch still decodes - see the module notes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::TooShort` if fewer than 12 bytes
    /// - `ProtocolError::BadMagic` if the magic is not `DNY`
    /// - `ProtocolError::BadLength` if the declared length is under 9 or
    ///   points past the received bytes - the frame can never complete and
    ///   must be discarded rather than waited for
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let total = header.frame_len();
        if bytes.len() < total {
            return Err(ProtocolError::BadLength {
                declared: header.length(),
                available: bytes.len(),
            });
        }

        let payload_end = total - 2;
        let expected = checksum(&bytes[3..payload_end]);
        let received = u16::from_le_bytes([bytes[payload_end], bytes[payload_end + 1]]);

        Ok(Self {
            physical_id: header.physical_id(),
            message_id: header.message_id(),
            command: header.command(),
            payload: Bytes::copy_from_slice(&bytes[FrameHeader::SIZE..payload_end]),
            checksum_ok: expected == received,
        })
    }

    /// Encode the frame into `dst`, computing length and checksum.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload does not fit the
    ///   16-bit length field
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let header =
            FrameHeader::new(self.physical_id, self.message_id, self.command, self.payload.len())?;
        let header_bytes = header.to_bytes();

        let mut sum = checksum(&header_bytes[3..]);
        sum = sum.wrapping_add(checksum(&self.payload));

        dst.put_slice(&header_bytes);
        dst.put_slice(&self.payload);
        dst.put_u16_le(sum);

        Ok(())
    }

    /// Encode into a freshly allocated buffer.
    ///
    /// # Errors
    ///
    /// Same as [`DnyFrame::encode`].
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Total wire size of the encoded frame.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len() + 2
    }
}
