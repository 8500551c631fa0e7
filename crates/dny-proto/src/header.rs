//! Frame header with zero-copy parsing.
//!
//! The `FrameHeader` is the fixed 12-byte prefix of every DNY frame,
//! parsed in place from the receive buffer (Little Endian, matching the
//! device MCU byte order). Fields are raw byte arrays to avoid alignment
//! issues with the packed layout.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    PhysicalId,
    errors::{ProtocolError, Result},
};

/// Fixed 12-byte frame header (Little Endian).
///
/// Wire layout:
///
/// ```text
/// magic "DNY" | length u16 | physical id u32 | message id u16 | command u8
///    3 bytes  |  2 bytes   |     4 bytes     |    2 bytes     |  1 byte
/// ```
///
/// The length field counts every byte AFTER itself, including the 2-byte
/// trailing checksum, so a frame occupies `length + 5` bytes on the wire
/// and the minimum legal length is 9 (id + message id + command + checksum).
///
/// All 12-byte patterns are valid bit patterns, so casting untrusted
/// network bytes cannot cause undefined behavior; semantic validation
/// (magic, length bounds) happens in [`FrameHeader::from_bytes`].
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 3],
    length: [u8; 2],
    physical_id: [u8; 4],
    message_id: [u8; 2],
    command: u8,
}

impl FrameHeader {
    /// Size of the serialized header (12 bytes).
    pub const SIZE: usize = 12;

    /// Magic bytes identifying the framing.
    pub const MAGIC: [u8; 3] = *b"DNY";

    /// Bytes the length field always covers besides the payload:
    /// physical id (4) + message id (2) + command (1) + checksum (2).
    pub const LEN_OVERHEAD: u16 = 9;

    /// Default cap on payload size; frames claiming more are malformed.
    pub const DEFAULT_MAX_PAYLOAD: usize = 2048;

    /// Build a header for a frame with `payload_len` payload bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload cannot be
    ///   expressed by the 16-bit length field
    pub fn new(
        physical_id: PhysicalId,
        message_id: u16,
        command: u8,
        payload_len: usize,
    ) -> Result<Self> {
        let max = usize::from(u16::MAX - Self::LEN_OVERHEAD);
        if payload_len > max {
            return Err(ProtocolError::PayloadTooLarge { size: payload_len, max });
        }
        let length = Self::LEN_OVERHEAD + payload_len as u16;

        Ok(Self {
            magic: Self::MAGIC,
            length: length.to_le_bytes(),
            physical_id: physical_id.raw().to_le_bytes(),
            message_id: message_id.to_le_bytes(),
            command,
        })
    }

    /// Parse a header from network bytes (zero-copy, by reference).
    ///
    /// Validation order: size, magic, length lower bound. Whether the
    /// declared length fits the received buffer is the frame decoder's
    /// concern, not the header's.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::TooShort` if fewer than 12 bytes are available
    /// - `ProtocolError::BadMagic` if the frame does not start with `DNY`
    /// - `ProtocolError::BadLength` if the length field is under 9
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::TooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if header.magic != Self::MAGIC {
            return Err(ProtocolError::BadMagic);
        }

        let length = u16::from_le_bytes(header.length);
        if length < Self::LEN_OVERHEAD {
            return Err(ProtocolError::BadLength { declared: length, available: bytes.len() });
        }

        Ok(header)
    }

    /// Serialize the header to its 12 wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Declared length: bytes after the length field, checksum included.
    #[must_use]
    pub fn length(&self) -> u16 {
        u16::from_le_bytes(self.length)
    }

    /// Total frame size on the wire: magic + length field + declared bytes.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        usize::from(self.length()) + 5
    }

    /// Payload byte count declared by the header.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        usize::from(self.length() - Self::LEN_OVERHEAD)
    }

    /// Logical device identity.
    #[must_use]
    pub fn physical_id(&self) -> PhysicalId {
        PhysicalId::new(u32::from_le_bytes(self.physical_id))
    }

    /// Correlation token chosen by the frame originator.
    #[must_use]
    pub fn message_id(&self) -> u16 {
        u16::from_le_bytes(self.message_id)
    }

    /// Raw command opcode.
    #[must_use]
    pub fn command(&self) -> u8 {
        self.command
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("length", &self.length())
            .field("physical_id", &self.physical_id())
            .field("message_id", &self.message_id())
            .field("command", &format!("{:#04x}", self.command))
            .finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for FrameHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FrameHeader {}
