//! Error types for the DNY wire layer.
//!
//! Framing errors are per-frame and non-fatal to the connection: the framer
//! skips bytes and the dispatcher counts the reject. A checksum mismatch is
//! deliberately NOT an error - frames surface with `checksum_ok = false`
//! because the deployed firmware emits occasional mismatches and dropping
//! those frames loses real settlements.

use thiserror::Error;

/// Result alias for wire-layer operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from frame decoding and encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than the fixed header.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum byte count required
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// First three bytes are not `"DNY"`.
    #[error("bad magic: frame does not start with DNY")]
    BadMagic,

    /// Declared length is impossible: under the 9-byte fixed tail or
    /// pointing past the bytes that were received.
    #[error("bad length: declared {declared}, {available} bytes available")]
    BadLength {
        /// Length field value from the header
        declared: u16,
        /// Bytes actually available in the buffer
        available: usize,
    },

    /// Payload exceeds what the length field can express.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Attempted payload size
        size: usize,
        /// Maximum encodable size
        max: usize,
    },
}

/// Errors from per-command payload record decoding.
///
/// These never abort routing: a frame whose payload fails its record
/// decoder is still dispatched with an `Undecoded` payload carrying the
/// reason, so handlers and the correlator see the frame metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload shorter than the command's minimum decodable length.
    #[error("payload too short for command {command:#04x}: need {needed} bytes, got {got}")]
    TooShort {
        /// Command opcode being decoded
        command: u8,
        /// Minimum bytes the record layout requires
        needed: usize,
        /// Bytes actually present
        got: usize,
    },

    /// Payload matches a retired layout this gateway does not accept.
    #[error("unsupported layout for command {command:#04x}: {reason}")]
    UnsupportedLayout {
        /// Command opcode being decoded
        command: u8,
        /// What made the layout unacceptable
        reason: &'static str,
    },
}
