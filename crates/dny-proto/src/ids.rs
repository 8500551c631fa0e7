//! Identifier formats: physical ids, card numbers, ICCIDs, order numbers.
//!
//! Every identifier has exactly one canonical serialization so registry
//! keys, log lines and business callbacks never disagree on spelling.

use std::fmt;

use thiserror::Error;

/// Errors from identifier parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Input length does not match the format.
    #[error("bad length: expected {expected} characters, got {got}")]
    BadLength {
        /// Required character count
        expected: usize,
        /// Characters provided
        got: usize,
    },

    /// ICCID does not start with the `89` telecom prefix.
    #[error("bad prefix: ICCID must start with 89")]
    BadPrefix,

    /// A character outside the hexadecimal alphabet.
    #[error("invalid character at position {position}")]
    BadCharacter {
        /// Zero-based offset of the offending character
        position: usize,
    },

    /// Order numbers must be printable ASCII.
    #[error("not printable ASCII")]
    NotAscii,
}

/// 32-bit logical device identity.
///
/// Serialized little-endian inside frames. The canonical human form is
/// 8 upper-case hex characters without prefix (`"04A26CF3"`); the display
/// number strips the leading `04` device-family tag and renders the
/// remainder in decimal, matching what is printed on the pile enclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalId(u32);

impl PhysicalId {
    /// Wrap a raw 32-bit identity.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw 32-bit value as carried on the wire.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Zero ids are placeholders and never registrable.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Canonical form: 8 upper-case hex characters.
    #[must_use]
    pub fn to_canonical(self) -> String {
        format!("{:08X}", self.0)
    }

    /// Parse the canonical 8-hex form.
    pub fn from_canonical(s: &str) -> std::result::Result<Self, IdError> {
        if s.len() != 8 {
            return Err(IdError::BadLength { expected: 8, got: s.len() });
        }
        parse_hex_u32(s).map(Self)
    }

    /// Device-facing number: the canonical form minus the `04` family tag,
    /// in decimal. Ids outside the `04` family render their full value.
    #[must_use]
    pub fn display_number(self) -> String {
        if self.0 >> 24 == 0x04 {
            (self.0 & 0x00FF_FFFF).to_string()
        } else {
            self.0.to_string()
        }
    }
}

impl fmt::Display for PhysicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// Card number in the same 8-upper-hex canonical form as [`PhysicalId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardId(u32);

impl CardId {
    /// Wrap a raw card number.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw 32-bit value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Canonical form: 8 upper-case hex characters.
    #[must_use]
    pub fn to_canonical(self) -> String {
        format!("{:08X}", self.0)
    }

    /// Parse the canonical 8-hex form.
    pub fn from_canonical(s: &str) -> std::result::Result<Self, IdError> {
        if s.len() != 8 {
            return Err(IdError::BadLength { expected: 8, got: s.len() });
        }
        parse_hex_u32(s).map(Self)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// SIM identifier sent once by the device immediately after TCP connect.
///
/// Exactly 20 ASCII characters, starting `"89"` (the telecom industry
/// prefix), all from the hexadecimal alphabet. Stored inline; sessions and
/// the registry copy it freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iccid([u8; 20]);

impl Iccid {
    /// Wire length of the prelude.
    pub const LEN: usize = 20;

    /// Validate and wrap 20 prelude bytes.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, IdError> {
        if bytes.len() != Self::LEN {
            return Err(IdError::BadLength { expected: Self::LEN, got: bytes.len() });
        }
        if &bytes[..2] != b"89" {
            return Err(IdError::BadPrefix);
        }
        for (position, b) in bytes.iter().enumerate() {
            if !b.is_ascii_hexdigit() {
                return Err(IdError::BadCharacter { position });
            }
        }
        let mut inner = [0u8; Self::LEN];
        inner.copy_from_slice(bytes);
        Ok(Self(inner))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Validated ASCII hex at construction.
        std::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl fmt::Display for Iccid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 16-byte order number carried in charge-control and settlement payloads.
///
/// ASCII, right-padded with NUL when shorter than 16 characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderNo([u8; 16]);

impl OrderNo {
    /// Wire length inside payloads.
    pub const LEN: usize = 16;

    /// Wrap the raw 16 payload bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build from a string of at most 16 printable ASCII characters.
    pub fn parse(s: &str) -> std::result::Result<Self, IdError> {
        if s.len() > Self::LEN {
            return Err(IdError::BadLength { expected: Self::LEN, got: s.len() });
        }
        if !s.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(IdError::NotAscii);
        }
        let mut inner = [0u8; Self::LEN];
        inner[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(inner))
    }

    /// Raw padded bytes for encoding.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// The order number with trailing padding stripped.
    #[must_use]
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(Self::LEN);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl fmt::Display for OrderNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_hex_u32(s: &str) -> std::result::Result<u32, IdError> {
    let mut value: u32 = 0;
    for (position, c) in s.chars().enumerate() {
        let digit = c.to_digit(16).ok_or(IdError::BadCharacter { position })?;
        value = (value << 4) | digit;
    }
    Ok(value)
}
