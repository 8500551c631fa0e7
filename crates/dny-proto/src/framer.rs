//! Byte-stream framer.
//!
//! Splits an append-only byte feed into logical units: the one-shot ICCID
//! prelude, the out-of-band `"link"` keep-alive token, complete raw DNY
//! frames, and garbage skipped one byte at a time. Framing never fails and
//! never blocks on malformed input; a frame whose declared length can
//! never be satisfied is skipped byte-wise instead of waited for.
//!
//! The cursor only waits for more bytes while the buffered prefix is still
//! a viable start of some unit. That discipline makes the emitted unit
//! sequence independent of how the feed is chunked: bytes pushed one at a
//! time produce exactly the units of the same bytes pushed at once.

use bytes::{Bytes, BytesMut};

use crate::{FrameHeader, Iccid};

const LINK_TOKEN: &[u8] = b"link";

/// One logical unit produced by the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// The 20-byte SIM identifier sent once after connect.
    IccidPrelude(Iccid),
    /// The `"link"` keep-alive token; refreshes activity only.
    LinkToken,
    /// A complete raw DNY frame, magic through checksum.
    Frame(Bytes),
    /// One unrecognized byte skipped at the cursor.
    Garbage(u8),
}

/// What the cursor currently looks at.
enum Scan {
    /// Prefix may still become a unit; wait for more bytes.
    NeedMore,
    /// Consume `.0` bytes as this unit.
    Iccid(Iccid),
    /// Consume 4 bytes as a link token.
    Link,
    /// Consume `.0` bytes as a complete frame.
    Frame(usize),
    /// First byte cannot start any unit; skip it.
    Garbage,
}

/// Incremental splitter over a growing byte buffer.
///
/// The ICCID prelude is only recognized while the framer is in its initial
/// phase; the first frame or prelude switches it to stream phase for the
/// rest of the connection (a reconnecting device may skip the prelude
/// entirely and open with a frame).
#[derive(Debug)]
pub struct Framer {
    buf: BytesMut,
    awaiting_prelude: bool,
    max_payload: usize,
}

impl Framer {
    /// Create a framer that accepts payloads up to `max_payload` bytes.
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        Self { buf: BytesMut::with_capacity(4096), awaiting_prelude: true, max_payload }
    }

    /// Append received bytes to the feed.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete unit, or `None` if more bytes are needed.
    ///
    /// Call in a loop after every [`Framer::push`] until it returns `None`.
    pub fn next_unit(&mut self) -> Option<Unit> {
        if self.buf.is_empty() {
            return None;
        }

        match self.scan() {
            Scan::NeedMore => None,
            Scan::Iccid(iccid) => {
                let _ = self.buf.split_to(Iccid::LEN);
                self.awaiting_prelude = false;
                Some(Unit::IccidPrelude(iccid))
            },
            Scan::Link => {
                let _ = self.buf.split_to(LINK_TOKEN.len());
                Some(Unit::LinkToken)
            },
            Scan::Frame(total) => {
                let raw = self.buf.split_to(total).freeze();
                self.awaiting_prelude = false;
                Some(Unit::Frame(raw))
            },
            Scan::Garbage => {
                let byte = self.buf.split_to(1)[0];
                Some(Unit::Garbage(byte))
            },
        }
    }

    /// Classify the bytes at the cursor without consuming anything.
    fn scan(&self) -> Scan {
        match self.buf[0] {
            b'8' if self.awaiting_prelude => self.scan_iccid(),
            b'l' => self.scan_token(LINK_TOKEN, Scan::Link),
            b'D' => self.scan_frame(),
            _ => Scan::Garbage,
        }
    }

    /// ICCID candidate: 20 bytes, `89` prefix, all hex.
    fn scan_iccid(&self) -> Scan {
        let upto = self.buf.len().min(Iccid::LEN);
        for (i, &b) in self.buf[..upto].iter().enumerate() {
            let viable = match i {
                0 => b == b'8',
                1 => b == b'9',
                _ => b.is_ascii_hexdigit(),
            };
            if !viable {
                return Scan::Garbage;
            }
        }
        if self.buf.len() < Iccid::LEN {
            return Scan::NeedMore;
        }
        match Iccid::parse(&self.buf[..Iccid::LEN]) {
            Ok(iccid) => Scan::Iccid(iccid),
            Err(_) => Scan::Garbage,
        }
    }

    /// Literal token candidate (`"link"`).
    fn scan_token(&self, token: &[u8], matched: Scan) -> Scan {
        let upto = self.buf.len().min(token.len());
        if self.buf[..upto] != token[..upto] {
            return Scan::Garbage;
        }
        if self.buf.len() < token.len() { Scan::NeedMore } else { matched }
    }

    /// DNY frame candidate: magic, then a plausible length, then the full
    /// `length + 5` bytes. An impossible length is garbage immediately -
    /// the bytes to satisfy it can never arrive.
    fn scan_frame(&self) -> Scan {
        let upto = self.buf.len().min(FrameHeader::MAGIC.len());
        if self.buf[..upto] != FrameHeader::MAGIC[..upto] {
            return Scan::Garbage;
        }
        if self.buf.len() < 5 {
            return Scan::NeedMore;
        }

        let length = u16::from_le_bytes([self.buf[3], self.buf[4]]);
        if length < FrameHeader::LEN_OVERHEAD
            || usize::from(length - FrameHeader::LEN_OVERHEAD) > self.max_payload
        {
            return Scan::Garbage;
        }

        let total = usize::from(length) + 5;
        if self.buf.len() < total { Scan::NeedMore } else { Scan::Frame(total) }
    }
}
