//! Gateway counters.
//!
//! Every local recovery in the error policy increments a counter here, so
//! the observability surface can tell a healthy fleet from one spraying
//! garbage. Counters are plain relaxed atomics - they are statistics, not
//! synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters shared between the driver and the runtime.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    frames_decoded: AtomicU64,
    frames_bad_checksum: AtomicU64,
    frames_rejected: AtomicU64,
    payloads_undecoded: AtomicU64,
    unknown_commands: AtomicU64,
    garbage_bytes: AtomicU64,
    link_tokens: AtomicU64,
    sessions_evicted: AtomicU64,
    commands_timed_out: AtomicU64,
    commands_cancelled: AtomicU64,
    time_replies: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $field:ident) => {
        /// Increment the counter.
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl GatewayMetrics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    counter!(inc_frames_decoded, frames_decoded);
    counter!(inc_frames_bad_checksum, frames_bad_checksum);
    counter!(inc_frames_rejected, frames_rejected);
    counter!(inc_payloads_undecoded, payloads_undecoded);
    counter!(inc_unknown_commands, unknown_commands);
    counter!(inc_garbage_bytes, garbage_bytes);
    counter!(inc_link_tokens, link_tokens);
    counter!(inc_sessions_evicted, sessions_evicted);
    counter!(inc_commands_timed_out, commands_timed_out);
    counter!(inc_commands_cancelled, commands_cancelled);
    counter!(inc_time_replies, time_replies);

    /// Add to the timed-out counter in bulk (sweep results).
    pub fn add_commands_timed_out(&self, n: u64) {
        self.commands_timed_out.fetch_add(n, Ordering::Relaxed);
    }

    /// Add to the cancelled counter in bulk (session teardown).
    pub fn add_commands_cancelled(&self, n: u64) {
        self.commands_cancelled.fetch_add(n, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_bad_checksum: self.frames_bad_checksum.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            payloads_undecoded: self.payloads_undecoded.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            garbage_bytes: self.garbage_bytes.load(Ordering::Relaxed),
            link_tokens: self.link_tokens.load(Ordering::Relaxed),
            sessions_evicted: self.sessions_evicted.load(Ordering::Relaxed),
            commands_timed_out: self.commands_timed_out.load(Ordering::Relaxed),
            commands_cancelled: self.commands_cancelled.load(Ordering::Relaxed),
            time_replies: self.time_replies.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot for the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Frames decoded successfully (checksum state regardless)
    pub frames_decoded: u64,
    /// Frames admitted with a checksum mismatch
    pub frames_bad_checksum: u64,
    /// Frames dropped for structural errors (magic, length)
    pub frames_rejected: u64,
    /// Recognized commands whose payload failed its record decoder
    pub payloads_undecoded: u64,
    /// Frames routed through the default handler for unknown opcodes
    pub unknown_commands: u64,
    /// Bytes skipped as framing garbage
    pub garbage_bytes: u64,
    /// `link` keep-alive tokens consumed
    pub link_tokens: u64,
    /// Sessions evicted by the idle sweep
    pub sessions_evicted: u64,
    /// Commands that expired without a response
    pub commands_timed_out: u64,
    /// Commands cancelled by session teardown
    pub commands_cancelled: u64,
    /// Server-time responses synthesized
    pub time_replies: u64,
}
