//! Gateway core error types.
//!
//! Malformed device input is never an error at this level - the framer
//! skips it and the dispatcher counts it. Errors here are for the
//! runtime's own mistakes (events for unknown sessions) and for business
//! callers addressing devices that are not there.

use thiserror::Error;

use dny_proto::{PhysicalId, ProtocolError};

/// Errors from gateway driver operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Event referenced a session id the driver does not know.
    ///
    /// Indicates a runtime bookkeeping bug: the runtime fed bytes for a
    /// connection it never announced or already closed.
    #[error("session not found: {0:#018x}")]
    SessionNotFound(u64),

    /// A command was addressed to a device with no live registered session.
    ///
    /// Normal operational condition; callers retry once the device
    /// reconnects.
    #[error("device not connected: {0}")]
    DeviceNotConnected(PhysicalId),

    /// Every correlation id is occupied by a pending command.
    ///
    /// Requires 65535 simultaneously pending commands; seeing this means a
    /// caller is leaking waiters.
    #[error("no free message id: {pending} commands pending")]
    CorrelatorFull {
        /// Commands currently pending
        pending: usize,
    },

    /// Frame encoding failed while building a server-originated command.
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}
