//! Server runtime error types.

use thiserror::Error;

use dny_core::GatewayError;

/// Errors from the production runtime.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration problem (bad bind address, invalid option).
    #[error("config error: {0}")]
    Config(String),

    /// Listener or socket failure outside any single session.
    #[error("transport error: {0}")]
    Transport(String),

    /// Gateway core refused an operation.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Errors business callers see from the command API.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// The gateway could not accept the command (device absent, encode
    /// failure, correlator exhausted).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The deadline passed without a matching device response.
    #[error("command timed out")]
    Timeout,

    /// The device's session closed while the command was pending.
    #[error("command cancelled by session close")]
    Cancelled,

    /// The gateway shut down under the waiter.
    #[error("gateway connection lost")]
    ConnectionLost,
}
