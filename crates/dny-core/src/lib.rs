//! Gateway core for DNY charging-pile fleets.
//!
//! Everything here is Sans-IO: the [`GatewayDriver`] consumes
//! [`GatewayEvent`]s produced by whatever runtime owns the sockets and
//! returns [`GatewayAction`]s for that runtime to execute. No reads, no
//! writes, no clocks - time and randomness come through the
//! [`Environment`] trait so the whole state machine runs under a simulated
//! clock in tests.
//!
//! # Components
//!
//! - [`Session`]: per-connection lifecycle state machine and framer
//! - [`DeviceRegistry`]: bidirectional PhysicalID/ICCID ↔ session index
//! - [`CommandCorrelator`]: pending server→device commands and waiters
//! - [`GatewayDriver`]: frame routing, registration, eviction, replies
//! - [`GatewayMetrics`]: counters behind the observability surface

mod correlator;
mod driver;
mod env;
mod error;
mod metrics;
mod registry;
mod session;

pub use correlator::{CommandCorrelator, CommandOutcome};
pub use driver::{
    CommandTicket, DeviceNotice, DeviceSnapshot, GatewayAction, GatewayConfig, GatewayDriver,
    GatewayEvent,
};
pub use env::Environment;
pub use error::GatewayError;
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use registry::{DeviceIdentity, DeviceRegistry};
pub use session::{Session, SessionState};
