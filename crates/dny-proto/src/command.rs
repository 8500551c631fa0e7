//! Command opcodes.
//!
//! Frames carry the opcode as a raw `u8`; [`Command::from_u8`] maps the
//! recognized table. Anything unmapped - including the 0x05, 0x87-0x9B and
//! 0xA0-0xAC extended families - is routed with its raw value and an opaque
//! payload, never rejected.

/// Recognized DNY command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Legacy device heartbeat (voltage + per-port status)
    LegacyHeartbeat = 0x01,
    /// Swipe card request
    SwipeCard = 0x02,
    /// Settlement upload at end of charge
    Settlement = 0x03,
    /// Order confirmation
    OrderConfirm = 0x04,
    /// Per-port power-draw heartbeat
    PowerHeartbeat = 0x06,
    /// Host status heartbeat
    HostStatus = 0x11,
    /// Host server-time request
    HostTimeRequest = 0x12,
    /// Device registration
    Register = 0x20,
    /// Device heartbeat
    Heartbeat = 0x21,
    /// Device server-time request
    TimeRequest = 0x22,
    /// Slave firmware version report
    SlaveVersion = 0x35,
    /// Connectivity query (server to device)
    ConnectivityQuery = 0x81,
    /// Charge start/stop control (server to device)
    ChargeControl = 0x82,
    /// Runtime parameter set (server to device)
    ParamSet = 0x83,
    /// Extended runtime parameter set (server to device)
    ParamSetExt = 0x84,
    /// Max duration / overload power limits (server to device)
    ChargeLimits = 0x85,
    /// Modify running charge time or energy (server to device)
    ModifyCharge = 0x8A,
    /// Audible/visual locate (server to device)
    Locate = 0x96,
    /// Firmware upgrade begin (server to device)
    UpgradeBegin = 0xE0,
    /// Firmware upgrade data block (server to device)
    UpgradeData = 0xE1,
    /// Firmware upgrade end (server to device)
    UpgradeEnd = 0xE2,
    /// Legacy single-shot firmware upgrade (server to device)
    UpgradeLegacy = 0xF8,
}

impl Command {
    /// Map a raw opcode byte. `None` for the extended/unknown families.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x01 => Self::LegacyHeartbeat,
            0x02 => Self::SwipeCard,
            0x03 => Self::Settlement,
            0x04 => Self::OrderConfirm,
            0x06 => Self::PowerHeartbeat,
            0x11 => Self::HostStatus,
            0x12 => Self::HostTimeRequest,
            0x20 => Self::Register,
            0x21 => Self::Heartbeat,
            0x22 => Self::TimeRequest,
            0x35 => Self::SlaveVersion,
            0x81 => Self::ConnectivityQuery,
            0x82 => Self::ChargeControl,
            0x83 => Self::ParamSet,
            0x84 => Self::ParamSetExt,
            0x85 => Self::ChargeLimits,
            0x8A => Self::ModifyCharge,
            0x96 => Self::Locate,
            0xE0 => Self::UpgradeBegin,
            0xE1 => Self::UpgradeData,
            0xE2 => Self::UpgradeEnd,
            0xF8 => Self::UpgradeLegacy,
            _ => return None,
        })
    }

    /// Raw opcode byte.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Commands the server originates; inbound frames with these opcodes
    /// are responses to pending commands, not device-initiated traffic.
    #[must_use]
    pub const fn is_server_origin(self) -> bool {
        matches!(
            self,
            Self::ConnectivityQuery
                | Self::ChargeControl
                | Self::ParamSet
                | Self::ParamSetExt
                | Self::ChargeLimits
                | Self::ModifyCharge
                | Self::Locate
                | Self::UpgradeBegin
                | Self::UpgradeData
                | Self::UpgradeEnd
                | Self::UpgradeLegacy
        )
    }

    /// Server-time requests get an inline reply from the gateway itself.
    #[must_use]
    pub const fn is_time_request(self) -> bool {
        matches!(self, Self::HostTimeRequest | Self::TimeRequest)
    }
}
