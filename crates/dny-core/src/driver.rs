//! Gateway driver.
//!
//! Ties together sessions, the device registry and the command
//! correlator. The runtime feeds it [`GatewayEvent`]s and executes the
//! [`GatewayAction`]s it returns; the driver itself performs no I/O, which
//! keeps every routing rule testable without sockets.
//!
//! Routing rules for an inbound frame, in order: admit soft checksum
//! failures (counted), refresh activity, auto-register unregistered
//! sessions carrying a non-zero PhysicalID, complete any pending command
//! the frame answers BEFORE publishing it northbound, answer server-time
//! requests inline, then hand the decoded payload to business code.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use dny_proto::{DnyFrame, Payload, PhysicalId, Unit, payloads::TimeResponse};

use crate::{
    CommandOutcome, Environment, GatewayError, GatewayMetrics,
    correlator::CommandCorrelator,
    registry::DeviceRegistry,
    session::{Session, SessionState},
};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Evict sessions silent for longer than this.
    pub idle_timeout: Duration,
    /// Largest payload a frame may declare.
    pub max_payload: usize,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Close a connection after this many consecutive garbage bytes.
    pub garbage_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            // Five device heartbeat periods.
            idle_timeout: Duration::from_secs(15 * 60),
            max_payload: dny_proto::FrameHeader::DEFAULT_MAX_PAYLOAD,
            max_connections: 10_000,
            garbage_limit: 4096,
        }
    }
}

/// Events the runtime feeds into the driver.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A new connection was accepted.
    Accepted {
        /// Connection id assigned by the runtime
        session_id: u64,
        /// Peer address
        remote_addr: SocketAddr,
    },

    /// Bytes arrived on a connection.
    Bytes {
        /// Connection the bytes arrived on
        session_id: u64,
        /// The received bytes, any chunking
        bytes: Bytes,
    },

    /// A connection is gone (peer close, error, or executed eviction).
    Closed {
        /// Connection that closed
        session_id: u64,
        /// Why it closed
        reason: String,
    },

    /// Periodic sweep tick.
    Tick,
}

/// Actions the runtime executes on the driver's behalf.
#[derive(Debug)]
pub enum GatewayAction {
    /// Enqueue pre-encoded bytes on a connection's writer.
    Send {
        /// Target connection
        session_id: u64,
        /// Complete encoded frame
        bytes: Bytes,
    },

    /// Tear a connection down.
    Close {
        /// Connection to close
        session_id: u64,
        /// Reason, for the log line
        reason: String,
    },

    /// Hand a decoded frame to business code.
    Notify(DeviceNotice),
}

/// A decoded inbound frame, addressed for business code.
#[derive(Debug)]
pub struct DeviceNotice {
    /// Connection the frame arrived on
    pub session_id: u64,
    /// Device the frame came from
    pub physical_id: PhysicalId,
    /// Correlation token from the frame header
    pub message_id: u16,
    /// Raw command opcode
    pub command: u8,
    /// Decoded payload (possibly `Extended` or `Undecoded`)
    pub payload: Payload,
}

/// One row of the registry snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    /// Canonical 8-hex device id
    pub physical_id: String,
    /// ICCID from the prelude, if sent
    pub iccid: Option<String>,
    /// Peer address
    pub remote_addr: SocketAddr,
    /// Session lifecycle state
    pub state: SessionState,
    /// Seconds since last activity
    pub idle_secs: u64,
}

/// A tracked server→device command, ready for the runtime to send.
#[derive(Debug)]
pub struct CommandTicket {
    /// Allocated correlation id
    pub message_id: u16,
    /// Resolves when the device answers, the deadline passes, or the
    /// session closes
    pub receiver: oneshot::Receiver<CommandOutcome>,
    /// Actions carrying the encoded command to the device
    pub actions: Vec<GatewayAction>,
}

/// Sans-IO gateway orchestrator.
pub struct GatewayDriver<E>
where
    E: Environment,
{
    sessions: HashMap<u64, Session<E::Instant>>,
    registry: DeviceRegistry,
    correlator: CommandCorrelator<E::Instant>,
    metrics: Arc<GatewayMetrics>,
    env: E,
    config: GatewayConfig,
}

impl<E> GatewayDriver<E>
where
    E: Environment,
{
    /// Create a driver with fresh state.
    pub fn new(env: E, config: GatewayConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            registry: DeviceRegistry::new(),
            correlator: CommandCorrelator::new(),
            metrics: Arc::new(GatewayMetrics::new()),
            env,
            config,
        }
    }

    /// Process one event and return the actions to execute.
    pub fn process_event(
        &mut self,
        event: GatewayEvent,
    ) -> Result<Vec<GatewayAction>, GatewayError> {
        match event {
            GatewayEvent::Accepted { session_id, remote_addr } => {
                Ok(self.handle_accepted(session_id, remote_addr))
            },
            GatewayEvent::Bytes { session_id, bytes } => self.handle_bytes(session_id, &bytes),
            GatewayEvent::Closed { session_id, reason } => {
                Ok(self.handle_closed(session_id, &reason))
            },
            GatewayEvent::Tick => Ok(self.handle_tick()),
        }
    }

    fn handle_accepted(&mut self, session_id: u64, remote_addr: SocketAddr) -> Vec<GatewayAction> {
        if self.sessions.len() >= self.config.max_connections {
            warn!(session_id, %remote_addr, "connection limit reached, refusing");
            return vec![GatewayAction::Close {
                session_id,
                reason: "max connections exceeded".to_string(),
            }];
        }

        let session = Session::accept(
            session_id,
            remote_addr,
            self.env.now(),
            self.config.max_payload,
            self.config.garbage_limit,
        );
        self.sessions.insert(session_id, session);
        debug!(session_id, %remote_addr, "connection accepted");

        Vec::new()
    }

    fn handle_bytes(
        &mut self,
        session_id: u64,
        bytes: &Bytes,
    ) -> Result<Vec<GatewayAction>, GatewayError> {
        {
            let session = self
                .sessions
                .get_mut(&session_id)
                .ok_or(GatewayError::SessionNotFound(session_id))?;
            if !session.is_open() {
                // Late bytes racing a teardown; nothing to do.
                return Ok(Vec::new());
            }
            session.framer.push(bytes);
        }

        let mut actions = Vec::new();
        loop {
            // Re-borrow per unit: handlers below need the registry and the
            // correlator alongside the session map.
            let unit = match self.sessions.get_mut(&session_id) {
                Some(session) if session.is_open() => session.framer.next_unit(),
                _ => None,
            };
            let Some(unit) = unit else { break };

            self.process_unit(session_id, unit, &mut actions);
        }

        Ok(actions)
    }

    fn process_unit(&mut self, session_id: u64, unit: Unit, actions: &mut Vec<GatewayAction>) {
        let now = self.env.now();

        match unit {
            Unit::Garbage(byte) => {
                self.metrics.inc_garbage_bytes();
                let Some(session) = self.sessions.get_mut(&session_id) else { return };
                session.touch(now);
                if session.note_garbage() {
                    warn!(session_id, byte, "garbage threshold exceeded, closing");
                    session.begin_close();
                    actions.push(GatewayAction::Close {
                        session_id,
                        reason: "framing garbage threshold exceeded".to_string(),
                    });
                }
            },

            Unit::LinkToken => {
                self.metrics.inc_link_tokens();
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.touch(now);
                    session.reset_garbage();
                }
                trace!(session_id, "link keep-alive");
            },

            Unit::IccidPrelude(iccid) => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.touch(now);
                    session.reset_garbage();
                    session.note_iccid(iccid);
                }
                if let Some(displaced) = self.registry.bind_iccid(iccid, session_id) {
                    warn!(session_id, displaced, %iccid, "ICCID rebound from another session");
                }
                debug!(session_id, %iccid, "ICCID prelude received");
            },

            Unit::Frame(raw) => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.touch(now);
                    session.reset_garbage();
                }
                match DnyFrame::decode(&raw) {
                    Ok(frame) => self.process_frame(session_id, &frame, actions),
                    Err(error) => {
                        self.metrics.inc_frames_rejected();
                        warn!(session_id, %error, "dropping malformed frame");
                    },
                }
            },
        }
    }

    fn process_frame(
        &mut self,
        session_id: u64,
        frame: &DnyFrame,
        actions: &mut Vec<GatewayAction>,
    ) {
        self.metrics.inc_frames_decoded();
        if !frame.checksum_ok {
            self.metrics.inc_frames_bad_checksum();
            warn!(
                session_id,
                device = %frame.physical_id,
                command = format_args!("{:#04x}", frame.command),
                "checksum mismatch, admitting frame"
            );
        }

        self.bind_if_unregistered(session_id, frame.physical_id);

        // Complete the waiter before business code hears about the frame.
        let resolved = self.correlator.resolve(
            frame.physical_id,
            frame.message_id,
            frame.command,
            frame.payload.clone(),
        );
        if resolved {
            debug!(
                session_id,
                device = %frame.physical_id,
                message_id = frame.message_id,
                "pending command resolved"
            );
        }

        let payload = Payload::decode(frame.command, &frame.payload);
        match &payload {
            Payload::Undecoded { reason, .. } => {
                self.metrics.inc_payloads_undecoded();
                warn!(session_id, device = %frame.physical_id, %reason, "payload undecoded");
            },
            Payload::Extended(bytes) => {
                self.metrics.inc_unknown_commands();
                info!(
                    session_id,
                    device = %frame.physical_id,
                    command = format_args!("{:#04x}", frame.command),
                    len = bytes.len(),
                    "extended opcode routed opaque"
                );
            },
            Payload::TimeRequest => {
                actions.extend(self.time_reply(session_id, frame));
            },
            _ => {},
        }

        actions.push(GatewayAction::Notify(DeviceNotice {
            session_id,
            physical_id: frame.physical_id,
            message_id: frame.message_id,
            command: frame.command,
            payload,
        }));
    }

    /// Bind a not-yet-registered session on its first frame carrying a
    /// non-zero PhysicalID; any later frame just marks the session active.
    fn bind_if_unregistered(&mut self, session_id: u64, physical_id: PhysicalId) {
        let unregistered = self.sessions.get(&session_id).is_some_and(|s| {
            matches!(s.state(), SessionState::PreIccid | SessionState::IccidReceived)
        });

        if !unregistered {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.note_traffic();
            }
            return;
        }
        if physical_id.is_zero() {
            return;
        }

        if let Some(displaced) = self.registry.bind_physical(physical_id, session_id) {
            warn!(
                session_id,
                displaced,
                device = %physical_id,
                "device re-registered, previous binding replaced"
            );
            if let Some(old) = self.sessions.get_mut(&displaced) {
                old.clear_binding();
            }
        }
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.note_registered(physical_id);
        }
        info!(session_id, device = %physical_id, "device registered");
    }

    /// Default-handler reply for server-time requests: same device, same
    /// message id, same command, payload = current epoch as u32 LE.
    fn time_reply(&self, session_id: u64, frame: &DnyFrame) -> Option<GatewayAction> {
        let epoch = self.env.wall_clock_secs() as u32;
        let reply = DnyFrame::new(
            frame.physical_id,
            frame.message_id,
            frame.command,
            TimeResponse { epoch }.encode(),
        );
        match reply.to_bytes() {
            Ok(bytes) => {
                self.metrics.inc_time_replies();
                Some(GatewayAction::Send { session_id, bytes })
            },
            Err(error) => {
                warn!(session_id, %error, "failed to encode time reply");
                None
            },
        }
    }

    fn handle_closed(&mut self, session_id: u64, reason: &str) -> Vec<GatewayAction> {
        let Some(mut session) = self.sessions.remove(&session_id) else {
            return Vec::new();
        };
        session.finish_close();

        self.registry.unbind_session(session_id);
        let cancelled = self.correlator.cancel_session(session_id);
        self.metrics.add_commands_cancelled(cancelled as u64);

        info!(session_id, reason, cancelled, "connection closed");
        Vec::new()
    }

    fn handle_tick(&mut self) -> Vec<GatewayAction> {
        let now = self.env.now();
        let mut actions = Vec::new();

        let idle: Vec<u64> = self
            .sessions
            .values()
            .filter(|s| s.is_open() && s.idle_for(now) > self.config.idle_timeout)
            .map(Session::id)
            .collect();

        for session_id in idle {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                warn!(
                    session_id,
                    idle_secs = session.idle_for(now).as_secs(),
                    "evicting silent connection"
                );
                session.begin_close();
                self.metrics.inc_sessions_evicted();
                actions.push(GatewayAction::Close {
                    session_id,
                    reason: "idle timeout".to_string(),
                });
            }
        }

        let timed_out = self.correlator.sweep_expired(now);
        self.metrics.add_commands_timed_out(timed_out as u64);

        actions
    }

    /// Southbound entry: encode and track a command for a device.
    ///
    /// The pending entry is registered before the encoded bytes are handed
    /// to the runtime, so a response can never beat its own waiter.
    pub fn send_command(
        &mut self,
        physical_id: PhysicalId,
        command: u8,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<CommandTicket, GatewayError> {
        let session_id = self
            .registry
            .resolve(physical_id)
            .filter(|id| self.sessions.get(id).is_some_and(Session::is_open))
            .ok_or(GatewayError::DeviceNotConnected(physical_id))?;

        let message_id = self
            .correlator
            .allocate()
            .ok_or(GatewayError::CorrelatorFull { pending: self.correlator.pending_count() })?;

        let frame = DnyFrame::new(physical_id, message_id, command, payload);
        let bytes = frame.to_bytes()?;

        let now = self.env.now();
        let receiver =
            self.correlator.track(message_id, physical_id, session_id, command, now + timeout);

        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.touch(now);
        }
        debug!(
            session_id,
            device = %physical_id,
            message_id,
            command = format_args!("{command:#04x}"),
            "command tracked"
        );

        Ok(CommandTicket {
            message_id,
            receiver,
            actions: vec![GatewayAction::Send { session_id, bytes }],
        })
    }

    /// Consistent view of currently bound devices.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        let now = self.env.now();
        self.registry
            .bound_devices()
            .filter_map(|(physical_id, session_id)| {
                let session = self.sessions.get(&session_id)?;
                Some(DeviceSnapshot {
                    physical_id: physical_id.to_canonical(),
                    iccid: session.iccid().map(|i| i.as_str().to_string()),
                    remote_addr: session.remote_addr(),
                    state: session.state(),
                    idle_secs: session.idle_for(now).as_secs(),
                })
            })
            .collect()
    }

    /// Counter handle shared with the runtime.
    #[must_use]
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Live connection count.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// State of one session, for the runtime's bookkeeping.
    #[must_use]
    pub fn session_state(&self, session_id: u64) -> Option<SessionState> {
        self.sessions.get(&session_id).map(Session::state)
    }
}

impl<E> std::fmt::Debug for GatewayDriver<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayDriver")
            .field("connection_count", &self.sessions.len())
            .field("device_count", &self.registry.device_count())
            .field("pending_commands", &self.correlator.pending_count())
            .finish()
    }
}
