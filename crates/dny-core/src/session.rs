//! Per-connection session state machine.
//!
//! A session owns the framer for its connection and the typed state the
//! original firmware protocol expects the server to track: ICCID from the
//! prelude, PhysicalID from the first registered frame, the activity
//! stamp, and a consecutive-garbage counter. It is pure - methods take
//! time as input and mutate state; all I/O and registry coordination
//! happen in the driver.
//!
//! # State Machine
//!
//! ```text
//! Connected ─▶ PreIccid ─▶ IccidReceived ─▶ Registered ─▶ Active
//!                  │              │              ▲   ▲        │
//!                  │              └──────────────┘   │        │
//!                  └─────────────────────────────────┘        │
//!                        (frame without prelude)              │
//!                                                             ▼
//!                            any state ──────▶ Closing ─▶ Closed
//! ```

use std::{net::SocketAddr, ops::Sub, time::Duration};

use serde::Serialize;

use dny_proto::{Framer, Iccid, PhysicalId};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Socket accepted, nothing processed yet (transient)
    Connected,
    /// Waiting for the ICCID prelude
    PreIccid,
    /// Prelude consumed, waiting for the first frame
    IccidReceived,
    /// PhysicalID bound in the registry
    Registered,
    /// Traffic observed after registration
    Active,
    /// Eviction or error initiated, outbound flush in progress
    Closing,
    /// Socket gone; the session object is about to be dropped
    Closed,
}

/// Server-side state for one live TCP connection.
///
/// Generic over the instant type so the whole lifecycle runs under a
/// simulated clock in tests.
#[derive(Debug)]
pub struct Session<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    id: u64,
    remote_addr: SocketAddr,
    state: SessionState,
    iccid: Option<Iccid>,
    physical_id: Option<PhysicalId>,
    last_activity: I,
    garbage_run: usize,
    garbage_limit: usize,
    /// Unit splitter for this connection's byte feed.
    pub(crate) framer: Framer,
}

impl<I> Session<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a session for a freshly accepted connection.
    ///
    /// Starts in [`SessionState::PreIccid`]; the `Connected` state exists
    /// only between accept and the driver picking the connection up.
    pub fn accept(
        id: u64,
        remote_addr: SocketAddr,
        now: I,
        max_payload: usize,
        garbage_limit: usize,
    ) -> Self {
        Self {
            id,
            remote_addr,
            state: SessionState::PreIccid,
            iccid: None,
            physical_id: None,
            last_activity: now,
            garbage_run: 0,
            garbage_limit,
            framer: Framer::new(max_payload),
        }
    }

    /// Connection id assigned by the runtime.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// ICCID from the prelude, if one was sent.
    #[must_use]
    pub fn iccid(&self) -> Option<Iccid> {
        self.iccid
    }

    /// PhysicalID once registered.
    #[must_use]
    pub fn physical_id(&self) -> Option<PhysicalId> {
        self.physical_id
    }

    /// Stamp activity. Every unit the framer yields and every outbound
    /// send lands here.
    pub fn touch(&mut self, now: I) {
        self.last_activity = now;
    }

    /// Time since the last activity stamp.
    #[must_use]
    pub fn idle_for(&self, now: I) -> Duration {
        now - self.last_activity
    }

    /// Store the prelude ICCID and advance out of `PreIccid`.
    pub fn note_iccid(&mut self, iccid: Iccid) {
        self.iccid = Some(iccid);
        if self.state == SessionState::PreIccid {
            self.state = SessionState::IccidReceived;
        }
    }

    /// Bind the PhysicalID and advance to `Registered`.
    ///
    /// Valid from both the prelude path and the tolerated no-prelude
    /// reconnect path.
    pub fn note_registered(&mut self, physical_id: PhysicalId) {
        self.physical_id = Some(physical_id);
        if matches!(self.state, SessionState::PreIccid | SessionState::IccidReceived) {
            self.state = SessionState::Registered;
        }
    }

    /// Registered sessions go `Active` on their next traffic.
    pub fn note_traffic(&mut self) {
        if self.state == SessionState::Registered {
            self.state = SessionState::Active;
        }
    }

    /// The registry displaced this session's binding; it keeps running
    /// without one until the transport closes.
    pub fn clear_binding(&mut self) {
        self.physical_id = None;
    }

    /// Count one garbage byte. Returns `true` when the consecutive run
    /// exceeds the configured limit and the connection should close.
    pub fn note_garbage(&mut self) -> bool {
        self.garbage_run += 1;
        self.garbage_run > self.garbage_limit
    }

    /// A recognized unit ends any garbage run.
    pub fn reset_garbage(&mut self) {
        self.garbage_run = 0;
    }

    /// Begin teardown. Idempotent; `Closed` stays `Closed`.
    pub fn begin_close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closing;
        }
    }

    /// Final state once the socket is gone.
    pub fn finish_close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Whether the session still processes inbound traffic.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !matches!(self.state, SessionState::Closing | SessionState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[allow(clippy::disallowed_methods)]
    fn session() -> (Session<Instant>, Instant) {
        let now = Instant::now();
        (Session::accept(7, addr(), now, 2048, 16), now)
    }

    #[test]
    fn prelude_registration_path() {
        let (mut session, _) = session();
        assert_eq!(session.state(), SessionState::PreIccid);

        session.note_iccid(Iccid::parse(b"89860449162390488297").unwrap());
        assert_eq!(session.state(), SessionState::IccidReceived);

        session.note_registered(PhysicalId::new(0x04A2_6CF3));
        assert_eq!(session.state(), SessionState::Registered);
        assert_eq!(session.physical_id(), Some(PhysicalId::new(0x04A2_6CF3)));

        session.note_traffic();
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn reconnect_without_prelude_registers() {
        let (mut session, _) = session();
        session.note_registered(PhysicalId::new(0x04A2_28CD));
        assert_eq!(session.state(), SessionState::Registered);
        assert_eq!(session.iccid(), None);
    }

    #[test]
    fn garbage_run_trips_after_limit() {
        let (mut session, _) = session();
        for _ in 0..16 {
            assert!(!session.note_garbage());
        }
        assert!(session.note_garbage());

        session.reset_garbage();
        assert!(!session.note_garbage());
    }

    #[test]
    fn idle_time_tracks_touch() {
        let (mut session, now) = session();
        let later = now + Duration::from_secs(40);
        assert_eq!(session.idle_for(later), Duration::from_secs(40));

        session.touch(later);
        assert_eq!(session.idle_for(later), Duration::ZERO);
    }

    #[test]
    fn close_is_one_way() {
        let (mut session, _) = session();
        session.begin_close();
        assert_eq!(session.state(), SessionState::Closing);
        assert!(!session.is_open());

        session.finish_close();
        assert_eq!(session.state(), SessionState::Closed);

        session.begin_close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn displaced_binding_clears_physical_id() {
        let (mut session, _) = session();
        session.note_registered(PhysicalId::new(1));
        session.note_traffic();

        session.clear_binding();
        assert_eq!(session.physical_id(), None);
        // State is untouched; the transport keeps running.
        assert_eq!(session.state(), SessionState::Active);
    }
}
