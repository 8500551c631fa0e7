//! End-to-end gateway scenarios against the Sans-IO driver.
//!
//! A simulated clock drives the same code paths the production runtime
//! uses, so registration, correlation, eviction and re-registration are
//! asserted deterministically - no sockets, no sleeps.

use std::{
    net::SocketAddr,
    ops::{Add, Sub},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use dny_core::{
    CommandOutcome, DeviceNotice, Environment, GatewayAction, GatewayConfig, GatewayDriver,
    GatewayEvent, SessionState,
};
use dny_proto::{
    DnyFrame, OrderNo, Payload, PhysicalId,
    payloads::{ChargeAction, ChargeControl, ChargeControlAck},
};

/// Virtual monotonic instant, millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SimInstant(u64);

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        Duration::from_millis(self.0 - rhs.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.as_millis() as u64)
    }
}

/// Deterministic environment with a manually stepped clock.
#[derive(Clone)]
struct SimEnv {
    clock_ms: Arc<AtomicU64>,
    wall_secs: u64,
}

impl SimEnv {
    fn new() -> Self {
        Self { clock_ms: Arc::new(AtomicU64::new(0)), wall_secs: 1_750_000_000 }
    }

    fn advance(&self, duration: Duration) {
        self.clock_ms.fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.clock_ms.load(Ordering::SeqCst))
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = i as u8 ^ 0x5A;
        }
    }

    fn wall_clock_secs(&self) -> u64 {
        self.wall_secs
    }
}

fn addr(port: u16) -> SocketAddr {
    format!("192.0.2.10:{port}").parse().unwrap()
}

fn gateway(config: GatewayConfig) -> (GatewayDriver<SimEnv>, SimEnv) {
    let env = SimEnv::new();
    (GatewayDriver::new(env.clone(), config), env)
}

fn accept(driver: &mut GatewayDriver<SimEnv>, session_id: u64, port: u16) {
    let actions = driver
        .process_event(GatewayEvent::Accepted { session_id, remote_addr: addr(port) })
        .unwrap();
    assert!(actions.is_empty());
}

fn feed(driver: &mut GatewayDriver<SimEnv>, session_id: u64, bytes: &[u8]) -> Vec<GatewayAction> {
    driver
        .process_event(GatewayEvent::Bytes {
            session_id,
            bytes: Bytes::copy_from_slice(bytes),
        })
        .unwrap()
}

fn close(driver: &mut GatewayDriver<SimEnv>, session_id: u64) {
    driver
        .process_event(GatewayEvent::Closed {
            session_id,
            reason: "peer closed".to_string(),
        })
        .unwrap();
}

fn register_bytes(physical_id: u32, message_id: u16) -> Bytes {
    DnyFrame::new(
        PhysicalId::new(physical_id),
        message_id,
        0x20,
        Bytes::from_static(&[0x02, 0x00, 0x02, 0x01, 0x04, 0x00]),
    )
    .to_bytes()
    .unwrap()
}

fn heartbeat_bytes(physical_id: u32, message_id: u16) -> Bytes {
    DnyFrame::new(
        PhysicalId::new(physical_id),
        message_id,
        0x21,
        Bytes::from_static(&[0xE6, 0x00, 0x02, 0x00, 0x00, 0x1C, 0x19]),
    )
    .to_bytes()
    .unwrap()
}

fn notices(actions: &[GatewayAction]) -> Vec<&DeviceNotice> {
    actions
        .iter()
        .filter_map(|a| match a {
            GatewayAction::Notify(notice) => Some(notice),
            _ => None,
        })
        .collect()
}

#[test]
fn clean_connect_and_register() {
    let (mut driver, _env) = gateway(GatewayConfig::default());
    accept(&mut driver, 1, 40001);

    feed(&mut driver, 1, b"89860449162390488297");
    let actions = feed(&mut driver, 1, &register_bytes(0x04A2_6CF3, 1));

    let routed = notices(&actions);
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].physical_id, PhysicalId::new(0x04A2_6CF3));
    assert!(matches!(routed[0].payload, Payload::Register(_)));

    let snapshot = driver.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].physical_id, "04A26CF3");
    assert_eq!(snapshot[0].iccid.as_deref(), Some("89860449162390488297"));
    assert_eq!(snapshot[0].state, SessionState::Registered);
}

#[test]
fn server_time_round_trip() {
    let (mut driver, _env) = gateway(GatewayConfig::default());
    accept(&mut driver, 1, 40002);
    feed(&mut driver, 1, &register_bytes(0x04A2_6CF3, 1));

    let request = DnyFrame::new(PhysicalId::new(0x04A2_6CF3), 0x09D5, 0x22, Bytes::new())
        .to_bytes()
        .unwrap();
    let actions = feed(&mut driver, 1, &request);

    let reply = actions
        .iter()
        .find_map(|a| match a {
            GatewayAction::Send { session_id: 1, bytes } => {
                Some(DnyFrame::decode(bytes).unwrap())
            },
            _ => None,
        })
        .expect("default handler must answer a time request");

    assert_eq!(reply.physical_id, PhysicalId::new(0x04A2_6CF3));
    assert_eq!(reply.message_id, 0x09D5);
    assert_eq!(reply.command, 0x22);
    assert_eq!(&reply.payload[..], &1_750_000_000u32.to_le_bytes());
    assert!(reply.checksum_ok);
}

#[test]
fn checksum_mismatch_is_surfaced_not_dropped() {
    let (mut driver, _env) = gateway(GatewayConfig::default());
    let metrics = driver.metrics();
    accept(&mut driver, 1, 40003);
    feed(&mut driver, 1, &register_bytes(0x04A2_6CF3, 1));

    let mut corrupted = heartbeat_bytes(0x04A2_6CF3, 2).to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;

    let actions = feed(&mut driver, 1, &corrupted);

    // The frame still routes and the session still advances.
    assert_eq!(notices(&actions).len(), 1);
    assert_eq!(metrics.snapshot().frames_bad_checksum, 1);
    assert_eq!(driver.snapshot()[0].state, SessionState::Active);
}

#[test]
fn charge_command_correlation() {
    let (mut driver, _env) = gateway(GatewayConfig::default());
    accept(&mut driver, 1, 40004);
    feed(&mut driver, 1, &register_bytes(0x04A2_28CD, 1));

    let order_no = OrderNo::parse("ORDER_2025061909").unwrap();
    let control = ChargeControl {
        rate_mode: 0,
        balance: 5000,
        port: 0,
        action: ChargeAction::Start,
        value: 120,
        order_no,
        max_minutes: 600,
        over_power: 2200,
        qr_lamp: 1,
        long_charge: 0,
        extra_float_minutes: 0,
        skip_short_check: 0,
        ignore_unplug: 0,
        force_full_stop: 0,
        full_power: 10,
    };

    let mut ticket = driver
        .send_command(
            PhysicalId::new(0x04A2_28CD),
            0x82,
            control.encode(),
            Duration::from_secs(5),
        )
        .unwrap();
    assert_ne!(ticket.message_id, 0);

    // The encoded command goes out on the device's session.
    let sent = ticket
        .actions
        .iter()
        .find_map(|a| match a {
            GatewayAction::Send { session_id: 1, bytes } => {
                Some(DnyFrame::decode(bytes).unwrap())
            },
            _ => None,
        })
        .expect("command must be sent");
    assert_eq!(sent.command, 0x82);
    assert_eq!(sent.message_id, ticket.message_id);
    assert_eq!(ChargeControl::decode(&sent.payload).unwrap(), control);

    // Device acknowledges with {port, 0x00} under the same message id.
    let ack = DnyFrame::new(
        PhysicalId::new(0x04A2_28CD),
        ticket.message_id,
        0x82,
        Bytes::from_static(&[0x00, 0x00]),
    )
    .to_bytes()
    .unwrap();
    feed(&mut driver, 1, &ack);

    let outcome = ticket.receiver.try_recv().unwrap();
    let CommandOutcome::Response(payload) = outcome else {
        unreachable!("ack must resolve the waiter");
    };
    let ack = ChargeControlAck::decode(&payload).unwrap();
    assert!(ack.success());
    assert_eq!(ack.display_port(), 1);
    assert_eq!(order_no.as_str(), "ORDER_2025061909");
}

#[test]
fn reregistration_displaces_and_cancels() {
    let (mut driver, _env) = gateway(GatewayConfig::default());
    let device = PhysicalId::new(0x04A2_28CD);

    accept(&mut driver, 1, 40005);
    feed(&mut driver, 1, b"89860449162390488297");
    feed(&mut driver, 1, &register_bytes(device.raw(), 1));

    let mut ticket = driver
        .send_command(device, 0x81, Bytes::new(), Duration::from_secs(60))
        .unwrap();

    // A second connection announces the same device.
    accept(&mut driver, 2, 40006);
    feed(&mut driver, 2, b"89860449162390488297");
    feed(&mut driver, 2, &register_bytes(device.raw(), 1));

    // The registry now answers with the new session; a fresh command
    // targets it.
    let new_ticket = driver
        .send_command(device, 0x81, Bytes::new(), Duration::from_secs(60))
        .unwrap();
    assert!(new_ticket.actions.iter().any(|a| matches!(
        a,
        GatewayAction::Send { session_id: 2, .. }
    )));

    // Commands tracked against the displaced session cancel on its close.
    assert!(ticket.receiver.try_recv().is_err());
    close(&mut driver, 1);
    assert_eq!(ticket.receiver.try_recv().unwrap(), CommandOutcome::Cancelled);

    let snapshot = driver.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].remote_addr, addr(40006));
}

#[test]
fn idle_sessions_are_evicted() {
    let config = GatewayConfig { idle_timeout: Duration::from_secs(30), ..GatewayConfig::default() };
    let (mut driver, env) = gateway(config);
    let metrics = driver.metrics();

    accept(&mut driver, 1, 40007);
    feed(&mut driver, 1, &register_bytes(0x04A2_6CF3, 1));
    feed(&mut driver, 1, &heartbeat_bytes(0x04A2_6CF3, 2));

    // Quiet but within the threshold: the sweep leaves it alone.
    env.advance(Duration::from_secs(29));
    assert!(driver.process_event(GatewayEvent::Tick).unwrap().is_empty());

    // Past the threshold: the sweep closes it.
    env.advance(Duration::from_secs(2));
    let actions = driver.process_event(GatewayEvent::Tick).unwrap();
    assert!(actions.iter().any(|a| matches!(
        a,
        GatewayAction::Close { session_id: 1, .. }
    )));
    assert_eq!(metrics.snapshot().sessions_evicted, 1);

    // Runtime executes the close; the registry forgets the device.
    close(&mut driver, 1);
    assert!(driver.snapshot().is_empty());
}

#[test]
fn command_deadline_expires_on_tick() {
    let (mut driver, env) = gateway(GatewayConfig::default());
    accept(&mut driver, 1, 40008);
    feed(&mut driver, 1, &register_bytes(0x04A2_6CF3, 1));

    let mut ticket = driver
        .send_command(PhysicalId::new(0x04A2_6CF3), 0x96, Bytes::from_static(&[10]), Duration::from_secs(5))
        .unwrap();

    env.advance(Duration::from_secs(6));
    driver.process_event(GatewayEvent::Tick).unwrap();

    assert_eq!(ticket.receiver.try_recv().unwrap(), CommandOutcome::Timeout);
    assert_eq!(driver.metrics().snapshot().commands_timed_out, 1);
}

#[test]
fn garbage_flood_closes_the_connection() {
    let config = GatewayConfig { garbage_limit: 64, ..GatewayConfig::default() };
    let (mut driver, _env) = gateway(config);
    accept(&mut driver, 1, 40009);

    let actions = feed(&mut driver, 1, &[0xFFu8; 80]);
    assert!(actions.iter().any(|a| matches!(
        a,
        GatewayAction::Close { session_id: 1, .. }
    )));
}

#[test]
fn trickled_bytes_register_like_chunked() {
    let (mut driver, _env) = gateway(GatewayConfig::default());
    accept(&mut driver, 1, 40010);

    let mut stream = Vec::new();
    stream.extend_from_slice(b"89860449162390488297");
    stream.extend_from_slice(b"link");
    stream.extend_from_slice(&register_bytes(0x04A2_6CF3, 1));

    let mut routed = 0;
    for &byte in &stream {
        routed += notices(&feed(&mut driver, 1, &[byte])).len();
    }

    assert_eq!(routed, 1);
    assert_eq!(driver.snapshot()[0].state, SessionState::Registered);
    assert_eq!(driver.metrics().snapshot().link_tokens, 1);
}
