//! Production DNY gateway server.
//!
//! Wraps the Sans-IO [`GatewayDriver`] with real I/O: a tokio TCP accept
//! loop, one reader task and one bounded writer channel per connection,
//! and a periodic sweep ticker. The driver sits behind a single async
//! mutex; reader tasks feed it events and execute the actions it returns.
//!
//! Business code gets two surfaces:
//!
//! - a stream of [`DeviceNotice`]s (every decoded inbound frame), taken
//!   once via [`Gateway::take_notices`]
//! - a cloneable [`GatewayHandle`] for addressing devices:
//!   [`GatewayHandle::send_command`], snapshots, metrics, session close
//!
//! No component other than a connection's writer task ever writes to its
//! socket.

#![forbid(unsafe_code)]

mod error;
mod system_env;
mod transport;

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{Mutex, Notify, RwLock, mpsc},
};

use dny_core::{
    CommandOutcome, DeviceNotice, DeviceSnapshot, Environment, GatewayAction, GatewayConfig,
    GatewayDriver, GatewayEvent, GatewayMetrics, MetricsSnapshot,
};
use dny_proto::PhysicalId;

pub use error::{CommandError, ServerError};
pub use system_env::SystemEnv;
pub use transport::TcpTransport;

/// Runtime configuration for the production gateway.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Address to bind to (e.g. `"0.0.0.0:7054"`)
    pub bind_address: String,
    /// Per-read deadline; `None` leaves eviction to the idle sweep
    pub read_deadline: Option<Duration>,
    /// Per-write deadline; a peer that stops draining is dropped
    pub write_deadline: Option<Duration>,
    /// How often the idle/deadline sweep runs
    pub sweep_interval: Duration,
    /// Bounded depth of each connection's outbound queue
    pub send_queue_depth: usize,
    /// Bounded depth of the northbound notice channel
    pub notice_queue_depth: usize,
    /// Driver configuration (timeouts, limits)
    pub driver: GatewayConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7054".to_string(),
            read_deadline: None,
            write_deadline: Some(Duration::from_secs(30)),
            sweep_interval: Duration::from_secs(30),
            send_queue_depth: 32,
            notice_queue_depth: 1024,
            driver: GatewayConfig::default(),
        }
    }
}

/// Per-connection outbound handle: the writer queue plus the signal that
/// tells the reader task to stop.
struct Outbound {
    tx: mpsc::Sender<Bytes>,
    closer: Arc<Notify>,
}

/// State shared by the accept loop, connection tasks and handles.
struct Shared {
    driver: Mutex<GatewayDriver<SystemEnv>>,
    outbound: RwLock<HashMap<u64, Outbound>>,
    notices: mpsc::Sender<DeviceNotice>,
    metrics: Arc<GatewayMetrics>,
    config: RuntimeConfig,
}

/// Production DNY gateway.
pub struct Gateway {
    transport: TcpTransport,
    shared: Arc<Shared>,
    env: SystemEnv,
    notice_rx: Option<mpsc::Receiver<DeviceNotice>>,
}

impl Gateway {
    /// Create and bind a gateway.
    pub async fn bind(config: RuntimeConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();
        let driver = GatewayDriver::new(env.clone(), config.driver.clone());
        let metrics = driver.metrics();
        let transport = TcpTransport::bind(&config.bind_address).await?;
        let (notice_tx, notice_rx) = mpsc::channel(config.notice_queue_depth);

        let shared = Arc::new(Shared {
            driver: Mutex::new(driver),
            outbound: RwLock::new(HashMap::new()),
            notices: notice_tx,
            metrics,
            config,
        });

        Ok(Self { transport, shared, env, notice_rx: Some(notice_rx) })
    }

    /// The northbound stream of decoded device frames. Can be taken once.
    pub fn take_notices(&mut self) -> Option<mpsc::Receiver<DeviceNotice>> {
        self.notice_rx.take()
    }

    /// Cloneable handle for business code.
    #[must_use]
    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle { shared: Arc::clone(&self.shared) }
    }

    /// Local address the gateway is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run the gateway: sweep ticker plus the accept loop.
    ///
    /// Runs until the process is stopped or the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("gateway listening on {}", self.local_addr()?);

        let sweep_shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_shared.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let actions = {
                    let mut driver = sweep_shared.driver.lock().await;
                    driver.process_event(GatewayEvent::Tick)
                };
                match actions {
                    Ok(actions) => execute_actions(&sweep_shared, actions).await,
                    Err(error) => tracing::error!(%error, "sweep tick failed"),
                }
            }
        });

        loop {
            match self.transport.accept().await {
                Ok((stream, peer)) => {
                    let shared = Arc::clone(&self.shared);
                    let session_id = self.env.random_u64();

                    tokio::spawn(async move {
                        handle_connection(stream, peer, session_id, shared).await;
                    });
                },
                Err(error) => {
                    tracing::error!(%error, "accept failed");
                },
            }
        }
    }
}

/// Business-side handle: command sending and observability.
#[derive(Clone)]
pub struct GatewayHandle {
    shared: Arc<Shared>,
}

impl GatewayHandle {
    /// Send a command to a device and await its response payload.
    ///
    /// The correlator tracks the command before the bytes reach the
    /// writer, so the response cannot race its own waiter. The returned
    /// payload is the device's raw response; callers decode it with the
    /// record types in `dny_proto::payloads`.
    pub async fn send_command(
        &self,
        physical_id: PhysicalId,
        command: u8,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, CommandError> {
        let ticket = {
            let mut driver = self.shared.driver.lock().await;
            driver.send_command(physical_id, command, payload, timeout)?
        };
        execute_actions(&self.shared, ticket.actions).await;

        match tokio::time::timeout(timeout, ticket.receiver).await {
            Ok(Ok(CommandOutcome::Response(bytes))) => Ok(bytes),
            Ok(Ok(CommandOutcome::Timeout)) | Err(_) => Err(CommandError::Timeout),
            Ok(Ok(CommandOutcome::Cancelled)) => Err(CommandError::Cancelled),
            Ok(Err(_)) => Err(CommandError::ConnectionLost),
        }
    }

    /// Current registry snapshot.
    pub async fn snapshot(&self) -> Vec<DeviceSnapshot> {
        self.shared.driver.lock().await.snapshot()
    }

    /// Current counter values.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Live connection count.
    pub async fn connection_count(&self) -> usize {
        self.shared.driver.lock().await.connection_count()
    }

    /// Force a session closed. Returns `false` if it was already gone.
    pub async fn close_session(&self, session_id: u64) -> bool {
        close_connection(&self.shared, session_id, "closed by operator").await
    }
}

/// Serve one device connection until EOF, error, or eviction.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    session_id: u64,
    shared: Arc<Shared>,
) {
    let (mut read_half, mut write_half) = stream.into_split();

    let (tx, mut rx) = mpsc::channel::<Bytes>(shared.config.send_queue_depth);
    let closer = Arc::new(Notify::new());
    {
        let mut outbound = shared.outbound.write().await;
        outbound.insert(session_id, Outbound { tx, closer: Arc::clone(&closer) });
    }

    // Writer half: the only place this socket is written. Draining the
    // queue after the senders drop is the bounded close-flush.
    let write_deadline = shared.config.write_deadline;
    let writer = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            let write = write_half.write_all(&bytes);
            let result = match write_deadline {
                Some(deadline) => match tokio::time::timeout(deadline, write).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(session_id, "write deadline exceeded, dropping peer");
                        break;
                    },
                },
                None => write.await,
            };
            if let Err(error) = result {
                tracing::debug!(session_id, %error, "write failed");
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    {
        let actions = {
            let mut driver = shared.driver.lock().await;
            driver.process_event(GatewayEvent::Accepted { session_id, remote_addr: peer })
        };
        match actions {
            Ok(actions) => execute_actions(&shared, actions).await,
            Err(error) => tracing::error!(session_id, %error, "accept event failed"),
        }
    }

    let read_deadline = shared.config.read_deadline;
    let mut buf = BytesMut::with_capacity(8192);
    let reason = loop {
        tokio::select! {
            () = closer.notified() => break "evicted",
            result = read_with_deadline(&mut read_half, &mut buf, read_deadline) => match result {
                Ok(0) => break "peer closed",
                Ok(_) => {
                    let bytes = buf.split().freeze();
                    let actions = {
                        let mut driver = shared.driver.lock().await;
                        driver.process_event(GatewayEvent::Bytes { session_id, bytes })
                    };
                    match actions {
                        Ok(actions) => execute_actions(&shared, actions).await,
                        Err(error) => {
                            tracing::error!(session_id, %error, "byte event failed");
                            break "driver error";
                        },
                    }
                },
                Err(error) => {
                    tracing::debug!(session_id, %error, "read failed");
                    break "read error";
                },
            },
        }
    };

    close_connection(&shared, session_id, reason).await;
    let _ = writer.await;

    let actions = {
        let mut driver = shared.driver.lock().await;
        driver.process_event(GatewayEvent::Closed { session_id, reason: reason.to_string() })
    };
    match actions {
        Ok(actions) => execute_actions(&shared, actions).await,
        Err(error) => tracing::error!(session_id, %error, "close event failed"),
    }
}

/// One socket read, optionally bounded by the configured deadline.
async fn read_with_deadline(
    read_half: &mut tokio::net::tcp::OwnedReadHalf,
    buf: &mut BytesMut,
    deadline: Option<Duration>,
) -> std::io::Result<usize> {
    match deadline {
        Some(deadline) => match tokio::time::timeout(deadline, read_half.read_buf(buf)).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "read deadline")),
        },
        None => read_half.read_buf(buf).await,
    }
}

/// Drop a connection's outbound handle and wake its reader.
///
/// Returns `false` when the connection was already torn down.
async fn close_connection(shared: &Shared, session_id: u64, reason: &str) -> bool {
    let removed = {
        let mut outbound = shared.outbound.write().await;
        outbound.remove(&session_id)
    };
    match removed {
        Some(entry) => {
            tracing::info!(session_id, reason, "closing connection");
            entry.closer.notify_one();
            true
        },
        None => false,
    }
}

/// Execute driver actions against the real sockets and channels.
async fn execute_actions(shared: &Shared, actions: Vec<GatewayAction>) {
    for action in actions {
        match action {
            GatewayAction::Send { session_id, bytes } => {
                let tx = {
                    let outbound = shared.outbound.read().await;
                    outbound.get(&session_id).map(|o| o.tx.clone())
                };
                match tx {
                    Some(tx) => {
                        // Bounded queue: a slow peer backpressures only the
                        // task producing for it.
                        if tx.send(bytes).await.is_err() {
                            tracing::debug!(session_id, "send after writer shutdown");
                        }
                    },
                    None => {
                        tracing::debug!(session_id, "send to unknown session dropped");
                    },
                }
            },

            GatewayAction::Close { session_id, reason } => {
                close_connection(shared, session_id, &reason).await;
            },

            GatewayAction::Notify(notice) => {
                // A stalled business consumer must not stall the gateway.
                if let Err(error) = shared.notices.try_send(notice) {
                    tracing::warn!(%error, "device notice dropped");
                }
            },
        }
    }
}
