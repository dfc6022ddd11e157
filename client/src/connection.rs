//! Session lifecycle with the arena server
//!
//! This module owns the single live session of the process:
//! - UDP socket setup and the connect handshake
//! - A receiver task routing inbound packets to the dispatcher and sender
//! - The done signal, raised once when the session ends for any reason
//! - Turn handler registration and graceful stop
//!
//! The session ends when the server says goodbye, when it goes silent for
//! longer than the configured server timeout, when the socket reports the
//! peer as gone, or when [`Session::stop`] is called.

use crate::config::{PlayerConfig, PlayerIdentity, TimingConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{ConnectionError, RegisterError, ShutdownError};
use crate::policy::DecisionPolicy;
use crate::sender::{OrderAck, UdpOrderSender};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, Snapshot, PROTOCOL_VERSION};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Largest payload a single UDP datagram can carry
const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Marked done exactly once, when the session ends. Cheap to clone; every
/// clone observes the same transition.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    rx: watch::Receiver<bool>,
}

impl DoneSignal {
    pub fn is_done(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the session is over. A dropped session counts as over.
    pub async fn done(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub(crate) fn done_channel() -> (watch::Sender<bool>, DoneSignal) {
    let (tx, rx) = watch::channel(false);
    (tx, DoneSignal { rx })
}

/// Inbound queues filled by the receiver task, handed over on registration
struct Inbound {
    snapshots: mpsc::UnboundedReceiver<Snapshot>,
    acks: mpsc::UnboundedReceiver<OrderAck>,
}

pub struct Session {
    identity: PlayerIdentity,
    socket: Arc<UdpSocket>,
    timing: TimingConfig,
    done_tx: Arc<watch::Sender<bool>>,
    inbound: Option<Inbound>,
    receiver: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
    stopped: AtomicBool,
}

/// Opens a session: resolves the server, performs the handshake and starts
/// routing inbound packets. Returns the session's done signal with it.
pub async fn connect(config: &PlayerConfig) -> Result<(DoneSignal, Session), ConnectionError> {
    config
        .validate()
        .map_err(|e| ConnectionError::InvalidIdentity(e.to_string()))?;

    let identity = config.identity();
    let timing = config.timing;

    let resolve_error = |source| ConnectionError::Resolve {
        address: config.server_address.clone(),
        source,
    };
    let server_addr = tokio::net::lookup_host(&config.server_address)
        .await
        .map_err(resolve_error)?
        .next()
        .ok_or_else(|| {
            resolve_error(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses found",
            ))
        })?;

    let bind_addr = if server_addr.is_ipv6() {
        "[::]:0"
    } else {
        "0.0.0.0:0"
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server_addr).await?;

    info!(
        "Connecting to {} as {} #{} from {:?}",
        server_addr, identity.team_side, identity.number, identity.initial_position
    );

    let hello = Packet::Connect {
        client_version: PROTOCOL_VERSION,
        team_side: identity.team_side,
        number: identity.number,
        initial_position: identity.initial_position,
    };
    socket.send(&serialize(&hello)?).await?;

    let turn = timeout(timing.handshake_timeout(), await_welcome(&socket))
        .await
        .map_err(|_| ConnectionError::HandshakeTimeout(timing.handshake_timeout()))??;

    info!("Connected to {} at turn {}", server_addr, turn);

    let socket = Arc::new(socket);
    let (done_tx, done) = done_channel();
    let done_tx = Arc::new(done_tx);
    let (snapshot_tx, snapshots) = mpsc::unbounded_channel();
    let (ack_tx, acks) = mpsc::unbounded_channel();

    let receiver = tokio::spawn(receive_loop(
        Arc::clone(&socket),
        snapshot_tx,
        ack_tx,
        Arc::clone(&done_tx),
        done.clone(),
        timing.server_timeout(),
    ));

    let session = Session {
        identity,
        socket,
        timing,
        done_tx,
        inbound: Some(Inbound { snapshots, acks }),
        receiver: Some(receiver),
        dispatcher: None,
        stopped: AtomicBool::new(false),
    };

    Ok((done, session))
}

/// Waits for the server's verdict on our `Connect`, skipping anything else.
async fn await_welcome(socket: &UdpSocket) -> Result<u32, ConnectionError> {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let len = socket.recv(&mut buffer).await?;

        match deserialize::<Packet>(&buffer[..len]) {
            Ok(Packet::Connected { turn }) => return Ok(turn),
            Ok(Packet::Disconnected { reason }) => {
                return Err(ConnectionError::Rejected { reason });
            }
            Ok(_) => debug!("Ignoring packet received before the handshake completed"),
            Err(e) => warn!("Failed to deserialize handshake packet: {}", e),
        }
    }
}

fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

/// Routes inbound packets until the session ends, then raises the done signal.
async fn receive_loop(
    socket: Arc<UdpSocket>,
    snapshot_tx: mpsc::UnboundedSender<Snapshot>,
    ack_tx: mpsc::UnboundedSender<OrderAck>,
    done_tx: Arc<watch::Sender<bool>>,
    mut done: DoneSignal,
    server_timeout: Duration,
) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let received = tokio::select! {
            biased;
            _ = done.done() => break,
            received = timeout(server_timeout, socket.recv(&mut buffer)) => received,
        };

        let len = match received {
            Ok(Ok(len)) => len,
            Ok(Err(e)) if is_peer_gone(&e) => {
                warn!("Server connection lost: {}", e);
                break;
            }
            Ok(Err(e)) => {
                error!("Error receiving packet: {}", e);
                sleep(Duration::from_millis(10)).await;
                continue;
            }
            Err(_) => {
                warn!("No packet from the server for {:?}, ending session", server_timeout);
                break;
            }
        };

        match deserialize::<Packet>(&buffer[..len]) {
            Ok(Packet::GameSnapshot { snapshot }) => {
                if snapshot_tx.send(snapshot).is_err() {
                    debug!("Snapshot queue closed, dropping snapshot");
                }
            }
            Ok(Packet::OrderAck { turn, response }) => {
                if ack_tx.send(OrderAck { turn, response }).is_err() {
                    debug!("Acknowledgement queue closed, dropping verdict for turn {}", turn);
                }
            }
            Ok(Packet::Disconnected { reason }) => {
                info!("Server ended the session: {}", reason);
                break;
            }
            Ok(_) => warn!("Unexpected packet type from server"),
            Err(e) => warn!("Failed to deserialize packet: {}", e),
        }
    }

    done_tx.send_replace(true);
}

impl Session {
    pub fn identity(&self) -> PlayerIdentity {
        self.identity
    }

    pub fn done_signal(&self) -> DoneSignal {
        DoneSignal {
            rx: self.done_tx.subscribe(),
        }
    }

    /// Registers the turn handler and starts the dispatch loop. Only one
    /// handler may be registered per session; a second call is refused and
    /// the first handler keeps running.
    pub fn on_new_turn<P>(&mut self, policy: P) -> Result<(), RegisterError>
    where
        P: DecisionPolicy + 'static,
    {
        let inbound = self.inbound.take().ok_or(RegisterError::AlreadyRegistered)?;

        let sender = UdpOrderSender::new(
            Arc::clone(&self.socket),
            inbound.acks,
            self.timing.ack_timeout(),
        );
        let dispatcher = Dispatcher::new(
            policy,
            inbound.snapshots,
            sender,
            self.done_signal(),
            self.timing.turn_deadline(),
        );

        self.dispatcher = Some(tokio::spawn(dispatcher.run()));
        Ok(())
    }

    /// Says goodbye to the server and ends the session. Only the first call
    /// does anything. The done signal is raised even when the goodbye cannot
    /// be delivered.
    pub async fn stop(&self) -> Result<(), ShutdownError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let result = if self.done_signal().is_done() {
            Ok(())
        } else {
            self.send_goodbye().await
        };

        self.done_tx.send_replace(true);
        info!("Session stopped");
        result
    }

    async fn send_goodbye(&self) -> Result<(), ShutdownError> {
        let data = serialize(&Packet::Disconnect)?;
        self.socket.send(&data).await?;
        Ok(())
    }

    /// Waits for the receiver and dispatch tasks to wind down.
    pub async fn join(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(e) = dispatcher.await {
                error!("Dispatcher task failed: {}", e);
            }
        }
        if let Some(receiver) = self.receiver.take() {
            if let Err(e) = receiver.await {
                error!("Receiver task failed: {}", e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.done_tx.send_replace(true);
    }
}
