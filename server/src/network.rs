//! Server network layer: datagram dispatch, broadcasting and the liveness sweep

use crate::config::ServerConfig;
use crate::doors::DoorTable;
use crate::registry::ClientRegistry;
use log::{debug, error, info, warn};
use shared::{decode, encode, peer_id, Message, NetError, Snapshot, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Registry and door table behind one lock, so a snapshot is a single
/// consistent read of both.
#[derive(Debug, Default)]
pub struct SharedState {
    pub registry: ClientRegistry,
    pub doors: DoorTable,
}

impl SharedState {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            players: self.registry.snapshot(),
            doors: self.doors.snapshot_all(),
        }
    }
}

/// Authoritative sync server
#[derive(Debug)]
pub struct Server {
    socket: Arc<UdpSocket>,
    state: Arc<RwLock<SharedState>>,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, NetError> {
        let addr = config.bind_address();
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| NetError::BindFailure {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket: Arc::new(socket),
            state: Arc::new(RwLock::new(SharedState::default())),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn state(&self) -> Arc<RwLock<SharedState>> {
        Arc::clone(&self.state)
    }

    /// Spawns the periodic eviction task.
    ///
    /// Holds only a weak reference to the state and stops once the server
    /// is dropped.
    fn spawn_liveness_sweep(&self) -> JoinHandle<()> {
        let state = Arc::downgrade(&self.state);
        let period = self.config.sweep_interval;
        let timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // Skip the first tick since it fires immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(state) = state.upgrade() else {
                    debug!("Liveness sweep stopping, server dropped");
                    break;
                };

                let evicted = state
                    .write()
                    .await
                    .registry
                    .evict_stale(Instant::now(), timeout);
                if !evicted.is_empty() {
                    debug!("Liveness sweep evicted {} peer(s)", evicted.len());
                }
            }
        })
    }

    /// Sends one message to every known peer.
    ///
    /// A failed send removes only that peer; the rest still get the message.
    async fn broadcast(&self, message: &Message) {
        let data = match encode(message) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode {} message: {}", message.kind(), e);
                return;
            }
        };
        if exceeds_receive_buffer(&data) {
            warn!(
                "{} message is {} bytes, over the {}-byte receive buffer; peers will drop it",
                message.kind(),
                data.len(),
                MAX_DATAGRAM_SIZE
            );
        }

        let addrs = {
            let state = self.state.read().await;
            state.registry.addresses()
        };

        let mut unreachable = Vec::new();
        for addr in addrs {
            if let Err(source) = self.socket.send_to(&data, addr).await {
                warn!("{}, removing", NetError::Unreachable { addr, source });
                unreachable.push(addr);
            }
        }

        if !unreachable.is_empty() {
            let mut state = self.state.write().await;
            for addr in &unreachable {
                state.registry.remove(addr);
            }
        }
    }

    /// Evicts stale peers, then broadcasts registry and doors as one snapshot.
    async fn broadcast_snapshot(&self) {
        let snapshot = {
            let mut state = self.state.write().await;
            state
                .registry
                .evict_stale(Instant::now(), self.config.client_timeout);
            state.snapshot()
        };

        self.broadcast(&Message::Players(snapshot)).await;
    }

    /// Applies one inbound datagram. Never fails: bad input is logged and dropped.
    pub async fn handle_datagram(&self, bytes: &[u8], addr: SocketAddr) {
        let message = match decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping datagram from {}: {}", addr, e);
                return;
            }
        };

        match message {
            Message::DoorToggle(event) => {
                let previous = {
                    let mut state = self.state.write().await;
                    state.doors.set_state(event.door_id, event.state)
                };
                info!(
                    "Door {} set to {} by {} (was {:?})",
                    event.door_id,
                    if event.state { "open" } else { "closed" },
                    peer_id(addr),
                    previous
                );

                // Door changes skip the snapshot cycle
                self.broadcast(&Message::DoorSync(event)).await;
                return;
            }

            Message::Pos(report) => {
                let position = report.position();
                let mut state = self.state.write().await;
                state.registry.record_position(
                    addr,
                    position,
                    report.player,
                    report.model,
                    Instant::now(),
                );
            }

            Message::RemovePlayer { player } => {
                let removed = {
                    let mut state = self.state.write().await;
                    state.registry.remove_by_display_name(&player)
                };
                if removed > 0 {
                    return;
                }
                debug!("Removal request for unknown player {:?} from {}", player, addr);
            }

            other => {
                warn!(
                    "Unexpected {} message from {}, dropping",
                    other.kind(),
                    addr
                );
                return;
            }
        }

        self.broadcast_snapshot().await;
    }

    /// Runs the receive loop. Receive errors are logged and retried, so this
    /// only returns when the task is cancelled.
    ///
    /// The liveness sweep runs alongside it as a separate task.
    pub async fn run(&self) -> Result<(), NetError> {
        let _sweep = self.spawn_liveness_sweep();
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        info!("Server started successfully");

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => {
                    self.handle_datagram(&buffer[..len], addr).await;
                }
                Err(e) => {
                    error!("Error receiving datagram: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Receivers read into a `MAX_DATAGRAM_SIZE` buffer and truncate anything longer.
fn exceeds_receive_buffer(data: &[u8]) -> bool {
    data.len() > MAX_DATAGRAM_SIZE
}
