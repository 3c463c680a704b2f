//! Client sync session: position upload, snapshot reconciliation, door replication

use crate::config::ClientConfig;
use crate::peers::RemotePeers;
use crate::world::{apply_door_state, World};
use log::{debug, info, warn};
use shared::{
    decode, encode, local_ip_towards, peer_id, DoorEvent, Message, NetError, PositionReport,
    Snapshot, Vec3, MAX_DATAGRAM_SIZE,
};
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};

/// Pause between polls when no datagram is waiting
const LISTENER_IDLE_SLEEP: Duration = Duration::from_millis(1);
/// Pause after a receive error other than would-block
const LISTENER_ERROR_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Binding the local socket. Only held inside `connect`; a returned
    /// session is always `Active` or `Closed`.
    Connecting,
    /// Socket bound, listener running
    Active,
    /// Socket released; no further traffic
    Closed,
}

pub struct SyncSession {
    /// `None` once the session is closed
    socket: Option<Arc<UdpSocket>>,
    server_addr: SocketAddr,
    local_id: String,
    state: SessionState,
    config: ClientConfig,
    inbox: mpsc::UnboundedReceiver<Message>,
    listener: Option<JoinHandle<()>>,
    peers: RemotePeers,
}

impl SyncSession {
    /// Binds an ephemeral port and starts the listener.
    ///
    /// A `BindFailure` here only means multiplayer is unavailable; the
    /// caller is expected to carry on without a session.
    pub async fn connect(config: ClientConfig) -> Result<Self, NetError> {
        config.validate()?;
        let server_addr = config.server_addr;
        let mut state = SessionState::Connecting;
        debug!("Session {:?} to {}", state, server_addr);

        let bind_addr = match server_addr {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| NetError::BindFailure {
                addr: bind_addr.to_string(),
                source,
            })?;

        let local_port = socket.local_addr()?.port();
        let local_id = peer_id(SocketAddr::new(local_ip_towards(server_addr), local_port));
        info!("Local ID = {}", local_id);

        let socket = Arc::new(socket);
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let listener = spawn_listener(Arc::clone(&socket), inbox_tx);

        state = SessionState::Active;
        debug!("Session {:?}", state);

        Ok(SyncSession {
            socket: Some(socket),
            server_addr,
            peers: RemotePeers::new(local_id.clone()),
            local_id,
            state,
            config,
            inbox,
            listener: Some(listener),
        })
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        let socket = self.socket.as_ref().ok_or(NetError::SessionClosed)?;
        Ok(socket.local_addr()?)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peers(&self) -> &RemotePeers {
        &self.peers
    }

    /// Id and render position of every remote peer, for the renderer.
    pub fn remote_peers(&self) -> impl Iterator<Item = (&str, Vec3)> + '_ {
        self.peers.render_positions()
    }

    /// Interval firing at the configured update period.
    pub fn ticker(&self) -> Interval {
        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    async fn send_message(&self, message: &Message) -> Result<(), NetError> {
        let socket = match &self.socket {
            Some(socket) if self.state == SessionState::Active => socket,
            _ => {
                debug!("Session closed, not sending {}", message.kind());
                return Ok(());
            }
        };

        let data = encode(message)?;
        socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Tells the server a door changed. `state` is the door's final state.
    pub async fn send_door_toggle(&self, door_id: u32, state: bool) -> Result<(), NetError> {
        self.send_message(&Message::DoorToggle(DoorEvent { door_id, state }))
            .await
    }

    /// Asks the server to drop every peer with this display name.
    pub async fn send_remove_player(&self, name: &str) -> Result<(), NetError> {
        self.send_message(&Message::RemovePlayer {
            player: name.to_string(),
        })
        .await
    }

    async fn send_position(&self, position: Vec3) {
        let mut report = PositionReport::new(Some(self.local_id.clone()), position);
        report.player = self.config.display_name.clone();
        report.model = self.config.model_tag.clone();

        if let Err(e) = self.send_message(&Message::Pos(report)).await {
            warn!("Send error: {}", e);
        }
    }

    /// One update cycle: upload the local position, apply everything
    /// received since the last tick, interpolate, and drop silent peers.
    pub async fn tick<W: World + ?Sized>(&mut self, now: Instant, world: &mut W) {
        if self.state != SessionState::Active {
            return;
        }

        self.send_position(world.local_position()).await;
        self.drain_inbox(now, world);
        self.peers.interpolate(self.config.blend);

        for id in self.peers.evict_stale(now, self.config.peer_timeout) {
            info!("Player timed out: {}", id);
            world.peer_left(&id);
        }
    }

    fn drain_inbox<W: World + ?Sized>(&mut self, now: Instant, world: &mut W) {
        while let Ok(message) = self.inbox.try_recv() {
            match message {
                Message::Players(snapshot) => self.apply_snapshot(snapshot, now, world),
                Message::DoorSync(event) | Message::DoorToggle(event) => {
                    apply_door(world, event.door_id, event.state)
                }
                other => warn!("Unexpected {} message from server", other.kind()),
            }
        }
    }

    fn apply_snapshot<W: World + ?Sized>(&mut self, snapshot: Snapshot, now: Instant, world: &mut W) {
        let changes = self.peers.apply_snapshot(&snapshot.players, now);

        for id in &changes.joined {
            if let Some(peer) = self.peers.get(id) {
                info!("New player connected: {} ({})", id, peer.display_name);
                world.peer_joined(id, &peer.model_tag, peer.render_position);
            }
        }
        for id in &changes.left {
            info!("Player disconnected: {}", id);
            world.peer_left(id);
        }

        for (door_id, open) in snapshot.doors {
            apply_door(world, door_id, open);
        }
    }

    /// Stops the listener and releases the socket; later sends and ticks do
    /// nothing. Idempotent.
    ///
    /// The port is free once the aborted listener has been dropped by the
    /// runtime, which happens at its next scheduling point.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.inbox.close();
        self.socket = None;
        self.state = SessionState::Closed;
        info!("Session closed");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

fn apply_door<W: World + ?Sized>(world: &mut W, door_id: u32, open: bool) {
    match apply_door_state(world, door_id, open) {
        Ok(true) => info!(
            "Door {} {}",
            door_id,
            if open { "opened" } else { "closed" }
        ),
        Ok(false) => {}
        Err(e) => warn!("Door sync skipped: {}", e),
    }
}

/// Polls the socket without blocking and forwards decoded messages to the
/// update cycle. Exits when the session drops its end of the inbox.
fn spawn_listener(socket: Arc<UdpSocket>, inbox: mpsc::UnboundedSender<Message>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            match socket.try_recv_from(&mut buffer) {
                Ok((len, addr)) => match decode(&buffer[..len]) {
                    Ok(message) => {
                        if inbox.send(message).is_err() {
                            debug!("Inbox closed, listener stopping");
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if inbox.is_closed() {
                        break;
                    }
                    sleep(LISTENER_IDLE_SLEEP).await;
                }
                Err(e) => {
                    warn!("Listener error: {}", e);
                    sleep(LISTENER_ERROR_BACKOFF).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxWorld;
    use shared::PlayerEntry;
    use std::collections::BTreeMap;
    use tokio::time::timeout;
    use tokio_test::assert_ok;

    async fn fake_server() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn connect_to(server_addr: SocketAddr) -> SyncSession {
        SyncSession::connect(ClientConfig {
            server_addr,
            display_name: Some("Tester".to_string()),
            ..ClientConfig::default()
        })
        .await
        .unwrap()
    }

    async fn recv_message(socket: &UdpSocket) -> (Message, SocketAddr) {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let (len, addr) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("timed out waiting for datagram")
            .unwrap();
        (decode(&buffer[..len]).unwrap(), addr)
    }

    async fn push(server: &UdpSocket, to: SocketAddr, message: &Message) {
        server.send_to(&encode(message).unwrap(), to).await.unwrap();
    }

    /// Ticks until `done` holds or two seconds pass.
    async fn tick_until<F>(session: &mut SyncSession, world: &mut SandboxWorld, done: F)
    where
        F: Fn(&SyncSession, &SandboxWorld) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done(session, world) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            session.tick(Instant::now(), world).await;
            sleep(Duration::from_millis(5)).await;
        }
    }

    fn snapshot_with(players: Vec<PlayerEntry>, doors: &[(u32, bool)]) -> Message {
        Message::Players(Snapshot {
            players,
            doors: doors.iter().copied().collect::<BTreeMap<_, _>>(),
        })
    }

    fn player(id: &str, x: f32) -> PlayerEntry {
        PlayerEntry {
            id: id.to_string(),
            player: "Remote".to_string(),
            model: "default".to_string(),
            x,
            y: 0.0,
            z: 0.0,
        }
    }

    #[tokio::test]
    async fn test_connect_derives_local_id_from_route_and_port() {
        let (_server, server_addr) = fake_server().await;
        let session = connect_to(server_addr).await;

        let port = session.local_addr().unwrap().port();
        assert_eq!(session.local_id(), format!("127.0.0.1:{}", port));
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_tick_sends_position_with_identity() {
        let (server, server_addr) = fake_server().await;
        let mut session = connect_to(server_addr).await;
        let mut world = SandboxWorld::new(1);
        world.set_position(Vec3::new(1.0, 2.0, 3.0));

        session.tick(Instant::now(), &mut world).await;

        let (message, from) = recv_message(&server).await;
        assert_eq!(from.port(), session.local_addr().unwrap().port());
        match message {
            Message::Pos(report) => {
                assert_eq!(report.id.as_deref(), Some(session.local_id()));
                assert_eq!(report.player.as_deref(), Some("Tester"));
                assert_eq!(report.position(), Vec3::new(1.0, 2.0, 3.0));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_snapshot_creates_remote_peer_and_loads_model() {
        let (server, server_addr) = fake_server().await;
        let mut session = connect_to(server_addr).await;
        let mut world = SandboxWorld::new(1);
        let client_addr = session.local_addr().unwrap();
        let own_id = session.local_id().to_string();

        push(
            &server,
            SocketAddr::new(server_addr.ip(), client_addr.port()),
            &snapshot_with(vec![player(&own_id, 0.0), player("10.0.0.9:4000", 4.0)], &[]),
        )
        .await;

        tick_until(&mut session, &mut world, |s, _| s.peers().len() == 1).await;

        assert!(world.has_model("10.0.0.9:4000"));
        assert!(!world.has_model(&own_id));
        let positions: Vec<_> = session.remote_peers().collect();
        assert_eq!(positions, vec![("10.0.0.9:4000", Vec3::new(4.0, 0.0, 0.0))]);
    }

    #[tokio::test]
    async fn test_door_sync_opens_local_door() {
        let (server, server_addr) = fake_server().await;
        let mut session = connect_to(server_addr).await;
        let mut world = SandboxWorld::with_default_doors(1);
        let client_port = session.local_addr().unwrap().port();

        push(
            &server,
            SocketAddr::new(server_addr.ip(), client_port),
            &Message::DoorSync(DoorEvent {
                door_id: 2,
                state: true,
            }),
        )
        .await;

        tick_until(&mut session, &mut world, |_, w| w.door(2).unwrap().open).await;
    }

    #[tokio::test]
    async fn test_snapshot_doors_applied_and_unknown_ignored() {
        let (server, server_addr) = fake_server().await;
        let mut session = connect_to(server_addr).await;
        let mut world = SandboxWorld::with_default_doors(1);
        let client_port = session.local_addr().unwrap().port();

        push(
            &server,
            SocketAddr::new(server_addr.ip(), client_port),
            &snapshot_with(vec![], &[(1, true), (99, true)]),
        )
        .await;

        tick_until(&mut session, &mut world, |_, w| w.door(1).unwrap().open).await;
        assert!(world.door(99).is_none());
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_malformed_datagram_does_not_stop_listener() {
        let (server, server_addr) = fake_server().await;
        let mut session = connect_to(server_addr).await;
        let mut world = SandboxWorld::with_default_doors(1);
        let to = SocketAddr::new(server_addr.ip(), session.local_addr().unwrap().port());

        server.send_to(b"{{{ nope", to).await.unwrap();
        push(
            &server,
            to,
            &Message::DoorSync(DoorEvent {
                door_id: 3,
                state: true,
            }),
        )
        .await;

        tick_until(&mut session, &mut world, |_, w| w.door(3).unwrap().open).await;
    }

    #[tokio::test]
    async fn test_silent_peer_times_out_locally() {
        let (server, server_addr) = fake_server().await;
        let mut session = SyncSession::connect(ClientConfig {
            server_addr,
            peer_timeout: Duration::from_millis(100),
            ..ClientConfig::default()
        })
        .await
        .unwrap();
        let mut world = SandboxWorld::new(1);
        let to = SocketAddr::new(server_addr.ip(), session.local_addr().unwrap().port());

        push(&server, to, &snapshot_with(vec![player("10.0.0.9:4000", 0.0)], &[])).await;
        tick_until(&mut session, &mut world, |s, _| s.peers().len() == 1).await;

        let later = Instant::now() + Duration::from_millis(150);
        session.tick(later, &mut world).await;

        assert!(session.peers().is_empty());
        assert!(!world.has_model("10.0.0.9:4000"));
    }

    #[tokio::test]
    async fn test_send_door_toggle() {
        let (server, server_addr) = fake_server().await;
        let session = connect_to(server_addr).await;

        assert_ok!(session.send_door_toggle(7, true).await);

        let (message, _) = recv_message(&server).await;
        assert_eq!(
            message,
            Message::DoorToggle(DoorEvent {
                door_id: 7,
                state: true
            })
        );
    }

    #[tokio::test]
    async fn test_send_remove_player() {
        let (server, server_addr) = fake_server().await;
        let session = connect_to(server_addr).await;

        assert_ok!(session.send_remove_player("Tester").await);

        let (message, _) = recv_message(&server).await;
        assert_eq!(
            message,
            Message::RemovePlayer {
                player: "Tester".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_closed_session_is_inert() {
        let (server, server_addr) = fake_server().await;
        let mut session = connect_to(server_addr).await;
        let mut world = SandboxWorld::new(1);

        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);

        session.tick(Instant::now(), &mut world).await;
        assert_ok!(session.send_door_toggle(1, true).await);

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let received = timeout(Duration::from_millis(100), server.recv_from(&mut buffer)).await;
        assert!(received.is_err(), "closed session must not send");
    }

    #[tokio::test]
    async fn test_close_releases_port() {
        let (_server, server_addr) = fake_server().await;
        let mut session = connect_to(server_addr).await;
        let port = session.local_addr().unwrap().port();

        session.close();
        assert!(matches!(session.local_addr(), Err(NetError::SessionClosed)));

        // Let the runtime drop the aborted listener and its socket handle
        sleep(Duration::from_millis(50)).await;

        let rebound = std::net::UdpSocket::bind(("0.0.0.0", port));
        assert!(rebound.is_ok(), "port still bound after close: {:?}", rebound.err());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = SyncSession::connect(ClientConfig {
            blend: 2.0,
            ..ClientConfig::default()
        })
        .await;
        assert!(matches!(result, Err(NetError::InvalidConfig(_))));
    }
}
