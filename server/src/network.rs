//! Server network layer: UDP transport, handshake and command intake

use crate::client_manager::ClientManager;
use crate::commands::CommandHandler;
use crate::error::ServerError;
use log::{debug, error, info, warn};
use shared::{Initialize, Packet, PROTOCOL_VERSION};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages consumed by the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Sends `Initialize` to a new client, then lets it receive pushes.
    Initialize {
        client_id: u32,
        addr: SocketAddr,
    },
    /// Sends to every initialized client.
    Broadcast {
        packet: Packet,
    },
}

/// Owns the socket and the participant roster.
///
/// Commands are applied in this context through [`CommandHandler`]; the
/// simulation thread only hands finished pushes in through the
/// [`GameMessage`] channel.
pub struct NetworkServer {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    commands: CommandHandler,
    resync: Arc<AtomicBool>,
    fingerprint: u64,
    client_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl NetworkServer {
    /// Binds the listening socket. A bind failure is fatal for the host.
    pub async fn bind(
        addr: &str,
        commands: CommandHandler,
        resync: Arc<AtomicBool>,
        fingerprint: u64,
        client_timeout: Duration,
    ) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(NetworkServer {
            socket: Arc::new(socket),
            clients: Arc::new(RwLock::new(ClientManager::new())),
            commands,
            resync,
            fingerprint,
            client_timeout,
            tasks: Vec::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Channel the simulation thread pushes replication packets into.
    pub fn game_sender(&self) -> mpsc::UnboundedSender<GameMessage> {
        self.game_tx.clone()
    }

    /// Channel used to stop [`NetworkServer::run`].
    pub fn control_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[0..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Initialize { client_id, addr } => {
                        let packet = Initialize {
                            user_id: client_id as i32,
                        }
                        .to_packet();
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to initialize client {}: {}", client_id, e);
                            continue;
                        }

                        let mut clients_guard = clients.write().await;
                        if clients_guard.mark_initialized(client_id, addr) {
                            debug!("Client {} initialized", client_id);
                        } else {
                            debug!("Slot {} no longer held by {}", client_id, addr);
                        }
                    }
                    GameMessage::Broadcast { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.initialized_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&mut self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.client_timeout;
        let period = (timeout / 2).clamp(Duration::from_millis(10), Duration::from_secs(1));

        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        }));
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn reject(&self, addr: SocketAddr, reason: &str) {
        info!("Rejecting {}: {}", addr, reason);
        self.send_packet(
            Packet::Disconnected {
                reason: reason.to_string(),
            },
            addr,
        );
    }

    async fn client_at(&self, addr: SocketAddr) -> Option<u32> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                schema_fingerprint,
            } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION || schema_fingerprint != self.fingerprint {
                    self.reject(addr, "schema mismatch");
                    return;
                }

                // Remove existing connection if present
                if let Some(existing_id) = self.client_at(addr).await {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(&existing_id);
                    self.commands.release(existing_id);
                }

                let client_id = self.clients.write().await.add_client(addr);

                match client_id {
                    Some(client_id) => {
                        if let Err(e) = self
                            .game_tx
                            .send(GameMessage::Initialize { client_id, addr })
                        {
                            error!("Failed to queue Initialize: {}", e);
                            return;
                        }
                        self.resync.store(true, Ordering::Release);
                    }
                    None => self.reject(addr, "Server full"),
                }
            }

            Packet::UserMessage { name, payload } => {
                let Some(client_id) = self.client_at(addr).await else {
                    debug!("Dropping `{}` from unknown sender {}", name, addr);
                    return;
                };

                self.clients.write().await.touch(client_id);
                self.commands.handle(client_id, &name, &payload);
            }

            Packet::Heartbeat => {
                if let Some(client_id) = self.client_at(addr).await {
                    self.clients.write().await.touch(client_id);
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.client_at(addr).await {
                    self.clients.write().await.remove_client(&client_id);
                    self.commands.release(client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Tells every connected client the host is going away.
    async fn farewell(&self) {
        let packet = Packet::Disconnected {
            reason: "Server shutting down".to_string(),
        };
        let client_addrs = self.clients.read().await.get_client_addrs();
        for (client_id, addr) in client_addrs {
            if let Err(e) = send_packet_impl(&self.socket, &packet, addr).await {
                debug!("Failed to notify client {} of shutdown: {}", client_id, e);
            }
        }
    }

    /// Main network loop. Returns after a [`ServerMessage::Shutdown`].
    pub async fn run(&mut self) {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Network started");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { client_id } => {
                    info!("Client {} timed out", client_id);
                    self.commands.release(client_id);
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        self.farewell().await;
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

async fn send_packet_impl(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> io::Result<()> {
    let data = packet
        .encode()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::command::{MOVE, STOP_MOVE};
    use shared::{Direction, PlayerIntent, SchemaRegistry, PLAYER_COUNT};

    struct Harness {
        server: NetworkServer,
        intents: [Arc<PlayerIntent>; PLAYER_COUNT],
        resync: Arc<AtomicBool>,
    }

    async fn harness() -> Harness {
        let intents: [Arc<PlayerIntent>; PLAYER_COUNT] =
            std::array::from_fn(|_| Arc::new(PlayerIntent::new()));
        let resync = Arc::new(AtomicBool::new(false));
        let server = NetworkServer::bind(
            "127.0.0.1:0",
            CommandHandler::new(intents.clone()),
            Arc::clone(&resync),
            fingerprint(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        Harness {
            server,
            intents,
            resync,
        }
    }

    fn fingerprint() -> u64 {
        SchemaRegistry::pong().unwrap().fingerprint()
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn connect() -> Packet {
        Packet::Connect {
            client_version: PROTOCOL_VERSION,
            schema_fingerprint: fingerprint(),
        }
    }

    fn move_packet(direction: Direction) -> Packet {
        Packet::UserMessage {
            name: MOVE.to_string(),
            payload: vec![direction.to_byte()],
        }
    }

    #[tokio::test]
    async fn test_connect_queues_initialize_then_resync() {
        let mut h = harness().await;
        h.server.handle_packet(connect(), addr(9000)).await;

        match h.server.game_rx.try_recv() {
            Ok(GameMessage::Initialize { client_id, addr: a }) => {
                assert_eq!(client_id, 0);
                assert_eq!(a, addr(9000));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
        assert!(h.resync.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_third_connect_gets_server_full() {
        let mut h = harness().await;
        h.server.handle_packet(connect(), addr(9000)).await;
        h.server.handle_packet(connect(), addr(9001)).await;
        h.server.handle_packet(connect(), addr(9002)).await;

        let mut rejected = false;
        while let Ok(message) = h.server.game_rx.try_recv() {
            if let GameMessage::SendPacket {
                packet: Packet::Disconnected { reason },
                addr: a,
            } = message
            {
                assert_eq!(a, addr(9002));
                assert_eq!(reason, "Server full");
                rejected = true;
            }
        }
        assert!(rejected);
        assert_eq!(h.server.clients.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_schema_mismatch_rejected() {
        let mut h = harness().await;
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            schema_fingerprint: fingerprint() ^ 1,
        };
        h.server.handle_packet(packet, addr(9000)).await;

        assert!(h.server.clients.read().await.is_empty());
        assert!(!h.resync.load(Ordering::Acquire));
        assert!(matches!(
            h.server.game_rx.try_recv(),
            Ok(GameMessage::SendPacket {
                packet: Packet::Disconnected { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_user_message_reaches_senders_intent() {
        let mut h = harness().await;
        h.server.handle_packet(connect(), addr(9000)).await;
        h.server.handle_packet(connect(), addr(9001)).await;

        h.server
            .handle_packet(move_packet(Direction::Down), addr(9001))
            .await;

        assert!(!h.intents[0].snapshot().moving);
        let intent = h.intents[1].snapshot();
        assert!(intent.moving);
        assert_eq!(intent.direction, Direction::Down);

        h.server
            .handle_packet(
                Packet::UserMessage {
                    name: STOP_MOVE.to_string(),
                    payload: Vec::new(),
                },
                addr(9001),
            )
            .await;
        assert!(!h.intents[1].snapshot().moving);
    }

    #[tokio::test]
    async fn test_unknown_sender_ignored() {
        let mut h = harness().await;
        h.server
            .handle_packet(move_packet(Direction::Up), addr(9500))
            .await;

        for intent in &h.intents {
            assert!(!intent.snapshot().moving);
        }
    }

    #[tokio::test]
    async fn test_disconnect_releases_slot_and_intent() {
        let mut h = harness().await;
        h.server.handle_packet(connect(), addr(9000)).await;
        h.server
            .handle_packet(move_packet(Direction::Up), addr(9000))
            .await;
        assert!(h.intents[0].snapshot().moving);

        h.server.handle_packet(Packet::Disconnect, addr(9000)).await;

        assert!(!h.intents[0].snapshot().moving);
        assert!(h.server.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_from_same_address_keeps_one_slot() {
        let mut h = harness().await;
        h.server.handle_packet(connect(), addr(9000)).await;
        h.server.handle_packet(connect(), addr(9000)).await;

        let clients = h.server.clients.read().await;
        assert_eq!(clients.len(), 1);
        assert_eq!(clients.find_client_by_addr(addr(9000)), Some(0));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut h = harness().await;
        let control = h.server.control_sender();
        control.send(ServerMessage::Shutdown).unwrap();

        tokio::time::timeout(Duration::from_secs(1), h.server.run())
            .await
            .expect("run returns after Shutdown");
        assert!(h.server.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_bind_failure_reports_address() {
        let h = harness().await;
        let taken = h.server.local_addr().unwrap().to_string();

        let result = NetworkServer::bind(
            &taken,
            CommandHandler::new(h.intents.clone()),
            Arc::new(AtomicBool::new(false)),
            fingerprint(),
            Duration::from_secs(5),
        )
        .await;

        match result {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, taken),
            Err(other) => panic!("Unexpected error: {}", other),
            Ok(_) => panic!("Second bind on the same port succeeded"),
        }
    }
}
