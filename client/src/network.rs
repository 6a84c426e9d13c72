use crate::config::ObserverConfig;
use crate::error::JoinError;
use crate::handshake::Handshake;
use crate::mirror::Mirror;
use log::{debug, error, info, warn};
use shared::command::INITIALIZE;
use shared::{Packet, UserCommand, PROTOCOL_VERSION};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// A joined observer: knows its participant id, mirrors the simulator's
/// entities, and sends movement commands.
pub struct Observer {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    user_id: u32,
    handshake: Arc<Handshake>,
    mirror: Arc<RwLock<Mirror>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Observer {
    /// Connects and blocks until `Initialize` arrives or `join_timeout` elapses.
    ///
    /// On failure the socket and its tasks are torn down before returning.
    pub async fn join(config: ObserverConfig) -> Result<Observer, JoinError> {
        let server_addr = resolve(&config.server_addr).await?;
        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);

        let mirror = Mirror::new().map_err(|e| {
            error!("Schema setup failed: {}", e);
            JoinError::Closed
        })?;
        let fingerprint = mirror.fingerprint();
        let mirror = Arc::new(RwLock::new(mirror));
        let handshake = Arc::new(Handshake::new());

        let receiver = spawn_receiver(
            Arc::clone(&socket),
            server_addr,
            Arc::clone(&handshake),
            Arc::clone(&mirror),
        );

        info!("Connecting to {}...", server_addr);
        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            schema_fingerprint: fingerprint,
        };

        let joined = match send_packet(&socket, &connect, server_addr).await {
            Ok(()) => handshake.wait(config.join_timeout).await,
            Err(e) => Err(JoinError::Io(e)),
        };

        let user_id = match joined {
            Ok(user_id) => user_id,
            Err(e) => {
                warn!("Join failed: {}", e);
                // The simulator may hold a slot for us already.
                let _ = send_packet(&socket, &Packet::Disconnect, server_addr).await;
                receiver.abort();
                return Err(e);
            }
        };

        let heartbeat = spawn_heartbeat(Arc::clone(&socket), server_addr, config);

        Ok(Observer {
            socket,
            server_addr,
            user_id,
            handshake,
            mirror,
            tasks: vec![receiver, heartbeat],
        })
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Entities as last pushed by the simulator.
    pub fn mirror(&self) -> Arc<RwLock<Mirror>> {
        Arc::clone(&self.mirror)
    }

    /// False once the simulator closed the connection.
    pub fn is_connected(&self) -> bool {
        self.handshake.is_initialized()
    }

    pub async fn send_command(&self, command: UserCommand) -> Result<(), JoinError> {
        if !self.is_connected() {
            return Err(JoinError::Closed);
        }
        debug!("Sending {:?}", command);
        send_packet(&self.socket, &command.to_packet(), self.server_addr).await?;
        Ok(())
    }

    /// Tells the simulator we are leaving and stops the background tasks.
    pub async fn leave(mut self) {
        if self.is_connected() {
            if let Err(e) = send_packet(&self.socket, &Packet::Disconnect, self.server_addr).await
            {
                debug!("Failed to send Disconnect: {}", e);
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("Left {}", self.server_addr);
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr, JoinError> {
    lookup_host(addr)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| JoinError::InvalidAddress(addr.to_string()))
}

async fn send_packet(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> io::Result<()> {
    let data = packet
        .encode()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

/// Feeds the handshake and the mirror from incoming datagrams.
fn spawn_receiver(
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    handshake: Arc<Handshake>,
    mirror: Arc<RwLock<Mirror>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; 65_536];

        loop {
            let (len, addr) = match socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    continue;
                }
            };
            if addr != server_addr {
                debug!("Ignoring datagram from {}", addr);
                continue;
            }

            let packet = match Packet::decode(&buffer[..len]) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Failed to deserialize packet: {}", e);
                    continue;
                }
            };

            match packet {
                Packet::HostMessage { name, payload } if name == INITIALIZE => {
                    handshake.handle_initialize(&payload);
                }
                Packet::Replicate { tick, updates } => {
                    // Pushes are only meaningful once our id is known.
                    if handshake.is_initialized() {
                        mirror.write().await.apply(tick, &updates);
                    }
                }
                Packet::Disconnected { reason } => {
                    warn!("Disconnected: {}", reason);
                    handshake.disconnect(reason);
                }
                other => {
                    debug!("Unexpected packet from server: {:?}", other);
                }
            }
        }
    })
}

fn spawn_heartbeat(
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    config: ObserverConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(config.heartbeat_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = send_packet(&socket, &Packet::Heartbeat, server_addr).await {
                warn!("Failed to send heartbeat: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::entity::POSITION;
    use shared::{Direction, Initialize, Value, VariableUpdate, Vec2};
    use std::time::Duration;

    /// A bare UDP socket playing the simulator.
    struct FakeServer {
        socket: UdpSocket,
    }

    impl FakeServer {
        async fn start() -> Self {
            Self {
                socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            }
        }

        fn config(&self, join_timeout: Duration) -> ObserverConfig {
            ObserverConfig {
                server_addr: self.socket.local_addr().unwrap().to_string(),
                join_timeout,
                heartbeat_interval: Duration::from_secs(1),
            }
        }

        async fn recv(&self) -> (Packet, SocketAddr) {
            let mut buffer = [0u8; 2048];
            let (len, addr) = self.socket.recv_from(&mut buffer).await.unwrap();
            (Packet::decode(&buffer[..len]).unwrap(), addr)
        }

        async fn send(&self, packet: &Packet, addr: SocketAddr) {
            send_packet(&self.socket, packet, addr).await.unwrap();
        }

        /// Waits for Connect and answers with `reply`.
        fn answer(self, reply: Packet) -> JoinHandle<(FakeServer, SocketAddr)> {
            tokio::spawn(async move {
                let (packet, addr) = self.recv().await;
                assert!(matches!(packet, Packet::Connect { .. }));
                self.send(&reply, addr).await;
                (self, addr)
            })
        }
    }

    #[tokio::test]
    async fn test_join_receives_identity() {
        let server = FakeServer::start().await;
        let config = server.config(Duration::from_secs(2));
        let fake = server.answer(Initialize { user_id: 1 }.to_packet());

        let observer = Observer::join(config).await.unwrap();
        assert_eq!(observer.user_id(), 1);
        assert!(observer.is_connected());
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_join_sends_schema_fingerprint() {
        let server = FakeServer::start().await;
        let config = server.config(Duration::from_millis(100));

        let (join, received) = tokio::join!(Observer::join(config), server.recv());
        assert!(join.is_err());
        match received.0 {
            Packet::Connect {
                client_version,
                schema_fingerprint,
            } => {
                assert_eq!(client_version, PROTOCOL_VERSION);
                assert_eq!(schema_fingerprint, Mirror::new().unwrap().fingerprint());
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_initialize_times_out() {
        let server = FakeServer::start().await;
        let config = server.config(Duration::from_millis(150));
        let fake = server.answer(Packet::HostMessage {
            name: INITIALIZE.to_string(),
            payload: vec![0, 0],
        });

        let result = Observer::join(config).await;
        assert!(matches!(result, Err(JoinError::Timeout)));

        // The abandoned join tells the server to free the slot.
        let (server, _) = fake.await.unwrap();
        let (packet, _) = server.recv().await;
        assert_eq!(packet, Packet::Disconnect);
    }

    #[tokio::test]
    async fn test_out_of_range_identity_fails() {
        let server = FakeServer::start().await;
        let config = server.config(Duration::from_secs(2));
        let fake = server.answer(Initialize { user_id: 2 }.to_packet());

        let result = Observer::join(config).await;
        assert!(matches!(result, Err(JoinError::InvalidIdentity { user_id: 2 })));
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_full_rejects() {
        let server = FakeServer::start().await;
        let config = server.config(Duration::from_secs(2));
        let fake = server.answer(Packet::Disconnected {
            reason: "Server full".to_string(),
        });

        match Observer::join(config).await {
            Err(JoinError::Rejected { reason }) => assert_eq!(reason, "Server full"),
            Err(other) => panic!("Unexpected error: {}", other),
            Ok(_) => panic!("Join succeeded on a full server"),
        }
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let config = ObserverConfig::new("not an address");
        assert!(matches!(
            Observer::join(config).await,
            Err(JoinError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_push_reaches_mirror_and_commands_reach_server() {
        let server = FakeServer::start().await;
        let config = server.config(Duration::from_secs(2));
        let fake = server.answer(Initialize { user_id: 0 }.to_packet());

        let observer = Observer::join(config).await.unwrap();
        let (server, addr) = fake.await.unwrap();

        let position = Vec2::new(50.0, 154.0);
        server
            .send(
                &Packet::Replicate {
                    tick: 3,
                    updates: vec![VariableUpdate {
                        entity_id: 1,
                        field: POSITION.to_string(),
                        value: Value::Vec2(position),
                    }],
                },
                addr,
            )
            .await;

        let mirror = observer.mirror();
        let mut mirrored = false;
        for _ in 0..100 {
            if mirror.read().await.last_tick() == 3 {
                mirrored = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(mirrored);
        assert_eq!(
            mirror.read().await.player(0).unwrap().position.get(),
            position
        );

        observer
            .send_command(UserCommand::Move(Direction::Down))
            .await
            .unwrap();
        loop {
            let (packet, _) = server.recv().await;
            if packet == Packet::Heartbeat {
                continue;
            }
            assert_eq!(packet, UserCommand::Move(Direction::Down).to_packet());
            break;
        }
    }

    #[tokio::test]
    async fn test_disconnected_after_join_closes() {
        let server = FakeServer::start().await;
        let config = server.config(Duration::from_secs(2));
        let fake = server.answer(Initialize { user_id: 0 }.to_packet());

        let observer = Observer::join(config).await.unwrap();
        let (server, addr) = fake.await.unwrap();
        server
            .send(
                &Packet::Disconnected {
                    reason: "Server shutting down".to_string(),
                },
                addr,
            )
            .await;

        for _ in 0..100 {
            if !observer.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!observer.is_connected());
        assert!(matches!(
            observer.send_command(UserCommand::StopMove).await,
            Err(JoinError::Closed)
        ));
    }
}
