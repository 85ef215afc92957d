//! Server network layer: rendezvous handshake, per-peer listeners and the authoritative loop

use crate::game::{GameState, InputOutcome};
use crate::peer_manager::{PeerManager, PeerSession};
use log::{debug, error, info, warn};
use shared::protocol::{
    HandshakeReply, InputMessage, ProtocolError, HANDSHAKE_REQUEST, MAX_MESSAGE_SIZE,
    SERVER_FULL_REPLY,
};
use shared::{PhysicsEngine, WorldBounds, DEFAULT_BASE_PORT};
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

pub type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// Rendezvous port. Peer `n` is served on `base_port + n`. Zero picks a free port.
    pub base_port: u16,
    pub tick_duration: Duration,
    pub max_peers: usize,
    pub idle_timeout: Duration,
    pub bounds: WorldBounds,
    pub physics: PhysicsEngine,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: DEFAULT_BASE_PORT,
            tick_duration: Duration::from_micros(8_333),
            max_peers: 16,
            idle_timeout: Duration::from_secs(5),
            bounds: WorldBounds::default(),
            physics: shared::scene_physics(),
        }
    }
}

/// The loop's answer to one peer input
#[derive(Debug, Clone, PartialEq)]
pub struct PeerReply {
    pub snapshot: String,
    /// Set once the peer has deleted its own entity; its listener stops after replying.
    pub leave: bool,
}

/// Messages sent from listener tasks to the authoritative loop
#[derive(Debug)]
pub enum ServerMessage {
    HandshakeRequest {
        addr: SocketAddr,
    },
    PeerInput {
        ordinal: u32,
        input: Result<InputMessage, ProtocolError>,
        reply: oneshot::Sender<PeerReply>,
    },
    Shutdown,
}

/// Authoritative server. Owns the world; listener tasks only forward messages to it.
pub struct Server {
    config: ServerConfig,
    rendezvous: Arc<UdpSocket>,
    base_port: u16,
    game: GameState,
    peers: PeerManager,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the rendezvous socket. The world starts empty.
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        let rendezvous = UdpSocket::bind((config.host.as_str(), config.base_port)).await?;
        let base_port = rendezvous.local_addr()?.port();
        info!("Server listening on {}:{}", config.host, base_port);

        let game = GameState::new(config.bounds, config.physics)?;
        let peers = PeerManager::new(config.max_peers, config.idle_timeout);
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            config,
            rendezvous: Arc::new(rendezvous),
            base_port,
            game,
            peers,
            server_tx,
            server_rx,
        })
    }

    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.rendezvous.local_addr()?)
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Scene population hook, used before `run`.
    pub fn game_mut(&mut self) -> &mut GameState {
        &mut self.game
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Sender that can stop the loop with [`ServerMessage::Shutdown`].
    pub fn message_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that turns `READY` datagrams into handshake requests
    fn spawn_rendezvous_listener(&self) {
        let socket = Arc::clone(&self.rendezvous);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_MESSAGE_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let text = String::from_utf8_lossy(&buffer[..len]);
                        if text.trim() != HANDSHAKE_REQUEST {
                            warn!("Unexpected rendezvous message from {}: {:?}", addr, text);
                            continue;
                        }

                        if server_tx
                            .send(ServerMessage::HandshakeRequest { addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving handshake: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn peer_port(&self, ordinal: u32) -> Option<u16> {
        u16::try_from(ordinal)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
    }

    async fn reply_rendezvous(&self, text: &str, addr: SocketAddr) {
        if let Err(e) = self.rendezvous.send_to(text.as_bytes(), addr).await {
            error!("Failed to send handshake reply to {}: {}", addr, e);
        }
    }

    async fn handle_handshake(&mut self, addr: SocketAddr) {
        let Some(ordinal) = self.peers.reserve_ordinal() else {
            warn!("Refusing {}: server full", addr);
            self.reply_rendezvous(SERVER_FULL_REPLY, addr).await;
            return;
        };

        let Some(port) = self.peer_port(ordinal) else {
            error!("No port left for peer {}", ordinal);
            self.reply_rendezvous(SERVER_FULL_REPLY, addr).await;
            return;
        };

        let socket = match UdpSocket::bind((self.config.host.as_str(), port)).await {
            Ok(socket) => socket,
            Err(e) => {
                error!("Failed to bind dedicated port {} for peer {}: {}", port, ordinal, e);
                self.reply_rendezvous(SERVER_FULL_REPLY, addr).await;
                return;
            }
        };

        let entity_name = self.game.add_player(ordinal);
        let task = tokio::spawn(serve_peer(socket, ordinal, self.server_tx.clone()));
        self.peers
            .register(PeerSession::new(ordinal, port, entity_name).with_task(task));

        let reply = HandshakeReply { ordinal, port };
        self.reply_rendezvous(&reply.to_string(), addr).await;
    }

    fn handle_input(
        &mut self,
        ordinal: u32,
        input: Result<InputMessage, ProtocolError>,
        reply: oneshot::Sender<PeerReply>,
    ) {
        self.peers.touch(ordinal);
        let mut leave = false;

        match input {
            Ok(input) => {
                let owns_entity = self
                    .peers
                    .get(ordinal)
                    .is_some_and(|session| session.entity_name == input.name);

                let outcome = self.game.apply_input(&input);
                if outcome == InputOutcome::Deleted && owns_entity {
                    self.peers.release(ordinal);
                    leave = true;
                }
            }
            Err(e) => warn!("Malformed input from peer {}: {}", ordinal, e),
        }

        let answer = PeerReply {
            snapshot: self.game.snapshot().encode(),
            leave,
        };
        if reply.send(answer).is_err() {
            debug!("Peer {} listener went away before its reply", ordinal);
        }
    }

    fn handle_timeouts(&mut self) {
        for session in self.peers.check_timeouts() {
            self.game.remove_entity(&session.entity_name);
        }
    }

    /// Main server loop. Returns after a [`ServerMessage::Shutdown`].
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_rendezvous_listener();

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(Duration::from_secs(1));

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::HandshakeRequest { addr }) => {
                            self.handle_handshake(addr).await;
                        },
                        Some(ServerMessage::PeerInput { ordinal, input, reply }) => {
                            self.handle_input(ordinal, input, reply);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.game.update();

                    if self.game.tick % 600 == 0 && !self.peers.is_empty() {
                        debug!("Tick {}: {} peers, {} entities",
                               self.game.tick, self.peers.len(), self.game.entity_count());
                    }
                },

                _ = timeout_interval.tick() => {
                    self.handle_timeouts();
                },
            }
        }

        Ok(())
    }
}

/// Receives inputs on one peer's dedicated socket and relays the loop's replies
async fn serve_peer(
    socket: UdpSocket,
    ordinal: u32,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut buffer = [0u8; MAX_MESSAGE_SIZE];

    loop {
        let (len, addr) = match socket.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Error receiving from peer {}: {}", ordinal, e);
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        let input = String::from_utf8_lossy(&buffer[..len]).parse::<InputMessage>();

        let (reply_tx, reply_rx) = oneshot::channel();
        let message = ServerMessage::PeerInput {
            ordinal,
            input,
            reply: reply_tx,
        };
        if server_tx.send(message).is_err() {
            break;
        }

        let Ok(reply) = reply_rx.await else {
            break;
        };

        if let Err(e) = socket.send_to(reply.snapshot.as_bytes(), addr).await {
            warn!("Failed to reply to peer {} at {}: {}", ordinal, addr, e);
        }

        if reply.leave {
            info!("Peer {} sent its leave notification", ordinal);
            break;
        }
    }
}
