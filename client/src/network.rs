//! Client side of the authoritative sync protocol

use log::{debug, info};
use shared::protocol::{
    player_name, HandshakeReply, InputMessage, ProtocolError, Snapshot, HANDSHAKE_REQUEST,
    MAX_MESSAGE_SIZE, SERVER_FULL_REPLY,
};
use shared::EntityKind;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed server message: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("server is full")]
    ServerFull,

    #[error("no reply from server within {0:?}")]
    TimedOut(Duration),

    #[error("cannot resolve server address {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Upper bound on every wait for a reply. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

/// Handshaken connection to the server's dedicated channel for this client
#[derive(Debug)]
pub struct ClientSync {
    socket: UdpSocket,
    dedicated: SocketAddr,
    ordinal: u32,
    player_name: String,
    config: SyncConfig,
}

impl ClientSync {
    /// Performs the `READY` handshake and connects to the assigned dedicated port.
    pub async fn connect(
        server_host: &str,
        base_port: u16,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let rendezvous = lookup_host((server_host, base_port))
            .await?
            .next()
            .ok_or_else(|| SyncError::InvalidAddress(format!("{server_host}:{base_port}")))?;

        let bind_addr = if rendezvous.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        info!("Sending handshake to {}", rendezvous);
        socket
            .send_to(HANDSHAKE_REQUEST.as_bytes(), rendezvous)
            .await?;

        let text = receive(&socket, config.request_timeout).await?;
        if text.trim() == SERVER_FULL_REPLY {
            return Err(SyncError::ServerFull);
        }

        let reply: HandshakeReply = text.parse()?;
        let dedicated = SocketAddr::new(rendezvous.ip(), reply.port);
        socket.connect(dedicated).await?;

        let player_name = player_name(reply.ordinal);
        info!(
            "Connected as {} (peer {}) on {}",
            player_name, reply.ordinal, dedicated
        );

        Ok(Self {
            socket,
            dedicated,
            ordinal: reply.ordinal,
            player_name,
            config,
        })
    }

    /// Reports one entity's position and waits for the server's snapshot.
    pub async fn send_input(
        &self,
        name: &str,
        kind: EntityKind,
        position: (f64, f64),
    ) -> Result<Snapshot, SyncError> {
        let message = InputMessage::new(name, kind, position.0, position.1);
        self.socket.send(message.to_string().as_bytes()).await?;

        let text = receive(&self.socket, self.config.request_timeout).await?;
        let snapshot = Snapshot::parse(&text)?;
        debug!("Received snapshot with {} entities", snapshot.len());
        Ok(snapshot)
    }

    /// Tells the server this client's player is gone. Does not wait for a reply.
    pub async fn delete_client(&self, kind: EntityKind) -> Result<(), SyncError> {
        let message = InputMessage::deletion(self.player_name.clone(), kind);
        self.socket.send(message.to_string().as_bytes()).await?;
        info!("Sent leave notification for {}", self.player_name);
        Ok(())
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn dedicated_addr(&self) -> SocketAddr {
        self.dedicated
    }
}

async fn receive(socket: &UdpSocket, limit: Option<Duration>) -> Result<String, SyncError> {
    let mut buffer = vec![0u8; MAX_MESSAGE_SIZE];

    let len = match limit {
        Some(limit) => tokio::time::timeout(limit, socket.recv(&mut buffer))
            .await
            .map_err(|_| SyncError::TimedOut(limit))??,
        None => socket.recv(&mut buffer).await?,
    };

    Ok(String::from_utf8_lossy(&buffer[..len]).into_owned())
}
