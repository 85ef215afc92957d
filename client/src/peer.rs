//! Direct two-peer position exchange without a server
//!
//! One side hosts on a known port, the other joins it. Each side sends its
//! own records as `"{id}:{x},{y}"` joined with `;`. The host learns the
//! guest's address from the first datagram it receives.

use crate::network::SyncError;
use log::{debug, warn};
use shared::protocol::{PeerPosition, MAX_MESSAGE_SIZE};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::{lookup_host, ToSocketAddrs, UdpSocket};

#[derive(Debug)]
pub struct PeerLink {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

impl PeerLink {
    pub async fn host(bind_addr: impl ToSocketAddrs) -> Result<Self, SyncError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        debug!("Hosting peer link on {}", socket.local_addr()?);
        Ok(Self { socket, peer: None })
    }

    pub async fn join(host_addr: &str) -> Result<Self, SyncError> {
        let peer = lookup_host(host_addr)
            .await?
            .next()
            .ok_or_else(|| SyncError::InvalidAddress(host_addr.to_string()))?;

        let bind_addr = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        Ok(Self {
            socket,
            peer: Some(peer),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SyncError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Sends `records` to the other side. Returns false if it is not known yet.
    pub async fn send_positions(&self, records: &[PeerPosition]) -> Result<bool, SyncError> {
        let Some(peer) = self.peer else {
            return Ok(false);
        };

        let text = PeerPosition::encode_all(records);
        self.socket.send_to(text.as_bytes(), peer).await?;
        Ok(true)
    }

    /// Drains every datagram already queued without blocking.
    ///
    /// Malformed records are logged and dropped; the rest are returned in order.
    pub fn try_receive(&mut self) -> Result<Vec<PeerPosition>, SyncError> {
        let mut buffer = [0u8; MAX_MESSAGE_SIZE];
        let mut records = Vec::new();

        loop {
            match self.socket.try_recv_from(&mut buffer) {
                Ok((len, from)) => {
                    if self.peer.is_none() {
                        debug!("Peer joined from {}", from);
                        self.peer = Some(from);
                    }

                    let (parsed, errors) =
                        PeerPosition::parse_all(&String::from_utf8_lossy(&buffer[..len]));
                    for e in errors {
                        warn!("Dropping malformed peer record from {}: {}", from, e);
                    }
                    records.extend(parsed);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(records)
    }

    /// Waits until at least one well-formed record arrives, draining like [`PeerLink::try_receive`].
    pub async fn receive(&mut self) -> Result<Vec<PeerPosition>, SyncError> {
        loop {
            self.socket.readable().await?;
            let records = self.try_receive()?;
            if !records.is_empty() {
                return Ok(records);
            }
        }
    }
}
