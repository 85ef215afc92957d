//! Peer session bookkeeping for the authoritative server
//!
//! Every peer that completes the `READY` handshake owns exactly one session:
//! - A sequential ordinal, never reused while the server runs
//! - A dedicated UDP port derived from the base port plus that ordinal
//! - The name of the player entity created for it
//! - The listener task that owns the dedicated socket
//!
//! The manager enforces the peer cap and drops sessions that stay silent
//! longer than the idle timeout.

use log::info;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// One connected peer and the task serving its dedicated channel
#[derive(Debug)]
pub struct PeerSession {
    /// Ordinal assigned at handshake, starting from 1
    pub ordinal: u32,
    /// Dedicated port the peer sends its inputs to
    pub port: u16,
    /// Player entity created for this peer
    pub entity_name: String,
    /// Last time an input arrived on the dedicated channel
    pub last_seen: Instant,
    task: Option<JoinHandle<()>>,
}

impl PeerSession {
    pub fn new(ordinal: u32, port: u16, entity_name: impl Into<String>) -> Self {
        Self {
            ordinal,
            port,
            entity_name: entity_name.into(),
            last_seen: Instant::now(),
            task: None,
        }
    }

    /// Attaches the listener task so closing the session stops it
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Aborts the listener task, which releases the dedicated socket
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn has_task(&self) -> bool {
        self.task.is_some()
    }
}

/// Tracks every live peer session and hands out ordinals
#[derive(Debug)]
pub struct PeerManager {
    sessions: HashMap<u32, PeerSession>,
    next_ordinal: u32,
    max_peers: usize,
    idle_timeout: Duration,
}

impl PeerManager {
    pub fn new(max_peers: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            next_ordinal: 1,
            max_peers,
            idle_timeout,
        }
    }

    /// Claims the next ordinal, or returns None when the server is full
    ///
    /// Ordinals are claimed before the dedicated socket is bound, so two
    /// handshakes can never race to the same port.
    pub fn reserve_ordinal(&mut self) -> Option<u32> {
        if self.sessions.len() >= self.max_peers {
            return None;
        }

        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        Some(ordinal)
    }

    pub fn register(&mut self, session: PeerSession) {
        info!(
            "Peer {} connected on port {} as {}",
            session.ordinal, session.port, session.entity_name
        );
        self.sessions.insert(session.ordinal, session);
    }

    /// Removes a session and stops its listener
    pub fn remove(&mut self, ordinal: u32) -> Option<PeerSession> {
        let mut session = self.sessions.remove(&ordinal)?;
        session.close();
        info!("Peer {} disconnected", ordinal);
        Some(session)
    }

    /// Forgets a session but leaves its listener running to finish its reply
    pub fn release(&mut self, ordinal: u32) -> Option<PeerSession> {
        let session = self.sessions.remove(&ordinal)?;
        info!("Peer {} left", ordinal);
        Some(session)
    }

    /// Records activity for a peer. Returns false for unknown ordinals.
    pub fn touch(&mut self, ordinal: u32) -> bool {
        match self.sessions.get_mut(&ordinal) {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, ordinal: u32) -> Option<&PeerSession> {
        self.sessions.get(&ordinal)
    }

    /// Closes and returns every session idle for longer than the timeout
    pub fn check_timeouts(&mut self) -> Vec<PeerSession> {
        let timed_out: Vec<u32> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(self.idle_timeout))
            .map(|session| session.ordinal)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|ordinal| {
                info!("Peer {} timed out", ordinal);
                self.remove(ordinal)
            })
            .collect()
    }

    pub fn ordinals(&self) -> Vec<u32> {
        let mut ordinals: Vec<u32> = self.sessions.keys().copied().collect();
        ordinals.sort_unstable();
        ordinals
    }

    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Drop for PeerManager {
    fn drop(&mut self) {
        for session in self.sessions.values_mut() {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max_peers: usize) -> PeerManager {
        PeerManager::new(max_peers, Duration::from_secs(5))
    }

    fn connect(manager: &mut PeerManager) -> Option<u32> {
        let ordinal = manager.reserve_ordinal()?;
        manager.register(PeerSession::new(
            ordinal,
            5555 + ordinal as u16,
            shared::protocol::player_name(ordinal),
        ));
        Some(ordinal)
    }

    #[test]
    fn test_session_creation() {
        let session = PeerSession::new(1, 5556, "Player1");
        assert_eq!(session.ordinal, 1);
        assert_eq!(session.port, 5556);
        assert_eq!(session.entity_name, "Player1");
        assert!(!session.has_task());
    }

    #[test]
    fn test_session_timeout() {
        let mut session = PeerSession::new(1, 5556, "Player1");
        assert!(!session.is_timed_out(Duration::from_secs(1)));

        session.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(session.is_timed_out(Duration::from_secs(1)));

        session.touch();
        assert!(!session.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_ordinals_are_sequential() {
        let mut manager = manager(3);
        assert_eq!(connect(&mut manager), Some(1));
        assert_eq!(connect(&mut manager), Some(2));
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.ordinals(), vec![1, 2]);
    }

    #[test]
    fn test_ordinals_not_reused() {
        let mut manager = manager(3);
        let first = connect(&mut manager).unwrap();
        manager.remove(first);
        assert_eq!(connect(&mut manager), Some(2));
    }

    #[test]
    fn test_max_capacity() {
        let mut manager = manager(1);
        assert!(connect(&mut manager).is_some());
        assert!(manager.reserve_ordinal().is_none());
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.max_peers(), 1);
    }

    #[test]
    fn test_remove_and_release() {
        let mut manager = manager(3);
        let a = connect(&mut manager).unwrap();
        let b = connect(&mut manager).unwrap();

        assert!(manager.remove(a).is_some());
        assert!(manager.remove(a).is_none());
        assert_eq!(manager.release(b).map(|s| s.entity_name), Some("Player2".to_string()));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_touch() {
        let mut manager = manager(2);
        let ordinal = connect(&mut manager).unwrap();
        assert!(manager.touch(ordinal));
        assert!(!manager.touch(99));
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = PeerManager::new(4, Duration::from_secs(1));
        let stale = connect(&mut manager).unwrap();
        let fresh = connect(&mut manager).unwrap();

        manager.sessions.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(3);

        let removed = manager.check_timeouts();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].entity_name, "Player1");
        assert!(manager.get(stale).is_none());
        assert!(manager.get(fresh).is_some());
    }

    #[tokio::test]
    async fn test_close_aborts_task() {
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let mut manager = manager(2);
        let ordinal = manager.reserve_ordinal().unwrap();
        manager.register(PeerSession::new(ordinal, 5556, "Player1").with_task(task));
        assert!(manager.get(ordinal).unwrap().has_task());

        let session = manager.remove(ordinal).unwrap();
        assert!(!session.has_task());
    }
}
