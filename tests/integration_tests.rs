//! Integration tests for the server, client and shared crates
//!
//! These run a real server on loopback and talk to it with both raw sockets
//! and the client library.

use client::game::ClientGame;
use client::network::{ClientSync, SyncConfig, SyncError};
use server::network::{Server, ServerConfig, ServerMessage};
use shared::protocol::{HandshakeReply, Snapshot};
use shared::{scene, ClockTree, EntityKind, ManualTime, WorldBounds};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(2);

fn quick_sync() -> SyncConfig {
    SyncConfig {
        request_timeout: Some(WAIT),
    }
}

struct RunningServer {
    base_port: u16,
    sender: UnboundedSender<ServerMessage>,
    task: JoinHandle<bool>,
}

impl RunningServer {
    async fn start(config: ServerConfig, prepare: impl FnOnce(&mut Server)) -> Self {
        let mut server = assert_ok!(Server::bind(config).await);
        prepare(&mut server);

        let base_port = server.base_port();
        let sender = server.message_sender();
        let task = tokio::spawn(async move { server.run().await.is_ok() });

        RunningServer {
            base_port,
            sender,
            task,
        }
    }

    async fn stop(self) {
        assert_ok!(self.sender.send(ServerMessage::Shutdown));
        assert!(assert_ok!(self.task.await));
    }
}

fn loopback_config() -> ServerConfig {
    ServerConfig {
        base_port: 0,
        ..ServerConfig::default()
    }
}

async fn request(socket: &UdpSocket, text: &str, port: u16) -> String {
    assert_ok!(socket.send_to(text.as_bytes(), ("127.0.0.1", port)).await);
    let mut buffer = [0u8; 8192];
    let (len, _) = assert_ok!(assert_ok!(timeout(WAIT, socket.recv_from(&mut buffer)).await));
    String::from_utf8_lossy(&buffer[..len]).into_owned()
}

/// HANDSHAKE TESTS
mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn peers_get_consecutive_ordinals_and_ports() {
        let server = RunningServer::start(loopback_config(), |_| {}).await;
        let base = server.base_port;

        let first = assert_ok!(UdpSocket::bind("127.0.0.1:0").await);
        let reply = request(&first, "READY", base).await;
        assert_eq!(reply, format!("1 {}", base + 1));

        let second = assert_ok!(UdpSocket::bind("127.0.0.1:0").await);
        let reply = assert_ok!(request(&second, "READY", base).await.parse::<HandshakeReply>());
        assert_eq!(
            reply,
            HandshakeReply {
                ordinal: 2,
                port: base + 2
            }
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn full_server_refuses_handshake() {
        let config = ServerConfig {
            max_peers: 1,
            ..loopback_config()
        };
        let server = RunningServer::start(config, |_| {}).await;

        let first = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        assert_eq!(first.ordinal(), 1);

        let refused = ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await;
        assert!(matches!(refused, Err(SyncError::ServerFull)));

        server.stop().await;
    }

    #[tokio::test]
    async fn busy_dedicated_port_refuses_handshake() {
        let server = RunningServer::start(loopback_config(), |_| {}).await;
        let base = server.base_port;

        // Hold the port peer 1 would be served on.
        let squatter = assert_ok!(UdpSocket::bind(("127.0.0.1", base + 1)).await);

        let refused = ClientSync::connect("127.0.0.1", base, quick_sync()).await;
        assert!(matches!(refused, Err(SyncError::ServerFull)));

        let next = assert_ok!(ClientSync::connect("127.0.0.1", base, quick_sync()).await);
        assert_eq!(next.ordinal(), 2);
        assert_eq!(next.dedicated_addr().port(), base + 2);

        drop(squatter);
        server.stop().await;
    }
}

/// AUTHORITATIVE VALIDATION TESTS
mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn colliding_move_is_reverted() {
        let server = RunningServer::start(loopback_config(), |server| {
            server
                .game_mut()
                .add_entity(scene::puppet("wall", EntityKind::Fixed, 120.0, 100.0));
        })
        .await;

        let sync = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        assert_eq!(sync.player_name(), "Player1");

        let snapshot = assert_ok!(sync.send_input("Player1", EntityKind::Player, (50.0, 100.0)).await);
        let player = snapshot.get("Player1").unwrap();
        assert_eq!((player.x, player.y), (50.0, 100.0));

        let snapshot = assert_ok!(sync.send_input("Player1", EntityKind::Player, (100.0, 100.0)).await);
        let player = snapshot.get("Player1").unwrap();
        assert_eq!((player.x, player.y), (50.0, 100.0));

        // Fixed entities collide but are never synchronized.
        assert!(!snapshot.contains("wall"));

        server.stop().await;
    }

    #[tokio::test]
    async fn non_finite_position_is_not_stored() {
        let server = RunningServer::start(loopback_config(), |_| {}).await;

        let socket = assert_ok!(UdpSocket::bind("127.0.0.1:0").await);
        let reply = assert_ok!(request(&socket, "READY", server.base_port).await.parse::<HandshakeReply>());
        let tag = EntityKind::Player.tag();

        for coords in ["NaN inf", "-inf 10", "1e400 20"] {
            let text = request(&socket, &format!("Player1 {tag} {coords}"), reply.port).await;
            let snapshot = assert_ok!(Snapshot::parse(&text));
            let player = snapshot.get("Player1").unwrap();
            assert_eq!((player.x, player.y), (50.0, 50.0));
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn malformed_input_gets_snapshot() {
        let server = RunningServer::start(loopback_config(), |_| {}).await;

        let socket = assert_ok!(UdpSocket::bind("127.0.0.1:0").await);
        let reply = assert_ok!(request(&socket, "READY", server.base_port).await.parse::<HandshakeReply>());

        let text = request(&socket, "Player1 not-a-tag 1 2", reply.port).await;
        let snapshot = assert_ok!(Snapshot::parse(&text));
        let player = snapshot.get("Player1").unwrap();
        assert_eq!((player.x, player.y), (50.0, 50.0));

        server.stop().await;
    }

    #[tokio::test]
    async fn snapshot_lists_entities_by_name() {
        let server = RunningServer::start(loopback_config(), |server| {
            assert_ok!(server.game_mut().populate_default_scene());
        })
        .await;

        let first = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        let second = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        assert_eq!(second.player_name(), "Player2");

        let snapshot = assert_ok!(first.send_input("Player1", EntityKind::Player, (50.0, 50.0)).await);
        let names: Vec<&str> = snapshot.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Player1", "Player2", "platform"]);
        assert_eq!(snapshot.get("platform").unwrap().kind(), EntityKind::Platform);
        assert!(!snapshot.contains("ground"));

        server.stop().await;
    }
}

/// LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn deletion_removes_player() {
        let server = RunningServer::start(loopback_config(), |_| {}).await;

        let leaving = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        let staying = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);

        let snapshot = assert_ok!(staying.send_input("Player2", EntityKind::Player, (50.0, 100.0)).await);
        assert!(snapshot.contains("Player1"));

        assert_ok!(leaving.delete_client(EntityKind::Player).await);
        sleep(Duration::from_millis(100)).await;

        let snapshot = assert_ok!(staying.send_input("Player2", EntityKind::Player, (50.0, 100.0)).await);
        assert!(!snapshot.contains("Player1"));
        assert!(snapshot.contains("Player2"));

        server.stop().await;
    }

    #[tokio::test]
    async fn deleting_another_players_entity_keeps_sender_connected() {
        let server = RunningServer::start(loopback_config(), |_| {}).await;

        let first = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        let second = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);

        let snapshot = assert_ok!(first.send_input("Player2", EntityKind::Player, (-1.0, -1.0)).await);
        assert!(!snapshot.contains("Player2"));

        let snapshot = assert_ok!(first.send_input("Player1", EntityKind::Player, (50.0, 60.0)).await);
        let player = snapshot.get("Player1").unwrap();
        assert_eq!((player.x, player.y), (50.0, 60.0));

        let snapshot = assert_ok!(first.send_input("Player9", EntityKind::Player, (-1.0, -1.0)).await);
        assert!(snapshot.contains("Player1"));
        assert_ok!(first.send_input("Player1", EntityKind::Player, (50.0, 60.0)).await);

        // The owner of the removed entity still has its channel.
        let snapshot = assert_ok!(second.send_input("Player2", EntityKind::Player, (50.0, 100.0)).await);
        assert!(snapshot.contains("Player1"));

        server.stop().await;
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let config = ServerConfig {
            idle_timeout: Duration::from_millis(200),
            ..loopback_config()
        };
        let server = RunningServer::start(config, |_| {}).await;

        let silent = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        assert_eq!(silent.ordinal(), 1);

        // The sweep runs once per second.
        sleep(Duration::from_millis(1_500)).await;

        let active = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        assert_eq!(active.ordinal(), 2);

        let snapshot = assert_ok!(active.send_input("Player2", EntityKind::Player, (50.0, 100.0)).await);
        assert!(!snapshot.contains("Player1"));

        // The timed-out peer's listener is gone, so its request goes unanswered.
        let orphaned = silent.send_input("Player1", EntityKind::Player, (50.0, 50.0)).await;
        assert!(orphaned.is_err());

        server.stop().await;
    }
}

/// CLIENT MIRRORING TESTS
mod client_mirror_tests {
    use super::*;

    #[tokio::test]
    async fn client_mirrors_server_world() {
        let server = RunningServer::start(loopback_config(), |server| {
            assert_ok!(server.game_mut().populate_default_scene());
        })
        .await;

        let sync = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);
        let other = assert_ok!(ClientSync::connect("127.0.0.1", server.base_port, quick_sync()).await);

        let time = ManualTime::new(0);
        let clocks = assert_ok!(ClockTree::new(time.clone(), shared::ROOT_CLOCK_TIC));
        let mut game = assert_ok!(ClientGame::new(
            sync.player_name(),
            sync.ordinal(),
            clocks,
            WorldBounds::default(),
            shared::scene_physics(),
        ));

        let report = game.outgoing_input().unwrap();
        let snapshot = assert_ok!(sync.send_input(&report.name, report.kind(), (report.x, report.y)).await);
        let merge = game.merge_snapshot(&snapshot);

        assert_eq!(merge.created, 2);
        assert!(game.store().contains("platform"));
        assert!(game.store().contains("Player2"));
        assert_eq!(game.local_player().unwrap().position(), (50.0, 50.0));

        assert_ok!(other.delete_client(EntityKind::Player).await);
        sleep(Duration::from_millis(100)).await;

        let snapshot = assert_ok!(sync.send_input(&report.name, report.kind(), (report.x, report.y)).await);
        let merge = game.merge_snapshot(&snapshot);
        assert_eq!(merge.removed, 1);
        assert!(!game.store().contains("Player2"));
        assert!(game.local_player().is_some());

        server.stop().await;
    }
}
