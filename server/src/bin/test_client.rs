use rand::Rng;
use shared::protocol::{HandshakeReply, InputMessage, Snapshot, HANDSHAKE_REQUEST, MAX_MESSAGE_SIZE};
use shared::EntityKind;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::sleep;

// Scripted peer: handshake, wander around for a while, then leave.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server_host = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1".to_string());
    let base_port: u16 = match std::env::args().nth(2) {
        Some(port) => port.parse()?,
        None => shared::DEFAULT_BASE_PORT,
    };

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Bot socket bound to {}", socket.local_addr()?);

    println!("Sending handshake to {}:{}", server_host, base_port);
    socket
        .send_to(HANDSHAKE_REQUEST.as_bytes(), (server_host.as_str(), base_port))
        .await?;

    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    let (len, addr) = socket.recv_from(&mut buf).await?;
    let text = String::from_utf8_lossy(&buf[..len]).to_string();
    println!("Received {:?} from {}", text, addr);

    let reply: HandshakeReply = text.parse()?;
    let name = shared::protocol::player_name(reply.ordinal);
    println!("Playing as {} on port {}", name, reply.port);

    let dedicated = (server_host.as_str(), reply.port);
    let mut rng = rand::thread_rng();
    let (mut x, mut y) = (50.0_f64, 50.0 * f64::from(reply.ordinal));

    for _ in 0..20 {
        x = (x + rng.gen_range(-20.0..20.0)).clamp(0.0, shared::WORLD_WIDTH - shared::ENTITY_SIZE);
        y = (y + rng.gen_range(-20.0..20.0)).clamp(0.0, shared::WORLD_HEIGHT - shared::ENTITY_SIZE);

        let input = InputMessage::new(name.clone(), EntityKind::Player, x, y);
        socket.send_to(input.to_string().as_bytes(), dedicated).await?;

        let (len, _) = socket.recv_from(&mut buf).await?;
        match Snapshot::parse(&String::from_utf8_lossy(&buf[..len])) {
            Ok(snapshot) => {
                println!("Snapshot with {} entities", snapshot.len());
                for entry in &snapshot.entries {
                    println!("  {} {:?} at ({}, {})", entry.name, entry.kind(), entry.x, entry.y);
                }
                if let Some(me) = snapshot.get(&name) {
                    x = me.x;
                    y = me.y;
                }
            }
            Err(e) => println!("Failed to parse snapshot: {}", e),
        }

        sleep(Duration::from_millis(250)).await;
    }

    let leave = InputMessage::deletion(name, EntityKind::Player);
    socket.send_to(leave.to_string().as_bytes(), dedicated).await?;
    println!("Sent leave notification");

    Ok(())
}
