use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, ServerResult};
use shared::{PhysicsEngine, WorldBounds};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the rendezvous and dedicated sockets to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Rendezvous port; peer n is served on port + n
    #[arg(short, long, default_value_t = shared::DEFAULT_BASE_PORT)]
    port: u16,

    /// Server ticks per second
    #[arg(short, long, default_value = "120")]
    tick_rate: u32,

    /// Maximum concurrent peers
    #[arg(short, long, default_value = "16")]
    max_peers: usize,

    /// Seconds of silence before a peer is dropped
    #[arg(short, long, default_value = "5")]
    idle_timeout: u64,

    #[arg(long, default_value_t = shared::WORLD_WIDTH)]
    width: f64,

    #[arg(long, default_value_t = shared::WORLD_HEIGHT)]
    height: f64,

    #[arg(long, default_value_t = shared::GRAVITY)]
    gravity: f64,

    #[arg(long, default_value_t = shared::PIXELS_PER_METER)]
    pixels_per_meter: f64,

    /// Largest sub-step any movement may take, in pixels
    #[arg(long, default_value_t = shared::MAX_STEP_PIXELS)]
    max_step: f64,
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        base_port: args.port,
        tick_duration: Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1))),
        max_peers: args.max_peers,
        idle_timeout: Duration::from_secs(args.idle_timeout),
        bounds: WorldBounds::new(args.width, args.height),
        physics: PhysicsEngine::new(args.gravity, args.pixels_per_meter, args.max_step),
    };

    info!("Starting server with tick rate {}Hz", args.tick_rate);

    let mut server = Server::bind(config).await?;
    server.game_mut().populate_default_scene()?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
