use clap::Parser;
use client::game::ClientGame;
use client::input::{InputManager, KeyState};
use client::network::{ClientSync, SyncConfig};
use client::rendering::Renderer;
use log::{error, info, warn};
use macroquad::prelude::*;
use shared::{EntityKind, TIME_SCALE_STEP};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// Server rendezvous port
    #[arg(short, long, default_value_t = shared::DEFAULT_BASE_PORT)]
    port: u16,

    /// Frames per second to aim for
    #[arg(short, long, default_value = "60")]
    fps: u32,

    /// Give up on a server reply after this many milliseconds; waits forever if unset
    #[arg(short = 't', long)]
    timeout_ms: Option<u64>,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "syncworld".to_string(),
        window_width: args.width,
        window_height: args.height,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    if let Err(e) = run(Args::parse()).await {
        error!("Client stopped: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // macroquad owns the main thread, so network calls are driven by a local runtime.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let config = SyncConfig {
        request_timeout: args.timeout_ms.map(Duration::from_millis),
    };

    info!("Connecting to {}:{}", args.server, args.port);
    let sync = runtime.block_on(ClientSync::connect(&args.server, args.port, config))?;

    let mut game = ClientGame::with_wall_clock(sync.player_name(), sync.ordinal())?;
    let mut input = InputManager::new();
    let mut renderer = Renderer::new();
    let frame_budget = Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1)));

    info!("Controls: A/D to move, Space to jump, Shift to dash, P to pause, +/- speed, Q to quit");

    // Closing the window only sets a flag, so the leave notification below still runs.
    prevent_quit();

    loop {
        let frame_start = Instant::now();

        let (controls, hot_keys) = input.update(KeyState::sample());
        if hot_keys.quit || is_quit_requested() {
            break;
        }
        if hot_keys.toggle_pause {
            game.toggle_pause();
        }
        if hot_keys.speed_up {
            game.adjust_player_time_scale(TIME_SCALE_STEP);
        }
        if hot_keys.slow_down {
            game.adjust_player_time_scale(-TIME_SCALE_STEP);
        }

        game.step(&controls);
        renderer.render(&game);

        if let Some(report) = game.outgoing_input() {
            let exchange = sync.send_input(&report.name, report.kind(), (report.x, report.y));
            match runtime.block_on(exchange) {
                Ok(snapshot) => {
                    game.merge_snapshot(&snapshot);
                }
                Err(e) => warn!("Snapshot exchange failed: {}", e),
            }
        }

        if let Some(rest) = frame_budget.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }

        next_frame().await;
    }

    if let Err(e) = runtime.block_on(sync.delete_client(EntityKind::Player)) {
        warn!("Failed to send leave notification: {}", e);
    }

    Ok(())
}
