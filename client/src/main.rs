use clap::Parser;
use client::config::{resolve_server_addr, ClientConfig};
use client::network::SyncSession;
use client::sandbox::SandboxWorld;
use log::{info, warn};
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};

/// Chance per tick that the wanderer tries the nearest door
const DOOR_ATTEMPT_CHANCE: f64 = 0.02;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:9999")]
    server: String,

    /// Display name sent with position reports
    #[arg(short, long)]
    name: Option<String>,

    /// Model tag other players load for us
    #[arg(short, long)]
    model: Option<String>,

    /// Update cycle period in milliseconds
    #[arg(long, default_value = "10")]
    tick_ms: u64,

    /// Milliseconds before a silent remote peer is dropped
    #[arg(long, default_value = "3000")]
    peer_timeout_ms: u64,

    /// Interpolation blend factor, in (0, 1]
    #[arg(long, default_value = "0.25")]
    blend: f32,

    /// Seed for the sandbox wanderer
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ClientConfig {
        server_addr: resolve_server_addr(&args.server)?,
        display_name: args.name.clone(),
        model_tag: args.model,
        tick: Duration::from_millis(args.tick_ms),
        peer_timeout: Duration::from_millis(args.peer_timeout_ms),
        blend: args.blend,
    };
    config.validate()?;

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut world = SandboxWorld::with_default_doors(seed);

    info!("Starting client...");
    info!("Connecting to: {}", config.server_addr);

    let tick = config.tick;
    let mut session = match SyncSession::connect(config).await {
        Ok(session) => Some(session),
        Err(e) => {
            warn!("Multiplayer disabled: {}", e);
            None
        }
    };

    let mut ticker = match &session {
        Some(session) => session.ticker(),
        None => {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        }
    };
    let dt = tick.as_secs_f32();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                world.step(dt);

                if rand::thread_rng().gen_bool(DOOR_ATTEMPT_CHANCE) {
                    if let Some(event) = world.toggle_nearest_door() {
                        info!("Toggled door {} -> {}", event.door_id, event.state);
                        if let Some(session) = &session {
                            if let Err(e) = session.send_door_toggle(event.door_id, event.state).await {
                                warn!("Failed to send door toggle: {}", e);
                            }
                        }
                    }
                }

                if let Some(session) = session.as_mut() {
                    session.tick(Instant::now(), &mut world).await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }
    }

    if let Some(mut session) = session {
        if let Some(name) = &args.name {
            if let Err(e) = session.send_remove_player(name).await {
                warn!("Failed to send remove_player: {}", e);
            }
        }
        session.close();
    }

    Ok(())
}
